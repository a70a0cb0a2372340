//! Standard memory orderings for concurrent node and slot access.
//!
//! These constants keep ordering usage consistent across the skip list and
//! the queue, and make the intent clear at each access point.

use std::sync::atomic::Ordering;

/// Ordering for reading links, flags, and slots during lock-free traversal.
/// Pairs with writer's Release stores.
pub const READ_ORD: Ordering = Ordering::Acquire;

/// Ordering for publishing new links and flags.
/// Pairs with reader's Acquire loads.
pub const WRITE_ORD: Ordering = Ordering::Release;

/// Ordering for CAS success (compare-and-swap).
/// Used for slot updates, segment append, head/tail swings.
pub const CAS_SUCCESS: Ordering = Ordering::AcqRel;

/// Ordering for CAS failure.
/// Only need to see the current value.
pub const CAS_FAILURE: Ordering = Ordering::Acquire;

/// Ordering for relaxed loads (within locked region, or counters).
/// Safe because the lock provides synchronization.
pub const RELAXED: Ordering = Ordering::Relaxed;

/// Ordering for fetch-and-add on ring head/tail indices.
/// Both sides of the index race must observe each other's slot writes.
pub const FAA_ORD: Ordering = Ordering::AcqRel;
