//! Per-node state flags for the skip list.
//!
//! [`NodeFlags`] packs the two lifecycle bits of a skip-list node into a
//! single `u32`:
//!
//! - `FULLY_LINKED`: every forward pointer of the node is installed and
//!   readers may report it.
//! - `MARKED`: deletion has started; readers treat the node as absent even
//!   while it is still physically reachable.
//!
//! A node is visible iff `FULLY_LINKED` is set and `MARKED` is clear, which is
//! exactly `matches(FULLY_LINKED | MARKED, FULLY_LINKED)`.
//!
//! # Concurrency Model
//! 1. Writers set bits with `Release` after the state they guard is written.
//! 2. Readers load with `Acquire` and only then trust the node's key, value
//!    and links.
//!
//! `MARKED` is only ever set while the node's own lock is held, so the
//! check-then-set in removal is race free. `FULLY_LINKED` is set exactly once,
//! by the inserting thread, while the predecessors are locked.

use std::sync::atomic::AtomicU32;

use crate::ordering::{READ_ORD, RELAXED, WRITE_ORD};

// ============================================================================
//  Bit Constants
// ============================================================================

/// All forward pointers installed.
pub const FULLY_LINKED: u32 = 1 << 0;

/// Logically deleted.
pub const MARKED: u32 = 1 << 1;

/// Mask covering both lifecycle bits.
pub const LIFECYCLE_MASK: u32 = FULLY_LINKED | MARKED;

// ============================================================================
//  NodeFlags
// ============================================================================

/// Atomic flag word for one skip-list node.
///
/// # Example
///
/// ```rust
/// use collectx::flags::{FULLY_LINKED, LIFECYCLE_MASK, MARKED, NodeFlags};
///
/// let flags = NodeFlags::new();
/// assert!(!flags.get(FULLY_LINKED));
///
/// flags.set(FULLY_LINKED);
/// assert!(flags.matches(LIFECYCLE_MASK, FULLY_LINKED));
///
/// flags.set(MARKED);
/// assert!(!flags.matches(LIFECYCLE_MASK, FULLY_LINKED));
/// ```
#[derive(Debug, Default)]
pub struct NodeFlags {
    value: AtomicU32,
}

impl NodeFlags {
    /// Create an empty flag word (not linked, not marked).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicU32::new(0),
        }
    }

    /// Check whether every bit of `flag` is set.
    #[inline(always)]
    #[must_use]
    pub fn get(&self, flag: u32) -> bool {
        (self.value.load(READ_ORD) & flag) == flag
    }

    /// Set the bits of `flag`, publishing everything written before.
    #[inline(always)]
    pub fn set(&self, flag: u32) {
        self.value.fetch_or(flag, WRITE_ORD);
    }

    /// Clear the bits of `flag`.
    #[inline(always)]
    pub fn clear(&self, flag: u32) {
        self.value.fetch_and(!flag, WRITE_ORD);
    }

    /// Check `flags & mask == expect` on a single acquire load.
    #[inline(always)]
    #[must_use]
    pub fn matches(&self, mask: u32, expect: u32) -> bool {
        (self.value.load(READ_ORD) & mask) == expect
    }

    /// True when the node is fully linked and not marked.
    #[inline(always)]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.matches(LIFECYCLE_MASK, FULLY_LINKED)
    }

    /// Raw value, for debugging.
    #[inline]
    #[must_use]
    pub fn value(&self) -> u32 {
        self.value.load(RELAXED)
    }
}

#[cfg(all(test, loom))]
mod loom_tests;
