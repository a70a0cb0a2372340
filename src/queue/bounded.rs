//! `BoundedQueue` - a single SCQ ring with typed payloads.
//!
//! The ring has twice as many slots as the queue's capacity, and a separate
//! counter admits at most `capacity` values. The ring's own full check is
//! therefore never the thing that rejects a value: a rejected enqueue on a
//! ring burns an index, which is harmless for a linked queue (the segment is
//! closed right after) but would skew a standalone ring.

use std::fmt as StdFmt;
use std::ptr as StdPtr;
use std::sync::atomic::AtomicUsize;

use crossbeam_utils::{Backoff, CachePadded};

use crate::config::{ConfigError, DEFAULT_SEGMENT_CAPACITY, validate_segment_capacity};
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, FAA_ORD, READ_ORD};
use crate::queue::payload::Payload;
use crate::queue::ring::Ring;
use crate::tracing_helpers::warn_log;

/// Fixed-capacity lock-free MPMC FIFO.
///
/// # Example
///
/// ```rust
/// use collectx::BoundedQueue;
///
/// let queue: BoundedQueue<u32> = BoundedQueue::with_capacity(4).unwrap();
/// for v in 0..4 {
///     assert!(queue.enqueue(v).is_ok());
/// }
/// assert_eq!(queue.enqueue(9), Err(9));
/// assert_eq!(queue.dequeue(), Some(0));
/// ```
pub struct BoundedQueue<T: Payload> {
    ring: Ring<T>,
    /// Admitted values, including enqueues still in flight.
    len: CachePadded<AtomicUsize>,
    capacity: usize,
}

impl<T: Payload> BoundedQueue<T> {
    /// Queue holding up to 65536 values.
    #[must_use]
    pub fn new() -> Self {
        Self::build(DEFAULT_SEGMENT_CAPACITY)
    }

    /// Queue holding up to `capacity` values.
    ///
    /// # Errors
    /// `capacity` must pass
    /// [`validate_segment_capacity`](crate::config::validate_segment_capacity).
    pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
        validate_segment_capacity(capacity)?;
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        Self {
            ring: Ring::new(capacity * 2, StdPtr::null()),
            len: CachePadded::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Append `value`, or hand it back if the queue is full.
    ///
    /// # Errors
    /// Returns `Err(value)` when `capacity` values are already queued.
    pub fn enqueue(&self, value: T) -> Result<(), T> {
        let capacity: usize = self.capacity;
        let admitted: bool = self
            .len
            .fetch_update(CAS_SUCCESS, CAS_FAILURE, |n| (n < capacity).then_some(n + 1))
            .is_ok();

        if !admitted {
            return Err(value);
        }

        // At most `capacity` values in a ring of `2 * capacity` slots, so
        // the ring only refuses while a racing dequeuer is mid-slot.
        let word: u64 = value.into_word();
        let backoff = Backoff::new();
        let mut warned = false;
        while !self.ring.enqueue(word) {
            if !warned && backoff.is_completed() {
                warned = true;
                warn_log!(
                    capacity = self.capacity,
                    "bounded: enqueue spinning on a stalled dequeuer"
                );
            }
            backoff.snooze();
        }

        Ok(())
    }

    /// Take the oldest value. Never blocks.
    pub fn dequeue(&self) -> Option<T> {
        let word: u64 = self.ring.dequeue()?;
        self.len.fetch_sub(1, FAA_ORD);

        // SAFETY: each word is handed out by exactly one dequeue
        Some(unsafe { T::from_word(word) })
    }

    /// Maximum number of values held at once.
    #[must_use]
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values currently admitted. Approximate under concurrency.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(READ_ORD)
    }

    /// True if no value is admitted.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Payload> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Payload> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
    }
}

impl<T: Payload> StdFmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
