//! Recycling pool for drained ring segments.
//!
//! A linked queue retires a segment once both `head` and `tail` have moved
//! past it. The reclaimer resets the ring and parks it here, so a queue that
//! oscillates around a segment boundary stops hitting the allocator.

use crossbeam_queue::ArrayQueue;
use seize::Collector;

use crate::queue::ring::Ring;
use crate::stats::{SEGMENT_POOL_HIT_COUNT, SEGMENT_RECYCLE_COUNT, bump};
use crate::tracing_helpers::debug_log;

/// Bounded stash of reset segments, shared by one queue.
pub(crate) struct SegmentPool<T> {
    /// `None` when pooling is disabled (`ArrayQueue` rejects capacity 0).
    free: Option<ArrayQueue<Box<Ring<T>>>>,
    segment_capacity: usize,
}

impl<T> SegmentPool<T> {
    pub(crate) fn new(segment_capacity: usize, pool_capacity: usize) -> Self {
        Self {
            free: (pool_capacity > 0).then(|| ArrayQueue::new(pool_capacity)),
            segment_capacity,
        }
    }

    #[inline]
    pub(crate) const fn segment_capacity(&self) -> usize {
        self.segment_capacity
    }

    /// A fresh segment that returns to this pool when retired.
    pub(crate) fn take(&self) -> Box<Ring<T>> {
        if let Some(ring) = self.free.as_ref().and_then(ArrayQueue::pop) {
            bump(&SEGMENT_POOL_HIT_COUNT);
            return ring;
        }

        Box::new(Ring::new(self.segment_capacity, self))
    }

    /// Reset `ring` and keep it if there is room.
    pub(crate) fn put(&self, mut ring: Box<Ring<T>>) {
        let Some(free) = self.free.as_ref() else {
            return;
        };

        ring.reset();
        if free.push(ring).is_ok() {
            bump(&SEGMENT_RECYCLE_COUNT);
            debug_log!(pooled = free.len(), "queue: segment recycled");
        } else {
            debug_log!("queue: pool full, segment freed");
        }
    }

    /// Segments currently parked.
    #[cfg(test)]
    pub(crate) fn parked(&self) -> usize {
        self.free.as_ref().map_or(0, ArrayQueue::len)
    }
}

/// Reclaim callback for a retired segment.
///
/// # Safety
/// `ptr` must come from `Box::into_raw`, be retired exactly once, and its
/// `home` pool (if any) must outlive the collector that runs this.
pub(crate) unsafe fn recycle_ring<T>(ptr: *mut Ring<T>, _collector: &Collector) {
    // SAFETY: guaranteed by caller
    let ring: Box<Ring<T>> = unsafe { Box::from_raw(ptr) };
    let home: *const SegmentPool<T> = ring.home;

    if home.is_null() {
        drop(ring);
        return;
    }

    // SAFETY: the owning queue drops its collector before its pool
    unsafe { (*home).put(ring) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_builds_when_empty() {
        let pool: SegmentPool<u64> = SegmentPool::new(8, 2);
        let ring = pool.take();
        assert_eq!(ring.capacity(), 8);
        assert!(std::ptr::eq(ring.home, &raw const pool));
    }

    #[test]
    fn test_put_resets_and_reuses() {
        let pool: SegmentPool<u64> = SegmentPool::new(8, 2);
        let ring = pool.take();
        assert!(ring.enqueue(3));
        ring.close();

        pool.put(ring);
        assert_eq!(pool.parked(), 1);

        let ring = pool.take();
        assert_eq!(pool.parked(), 0);
        assert!(!ring.is_closed());
        assert_eq!(ring.dequeue(), None);
        assert!(ring.enqueue(4));
    }

    #[test]
    fn test_overflow_drops() {
        let pool: SegmentPool<u64> = SegmentPool::new(4, 1);
        pool.put(pool.take());
        pool.put(Box::new(Ring::new(4, &raw const pool)));
        assert_eq!(pool.parked(), 1);
    }

    #[test]
    fn test_disabled_pool() {
        let pool: SegmentPool<u64> = SegmentPool::new(4, 0);
        pool.put(pool.take());
        assert_eq!(pool.parked(), 0);
    }
}
