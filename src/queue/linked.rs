//! `LinkedQueue` - unbounded LSCQ built from chained SCQ rings.
//!
//! # Growth
//!
//! Enqueuers work on the `tail` segment. When its ring rejects a word the
//! segment is closed, and the one enqueuer that wins its `append_lock` links a
//! new segment (already holding that enqueuer's word) behind it. Everyone
//! else sees `next` and helps swing `tail` forward.
//!
//! # Shrinking
//!
//! Dequeuers work on the `head` segment. A segment that is empty and has a
//! successor is closed, so after one final scan with a re-armed threshold it
//! can never receive another word. The dequeuer then swings `tail` (if it
//! still points there) and `head` past it and retires it through `seize`. The
//! reclaimer resets the ring and returns it to the queue's [`SegmentPool`].

use std::fmt as StdFmt;
use std::sync::atomic::AtomicPtr;

use crossbeam_utils::CachePadded;
use seize::{Collector, Guard, LocalGuard};

use crate::config::{ConfigError, QueueConfig};
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD, RELAXED, WRITE_ORD};
use crate::queue::payload::Payload;
use crate::queue::pool::{SegmentPool, recycle_ring};
use crate::queue::ring::Ring;
use crate::stats::{SEGMENT_APPEND_COUNT, bump};
use crate::tracing_helpers::debug_log;

/// Unbounded lock-free MPMC FIFO.
///
/// `enqueue` never fails; `dequeue` never blocks and returns `None` when the
/// queue looks empty.
pub struct LinkedQueue<T: Payload> {
    head: CachePadded<AtomicPtr<Ring<T>>>,
    tail: CachePadded<AtomicPtr<Ring<T>>>,

    // Declared before `pool`: dropping the collector runs pending recycles,
    // which push into the pool.
    collector: Collector,
    pool: Box<SegmentPool<T>>,
}

impl<T: Payload> LinkedQueue<T> {
    /// Queue with the default [`QueueConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::build(QueueConfig::default())
    }

    /// Queue with a custom segment size and pool size.
    ///
    /// # Errors
    /// See [`QueueConfig::validate`].
    pub fn with_config(config: QueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: QueueConfig) -> Self {
        let pool: Box<SegmentPool<T>> = Box::new(SegmentPool::new(
            config.segment_capacity,
            config.pool_capacity,
        ));
        let first: *mut Ring<T> = Box::into_raw(pool.take());

        Self {
            head: CachePadded::new(AtomicPtr::new(first)),
            tail: CachePadded::new(AtomicPtr::new(first)),
            collector: Collector::new(),
            pool,
        }
    }

    /// Enter a protected region for the `*_with_guard` methods.
    #[must_use]
    #[inline(always)]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.collector.enter()
    }

    /// Slots per ring segment.
    #[must_use]
    #[inline]
    pub fn segment_capacity(&self) -> usize {
        self.pool.segment_capacity()
    }

    /// Append `value`. Always returns `true`; a full segment grows the queue.
    pub fn enqueue(&self, value: T) -> bool {
        self.enqueue_with_guard(value, &self.guard())
    }

    /// Take the oldest value, or `None` if the queue looks empty.
    pub fn dequeue(&self) -> Option<T> {
        self.dequeue_with_guard(&self.guard())
    }

    /// [`enqueue`](Self::enqueue) with a caller-provided guard.
    pub fn enqueue_with_guard(&self, value: T, guard: &LocalGuard<'_>) -> bool {
        let word: u64 = value.into_word();

        loop {
            let cq_ptr: *mut Ring<T> = guard.protect(&*self.tail, READ_ORD);

            // SAFETY: tail is never null and the guard keeps it alive
            let cq: &Ring<T> = unsafe { &*cq_ptr };

            let next: *mut Ring<T> = cq.next.load(READ_ORD);
            if !next.is_null() {
                let _ = self
                    .tail
                    .compare_exchange(cq_ptr, next, CAS_SUCCESS, CAS_FAILURE);
                continue;
            }

            if cq.enqueue(word) {
                return true;
            }

            // Full: no later word may land here, then elect one appender.
            cq.close();
            let _append = cq.append_lock.lock();

            if !cq.next.load(READ_ORD).is_null() {
                continue;
            }

            let fresh: Box<Ring<T>> = self.pool.take();
            let accepted: bool = fresh.enqueue(word);
            debug_assert!(accepted, "a fresh segment accepts its first word");

            let fresh_ptr: *mut Ring<T> = Box::into_raw(fresh);
            cq.next.store(fresh_ptr, WRITE_ORD);
            let _ = self
                .tail
                .compare_exchange(cq_ptr, fresh_ptr, CAS_SUCCESS, CAS_FAILURE);

            bump(&SEGMENT_APPEND_COUNT);
            debug_log!(
                capacity = self.segment_capacity(),
                "queue: segment appended"
            );
            return true;
        }
    }

    /// [`dequeue`](Self::dequeue) with a caller-provided guard.
    pub fn dequeue_with_guard(&self, guard: &LocalGuard<'_>) -> Option<T> {
        loop {
            let cq_ptr: *mut Ring<T> = guard.protect(&*self.head, READ_ORD);

            // SAFETY: head is never null and the guard keeps it alive
            let cq: &Ring<T> = unsafe { &*cq_ptr };

            if let Some(word) = cq.dequeue() {
                // SAFETY: each word is handed out by exactly one dequeue
                return Some(unsafe { T::from_word(word) });
            }

            let next: *mut Ring<T> = cq.next.load(READ_ORD);
            if next.is_null() {
                return None;
            }

            // `cq` is closed. Words that won their slot before the close may
            // still be there, so scan once more with a re-armed threshold.
            debug_assert!(cq.is_closed(), "a ring with a successor is closed");
            cq.reopen_threshold();
            if let Some(word) = cq.dequeue() {
                // SAFETY: as above
                return Some(unsafe { T::from_word(word) });
            }

            // Tail first, so no enqueuer is left pointing at a retired ring.
            let _ = self
                .tail
                .compare_exchange(cq_ptr, next, CAS_SUCCESS, CAS_FAILURE);

            if self
                .head
                .compare_exchange(cq_ptr, next, CAS_SUCCESS, CAS_FAILURE)
                .is_ok()
            {
                debug_log!("queue: head advanced, segment retired");

                // SAFETY: `cq` is unreachable from head and tail, and only
                // this thread won the head swing
                unsafe { guard.defer_retire(cq_ptr, recycle_ring::<T>) };
            }
        }
    }
}

impl<T: Payload> Default for LinkedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Payload> Drop for LinkedQueue<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}

        let mut cursor: *mut Ring<T> = *self.head.get_mut();
        while !cursor.is_null() {
            // SAFETY: `&mut self` rules out other users; segments from head
            // onward are owned by the queue and visited once.
            let ring: Box<Ring<T>> = unsafe { Box::from_raw(cursor) };
            cursor = ring.next.load(RELAXED);
        }
    }
}

impl<T: Payload> StdFmt::Debug for LinkedQueue<T> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("LinkedQueue")
            .field("segment_capacity", &self.segment_capacity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn small() -> LinkedQueue<u64> {
        LinkedQueue::with_config(QueueConfig::default().segment_capacity(4).pool_capacity(2))
            .unwrap()
    }

    fn segments<T: Payload>(queue: &LinkedQueue<T>) -> usize {
        let mut count = 0;
        let mut cursor = queue.head.load(READ_ORD);
        while !cursor.is_null() {
            count += 1;
            // SAFETY: single-threaded test, no segment is retired meanwhile
            cursor = unsafe { (*cursor).next.load(READ_ORD) };
        }
        count
    }

    #[test]
    fn test_rejects_bad_config() {
        let err = LinkedQueue::<u64>::with_config(QueueConfig::default().segment_capacity(12));
        assert_eq!(err.err(), Some(ConfigError::SegmentCapacityNotPowerOfTwo(12)));
    }

    #[test]
    fn test_empty() {
        let q: LinkedQueue<u64> = LinkedQueue::new();
        assert_eq!(q.segment_capacity(), 65536);
        assert_eq!(q.dequeue(), None);
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn test_fifo_across_segments() {
        let q = small();
        for v in 0..100 {
            assert!(q.enqueue(v));
        }
        assert!(segments(&q) >= 25);

        for v in 0..100 {
            assert_eq!(q.dequeue(), Some(v));
        }
        assert_eq!(q.dequeue(), None);
        assert_eq!(segments(&q), 1);
    }

    #[test]
    fn test_interleaved() {
        let q = small();
        let mut next_out = 0;
        for v in 0..1_000_u64 {
            q.enqueue(v);
            if v % 3 == 0 {
                assert_eq!(q.dequeue(), Some(next_out));
                next_out += 1;
            }
        }
        while let Some(v) = q.dequeue() {
            assert_eq!(v, next_out);
            next_out += 1;
        }
        assert_eq!(next_out, 1_000);
    }

    #[test]
    fn test_refill_after_drain() {
        let q = small();
        for round in 0..20_u64 {
            for v in 0..10 {
                q.enqueue(round * 10 + v);
            }
            for v in 0..10 {
                assert_eq!(q.dequeue(), Some(round * 10 + v));
            }
            assert_eq!(q.dequeue(), None);
        }
    }

    #[test]
    fn test_with_guard() {
        let q = small();
        let guard = q.guard();
        for v in 0..20 {
            q.enqueue_with_guard(v, &guard);
        }
        for v in 0..20 {
            assert_eq!(q.dequeue_with_guard(&guard), Some(v));
        }
    }

    #[test]
    fn test_drop_releases_payloads() {
        let marker = Arc::new(());
        {
            let q: LinkedQueue<Arc<()>> =
                LinkedQueue::with_config(QueueConfig::default().segment_capacity(4)).unwrap();
            for _ in 0..37 {
                q.enqueue(Arc::clone(&marker));
            }
            for _ in 0..5 {
                drop(q.dequeue());
            }
            assert_eq!(Arc::strong_count(&marker), 33);
        }
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    fn test_boxed_payloads() {
        let q: LinkedQueue<Box<String>> = LinkedQueue::with_config(
            QueueConfig::default().segment_capacity(4).pool_capacity(0),
        )
        .unwrap();
        for i in 0..9 {
            q.enqueue(Box::new(format!("item-{i}")));
        }
        for i in 0..9 {
            assert_eq!(*q.dequeue().unwrap(), format!("item-{i}"));
        }
    }

    #[test]
    fn test_concurrent_conservation() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 5_000;

        let q = Arc::new(small());
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        q.enqueue(p * PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    let mut sum = 0_u64;
                    let mut count = 0_u64;
                    for _ in 0..PER_PRODUCER {
                        if let Some(v) = q.dequeue() {
                            sum += v;
                            count += 1;
                        }
                    }
                    (sum, count)
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        let (mut sum, mut count) = consumers
            .into_iter()
            .map(|c| c.join().unwrap())
            .fold((0, 0), |(s, c), (s2, c2)| (s + s2, c + c2));

        while let Some(v) = q.dequeue() {
            sum += v;
            count += 1;
        }

        let total = PRODUCERS * PER_PRODUCER;
        assert_eq!(count, total);
        assert_eq!(sum, total * (total - 1) / 2);
    }
}
