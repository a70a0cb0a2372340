//! SCQ ring: a fixed-capacity lock-free MPMC ring of word-sized entries.
//!
//! # Indices
//!
//! `head` and `tail` are monotonically increasing 63-bit counters; the top
//! bit of `tail` is the *closed* flag. Index `i` maps to slot `remap(i)` and
//! lap `i / capacity`. Both counters start at `capacity`, so every slot
//! (cycle 0) is one lap behind the first enqueue.
//!
//! # Protocol
//!
//! - **Enqueue**: `T = tail.fetch_add(1)`. If the slot's cycle is older than
//!   `T`'s lap, it is empty, and it is safe (or no dequeuer has passed `T`),
//!   CAS in `(safe, full, lap(T), data)`. Otherwise report full when the
//!   ring is one lap ahead of `head`, else take another index.
//! - **Dequeue**: `H = head.fetch_add(1)`. A slot at lap `H` is ours to
//!   consume. An older slot is advanced so a late enqueuer cannot fill it:
//!   empty slots move to lap `H`, full slots are marked unsafe. Then if
//!   `tail <= H + 1` the ring is empty and `fixstate` pulls a lagging tail
//!   up to `head`.
//! - **Threshold**: set to `2 * capacity - 1` by every successful enqueue and
//!   decremented by every failed dequeue step. A negative threshold means
//!   the ring is empty and dequeue returns without touching `head`.
//!
//! The ring stores raw words; typed ownership lives in the queue wrappers.

use std::marker::PhantomData;
use std::ptr as StdPtr;
use std::sync::atomic::{AtomicI64, AtomicPtr, AtomicU64};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, FAA_ORD, READ_ORD, RELAXED, WRITE_ORD};
use crate::queue::pool::SegmentPool;
use crate::queue::slot::{Entry, Slot};
use crate::stats::{FIXSTATE_COUNT, bump};
use crate::tracing_helpers::trace_log;

/// Closed flag in `tail`.
pub const CLOSED_BIT: u64 = 1 << 63;

/// Index bits of `tail`.
pub const INDEX_MASK: u64 = CLOSED_BIT - 1;

/// Slots per 64-byte cache line (16-byte slots).
const SLOTS_PER_LINE: u64 = 4;

// ============================================================================
//  Ring
// ============================================================================

/// One SCQ segment.
pub(crate) struct Ring<T> {
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
    threshold: CachePadded<AtomicI64>,

    /// Next segment in a linked queue. Set at most once per use.
    pub(crate) next: AtomicPtr<Ring<T>>,

    /// Serializes segment appends after this ring closes.
    pub(crate) append_lock: Mutex<()>,

    /// Pool that takes this ring back once it is retired. Null for rings
    /// that are not part of a linked queue.
    pub(crate) home: *const SegmentPool<T>,

    slots: Box<[Slot]>,
    capacity: u64,
    _marker: PhantomData<T>,
}

// SAFETY: the ring only holds words of `T` (which is Send) and atomics. The
// `home` pointer is only dereferenced by the reclaimer while the owning queue,
// and therefore the pool, is alive.
unsafe impl<T: Send> Send for Ring<T> {}

// SAFETY: see above; all shared state is atomic or behind `append_lock`.
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    /// Build an empty ring. `capacity` must be a validated power of two.
    pub(crate) fn new(capacity: usize, home: *const SegmentPool<T>) -> Self {
        debug_assert!(capacity.is_power_of_two() && capacity as u64 >= SLOTS_PER_LINE);

        let cap: u64 = capacity as u64;
        Self {
            head: CachePadded::new(AtomicU64::new(cap)),
            tail: CachePadded::new(AtomicU64::new(cap)),
            threshold: CachePadded::new(AtomicI64::new(-1)),
            next: AtomicPtr::new(StdPtr::null_mut()),
            append_lock: Mutex::new(()),
            home,
            slots: (0..capacity).map(|_| Slot::new()).collect(),
            capacity: cap,
            _marker: PhantomData,
        }
    }

    /// Slot count.
    #[inline(always)]
    #[expect(clippy::cast_possible_truncation, reason = "built from a usize")]
    pub(crate) const fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Threshold after a successful enqueue.
    #[inline(always)]
    #[expect(clippy::cast_possible_wrap, reason = "capacity is validated to fit")]
    const fn full_threshold(&self) -> i64 {
        (self.capacity as i64) * 2 - 1
    }

    /// Interleave consecutive indices across cache lines.
    #[inline(always)]
    const fn remap(&self, index: u64) -> usize {
        let raw: u64 = index & (self.capacity - 1);
        let lines: u64 = self.capacity / SLOTS_PER_LINE;

        #[expect(clippy::cast_possible_truncation, reason = "result < capacity")]
        let slot: usize = ((raw % lines) * SLOTS_PER_LINE + raw / lines) as usize;
        slot
    }

    #[inline(always)]
    fn slot(&self, index: u64) -> &Slot {
        &self.slots[self.remap(index)]
    }

    // ========================================================================
    //  Enqueue
    // ========================================================================

    /// Try to append `word`. Fails when the ring is full or closed.
    pub(crate) fn enqueue(&self, word: u64) -> bool {
        loop {
            let raw_tail: u64 = self.tail.fetch_add(1, FAA_ORD);
            if raw_tail & CLOSED_BIT != 0 {
                return false;
            }

            let tail: u64 = raw_tail & INDEX_MASK;
            let slot: &Slot = self.slot(tail);
            let cycle_tail: u64 = tail / self.capacity;

            loop {
                let entry: Entry = slot.load();

                let usable: bool = entry.cycle() < cycle_tail
                    && entry.is_empty()
                    && (entry.is_safe() || self.head.load(READ_ORD) <= tail);

                if !usable {
                    break;
                }

                if slot.compare_exchange(entry, Entry::new(true, false, cycle_tail, word)) {
                    if self.threshold.load(RELAXED) != self.full_threshold() {
                        self.threshold.store(self.full_threshold(), WRITE_ORD);
                    }
                    return true;
                }
            }

            // Full once the ring is a whole lap ahead of the head.
            if tail + 1 >= self.head.load(READ_ORD) + self.capacity {
                return false;
            }
        }
    }

    // ========================================================================
    //  Dequeue
    // ========================================================================

    /// Take the oldest word, or `None` if the ring looks empty.
    pub(crate) fn dequeue(&self) -> Option<u64> {
        if self.threshold.load(READ_ORD) < 0 {
            return None;
        }

        loop {
            let head: u64 = self.head.fetch_add(1, FAA_ORD);
            let slot: &Slot = self.slot(head);
            let cycle_head: u64 = head / self.capacity;

            loop {
                let entry: Entry = slot.load();

                if entry.cycle() == cycle_head {
                    slot.consume();
                    return Some(entry.data());
                }

                if entry.cycle() >= cycle_head {
                    break;
                }

                // Older lap: advance the slot so a late enqueuer skips it.
                let advanced: Entry = if entry.is_empty() {
                    Entry::new(entry.is_safe(), true, cycle_head, 0)
                } else {
                    Entry::new(false, false, entry.cycle(), entry.data())
                };

                if slot.compare_exchange(entry, advanced) {
                    break;
                }
            }

            let tail: u64 = self.tail.load(READ_ORD) & INDEX_MASK;
            if tail <= head + 1 {
                self.fixstate(head + 1);
                self.threshold.fetch_sub(1, FAA_ORD);
                return None;
            }

            if self.threshold.fetch_sub(1, FAA_ORD) <= 0 {
                return None;
            }
        }
    }

    /// Pull `tail` up to `head` after dequeuers overshot it.
    fn fixstate(&self, original_head: u64) {
        loop {
            let head: u64 = self.head.load(READ_ORD);
            if original_head < head {
                // A later dequeuer owns the fix.
                return;
            }

            // Raw compare: a closed tail is always >= head.
            let tail: u64 = self.tail.load(READ_ORD);
            if tail >= head {
                return;
            }

            if self
                .tail
                .compare_exchange(tail, head, CAS_SUCCESS, CAS_FAILURE)
                .is_ok()
            {
                bump(&FIXSTATE_COUNT);
                trace_log!(from = tail, to = head, "ring: tail pulled up to head");
                return;
            }
        }
    }

    // ========================================================================
    //  Segment lifecycle
    // ========================================================================

    /// Set the closed bit so every later enqueue fails.
    #[inline]
    pub(crate) fn close(&self) {
        self.tail.fetch_or(CLOSED_BIT, CAS_SUCCESS);
    }

    /// True once [`close`](Self::close) has run.
    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.tail.load(READ_ORD) & CLOSED_BIT != 0
    }

    /// Re-arm the empty fast path so a final dequeue scans the ring.
    #[inline]
    pub(crate) fn reopen_threshold(&self) {
        self.threshold.store(self.full_threshold(), WRITE_ORD);
    }

    /// Return to the freshly built state. The caller must own the ring.
    pub(crate) fn reset(&mut self) {
        for slot in &*self.slots {
            slot.reset();
        }

        *self.head.get_mut() = self.capacity;
        *self.tail.get_mut() = self.capacity;
        *self.threshold.get_mut() = -1;
        *self.next.get_mut() = StdPtr::null_mut();
    }
}
