//! Process-wide debug counters.
//!
//! Relaxed atomics bumped on the slow paths of the skip list and the queue.
//! They cost one uncontended `fetch_add` on paths that already lost a race,
//! so they stay compiled in. Counters are global to the process, not to a
//! container; reset them before a measured run.

use std::sync::atomic::AtomicU64;

use crate::ordering::RELAXED;

/// Skip-list insert attempts that failed validation or met a marked node.
pub static SKIP_INSERT_RETRY_COUNT: AtomicU64 = AtomicU64::new(0);

/// Skip-list remove attempts that failed validation.
pub static SKIP_REMOVE_RETRY_COUNT: AtomicU64 = AtomicU64::new(0);

/// Inserts that spun on a node waiting for it to become fully linked.
pub static SKIP_LINK_WAIT_COUNT: AtomicU64 = AtomicU64::new(0);

/// Segments appended to an unbounded queue.
pub static SEGMENT_APPEND_COUNT: AtomicU64 = AtomicU64::new(0);

/// Drained segments returned to a pool.
pub static SEGMENT_RECYCLE_COUNT: AtomicU64 = AtomicU64::new(0);

/// Segment appends served from the pool instead of the allocator.
pub static SEGMENT_POOL_HIT_COUNT: AtomicU64 = AtomicU64::new(0);

/// Times a dequeuer pulled a lagging ring tail forward.
pub static FIXSTATE_COUNT: AtomicU64 = AtomicU64::new(0);

/// Snapshot of every debug counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugCounters {
    /// See [`SKIP_INSERT_RETRY_COUNT`].
    pub insert_retry: u64,
    /// See [`SKIP_REMOVE_RETRY_COUNT`].
    pub remove_retry: u64,
    /// See [`SKIP_LINK_WAIT_COUNT`].
    pub link_wait: u64,
    /// See [`SEGMENT_APPEND_COUNT`].
    pub segment_append: u64,
    /// See [`SEGMENT_RECYCLE_COUNT`].
    pub segment_recycle: u64,
    /// See [`SEGMENT_POOL_HIT_COUNT`].
    pub segment_pool_hit: u64,
    /// See [`FIXSTATE_COUNT`].
    pub fixstate: u64,
}

#[inline(always)]
pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, RELAXED);
}

/// Read every counter.
#[must_use]
pub fn get_debug_counters() -> DebugCounters {
    DebugCounters {
        insert_retry: SKIP_INSERT_RETRY_COUNT.load(RELAXED),
        remove_retry: SKIP_REMOVE_RETRY_COUNT.load(RELAXED),
        link_wait: SKIP_LINK_WAIT_COUNT.load(RELAXED),
        segment_append: SEGMENT_APPEND_COUNT.load(RELAXED),
        segment_recycle: SEGMENT_RECYCLE_COUNT.load(RELAXED),
        segment_pool_hit: SEGMENT_POOL_HIT_COUNT.load(RELAXED),
        fixstate: FIXSTATE_COUNT.load(RELAXED),
    }
}

/// Zero every counter.
pub fn reset_debug_counters() {
    for counter in [
        &SKIP_INSERT_RETRY_COUNT,
        &SKIP_REMOVE_RETRY_COUNT,
        &SKIP_LINK_WAIT_COUNT,
        &SEGMENT_APPEND_COUNT,
        &SEGMENT_RECYCLE_COUNT,
        &SEGMENT_POOL_HIT_COUNT,
        &FIXSTATE_COUNT,
    ] {
        counter.store(0, RELAXED);
    }
}
