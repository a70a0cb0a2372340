//! Value storage inside skip-list nodes.
//!
//! Sets carry no value (`()`); maps keep an `Arc<V>` behind an `AtomicPtr` so
//! a store can swap the value in place while lock-free readers clone the
//! current one. Replaced values are retired through the container's collector,
//! so a reader that loaded the old pointer under its guard can still bump the
//! strong count safely.

use std::marker::PhantomData;
use std::ptr as StdPtr;
use std::sync::Arc;
use std::sync::atomic::AtomicPtr;

use seize::{Collector, Guard, LocalGuard};

use crate::ordering::{CAS_SUCCESS, READ_ORD, RELAXED, WRITE_ORD};

/// Per-node payload stored next to the key.
pub(crate) trait ValueSlot: Send + Sync {}

impl ValueSlot for () {}

impl<V: Send + Sync> ValueSlot for ArcSlot<V> {}

// ============================================================================
//  ArcSlot
// ============================================================================

/// An atomically replaceable `Arc<V>`.
///
/// Null only while a lazily built node is still private to its inserter.
pub(crate) struct ArcSlot<V> {
    ptr: AtomicPtr<V>,
    _marker: PhantomData<Arc<V>>,
}

impl<V> ArcSlot<V> {
    pub(crate) fn new(value: Arc<V>) -> Self {
        Self {
            ptr: AtomicPtr::new(Arc::into_raw(value).cast_mut()),
            _marker: PhantomData,
        }
    }

    /// A slot to be filled by [`fill`](Self::fill) before the node is linked.
    pub(crate) const fn empty() -> Self {
        Self {
            ptr: AtomicPtr::new(StdPtr::null_mut()),
            _marker: PhantomData,
        }
    }

    /// Fill an empty slot that no other thread can see yet.
    pub(crate) fn fill(&self, value: Arc<V>) {
        debug_assert!(self.ptr.load(RELAXED).is_null(), "slot already filled");
        self.ptr.store(Arc::into_raw(value).cast_mut(), WRITE_ORD);
    }

    /// Take the value out of a slot that was never published.
    pub(crate) fn into_inner(self) -> Option<Arc<V>> {
        let ptr: *mut V = self.ptr.swap(StdPtr::null_mut(), RELAXED);
        drop(self);

        // SAFETY: ptr came from Arc::into_raw and the slot no longer owns it
        (!ptr.is_null()).then(|| unsafe { Arc::from_raw(ptr) })
    }

    /// Clone the current value.
    pub(crate) fn load(&self, guard: &LocalGuard<'_>) -> Option<Arc<V>> {
        let ptr: *mut V = guard.protect(&self.ptr, READ_ORD);

        if ptr.is_null() {
            return None;
        }

        // SAFETY: ptr came from Arc::into_raw. If it has been swapped out, its
        // release is deferred until our guard drops, so the count is still >= 1.
        unsafe {
            Arc::increment_strong_count(ptr);
            Some(Arc::from_raw(ptr))
        }
    }

    /// Borrow the current value for the lifetime of `guard`.
    pub(crate) fn get<'g>(&'g self, guard: &'g LocalGuard<'_>) -> Option<&'g V> {
        let ptr: *mut V = guard.protect(&self.ptr, READ_ORD);

        // SAFETY: see `load`; the allocation outlives the guard borrow
        unsafe { ptr.as_ref() }
    }

    /// Replace the value, retiring the old one through `guard`.
    pub(crate) fn store(&self, value: Arc<V>, guard: &LocalGuard<'_>)
    where
        V: 'static,
    {
        let new_ptr: *mut V = Arc::into_raw(value).cast_mut();
        let old_ptr: *mut V = self.ptr.swap(new_ptr, CAS_SUCCESS);

        if !old_ptr.is_null() {
            // SAFETY: old_ptr came from Arc::into_raw and is unreachable from
            // the slot now; readers that already hold it are covered by guards.
            unsafe {
                guard.defer_retire(old_ptr, reclaim_arc::<V>);
            }
        }
    }
}

impl<V> Drop for ArcSlot<V> {
    fn drop(&mut self) {
        let ptr: *mut V = *self.ptr.get_mut();

        if !ptr.is_null() {
            // SAFETY: the slot owns one strong count
            drop(unsafe { Arc::from_raw(ptr) });
        }
    }
}

/// Release a replaced map value.
///
/// # Safety
/// `ptr` must come from `Arc::into_raw` and be retired exactly once.
unsafe fn reclaim_arc<V>(ptr: *mut V, _collector: &Collector) {
    // SAFETY: guaranteed by caller
    drop(unsafe { Arc::from_raw(ptr) });
}
