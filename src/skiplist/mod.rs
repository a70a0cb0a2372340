//! Generic concurrent skip list (lazy, optimistic).
//!
//! This is the engine behind [`SkipSet`](crate::SkipSet) and
//! [`SkipMap`](crate::SkipMap). Keys are ordered by a [`Comparator`]; each
//! node carries a [`ValueSlot`] (`()` for sets, an [`ArcSlot`] for maps).
//!
//! # Concurrency Model
//!
//! - **Readers** (`find`, `for_each`) take no locks. They walk forward
//!   pointers under a `seize` guard and report a node only if it is fully
//!   linked and not marked.
//! - **Inserters** search for predecessors, lock each distinct predecessor from
//!   level 0 upward, validate that nothing changed, then splice the node in at
//!   every level and set `FULLY_LINKED`.
//! - **Removers** only act on a node found at its own top level. They lock the
//!   node, set `MARKED` (a second remover sees the mark and gives up), lock
//!   the predecessors in the same bottom-up order, validate, and unlink from
//!   the top level down. The node lock stays held across validation retries.
//!
//! Every path locks predecessors in ascending level order and skips repeats,
//! so two writers can never wait on each other in a cycle.
//!
//! # Memory Reclamation
//!
//! Unlinked nodes are handed to `guard.defer_retire`; they are freed once no
//! guard that could have observed them is alive. Nodes still linked when the
//! list is dropped are freed by `Drop`.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::ptr as StdPtr;
use std::sync::atomic::{AtomicIsize, AtomicPtr, AtomicUsize};

use crossbeam_utils::Backoff;
use parking_lot::{Mutex, MutexGuard};
use seize::{Collector, Guard, LocalGuard};

use crate::compare::Comparator;
use crate::flags::{FULLY_LINKED, MARKED, NodeFlags};
use crate::level::{LevelConfig, LevelGenerator, MAX_LEVEL};
use crate::optional_array::OptionalArray;
use crate::ordering::{READ_ORD, RELAXED, WRITE_ORD};
use crate::stats::{
    SKIP_INSERT_RETRY_COUNT, SKIP_LINK_WAIT_COUNT, SKIP_REMOVE_RETRY_COUNT, bump,
};
use crate::tracing_helpers::trace_log;

mod slot;

pub(crate) use slot::{ArcSlot, ValueSlot};

// ============================================================================
//  Tower / Node
// ============================================================================

/// The linking part of a node: lock, lifecycle flags, forward pointers.
///
/// The list head is a bare tower of [`MAX_LEVEL`] levels.
pub(crate) struct Tower<N> {
    lock: Mutex<()>,
    flags: NodeFlags,
    next: OptionalArray<N>,
}

impl<N> Tower<N> {
    fn new(levels: usize) -> Self {
        Self {
            lock: Mutex::new(()),
            flags: NodeFlags::new(),
            next: OptionalArray::new(levels),
        }
    }

    #[inline(always)]
    fn next(&self, level: usize) -> &AtomicPtr<N> {
        self.next.get(level)
    }
}

/// A skip-list element.
pub(crate) struct Node<K, S> {
    tower: Tower<Self>,
    key: K,

    /// Comparator prefix of `key`, computed once at insert.
    prefix: u64,

    slot: S,
}

impl<K, S> Node<K, S> {
    fn new(key: K, prefix: u64, slot: S, levels: usize) -> Self {
        Self {
            tower: Tower::new(levels),
            key,
            prefix,
            slot,
        }
    }

    #[inline(always)]
    pub(crate) const fn key(&self) -> &K {
        &self.key
    }

    #[inline(always)]
    pub(crate) const fn slot(&self) -> &S {
        &self.slot
    }

    /// Fully linked and not marked.
    #[inline(always)]
    pub(crate) fn is_live(&self) -> bool {
        self.tower.flags.is_live()
    }

    #[inline(always)]
    const fn levels(&self) -> usize {
        self.tower.next.len()
    }

    /// Order of this node's key relative to `key`.
    #[inline(always)]
    fn cmp_key<Q, C>(&self, prefix: u64, key: &Q) -> Ordering
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        C::compare_prefixed(self.prefix, self.key.borrow(), prefix, key)
    }
}

/// Outcome of [`SkipList::insert`].
pub(crate) enum Insert<'g, K, S> {
    /// A new node was linked.
    Inserted(&'g Node<K, S>),

    /// The key was already present; the unused key and slot are handed back.
    Found {
        node: &'g Node<K, S>,
        key: K,
        slot: S,
    },
}

type Preds<'g, K, S> = [&'g Tower<Node<K, S>>; MAX_LEVEL];
type Succs<K, S> = [*mut Node<K, S>; MAX_LEVEL];

// ============================================================================
//  SkipList
// ============================================================================

/// Concurrent ordered list of unique keys.
pub(crate) struct SkipList<K, S, C> {
    head: Tower<Node<K, S>>,

    /// Highest level any insert has asked for. Never decreases.
    highest_level: AtomicUsize,

    /// Live node count. Bumped after link, dropped after unlink.
    length: AtomicIsize,

    levels: LevelGenerator,
    collector: Collector,

    // Nodes are owned through raw pointers, so opt out of the auto traits
    // and restore them below with the right bounds.
    _marker: PhantomData<(*const (), Box<Node<K, S>>, fn() -> C)>,
}

// SAFETY: keys and slots move between threads (inserted on one, dropped on
// another) and are shared by readers, so both must be Send + Sync. The
// comparator is only used through static functions.
unsafe impl<K: Send + Sync, S: Send + Sync, C> Send for SkipList<K, S, C> {}

// SAFETY: see above; all shared mutation goes through atomics and node locks.
unsafe impl<K: Send + Sync, S: Send + Sync, C> Sync for SkipList<K, S, C> {}

impl<K: 'static, S: ValueSlot + 'static, C> SkipList<K, S, C> {
    pub(crate) fn new(config: LevelConfig) -> Self {
        Self {
            head: Tower::new(MAX_LEVEL),
            highest_level: AtomicUsize::new(1),
            length: AtomicIsize::new(0),
            levels: LevelGenerator::new(config),
            collector: Collector::new(),
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    pub(crate) fn guard(&self) -> LocalGuard<'_> {
        self.collector.enter()
    }

    /// Live element count, clamped at zero while a remove overtakes an insert.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        usize::try_from(self.length.load(RELAXED)).unwrap_or(0)
    }

    pub(crate) const fn max_level(&self) -> usize {
        self.levels.max_level()
    }

    /// Draw a level and raise `highest_level` to cover it.
    fn random_level(&self) -> usize {
        let level: usize = self.levels.next_level();
        self.highest_level.fetch_max(level, WRITE_ORD);
        level
    }

    // ========================================================================
    //  Search
    // ========================================================================

    /// Walk right on `level` from `pred` until the successor is not less
    /// than `key`. Returns the last tower before it, the successor, and how
    /// the successor compares to `key` (`None` at the end of the level).
    #[inline(always)]
    fn scan_level<'g, Q>(
        mut pred: &'g Tower<Node<K, S>>,
        level: usize,
        prefix: u64,
        key: &Q,
        guard: &'g LocalGuard<'_>,
    ) -> (&'g Tower<Node<K, S>>, *mut Node<K, S>, Option<Ordering>)
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        loop {
            let succ: *mut Node<K, S> = guard.protect(pred.next(level), READ_ORD);

            // SAFETY: succ was loaded under `guard`, so it is not reclaimed yet
            let Some(node) = (unsafe { succ.as_ref() }) else {
                return (pred, succ, None);
            };

            let ord: Ordering = node.cmp_key::<Q, C>(prefix, key);
            if ord != Ordering::Less {
                return (pred, succ, Some(ord));
            }

            pred = &node.tower;
        }
    }

    /// Fill `preds`/`succs` from the highest level down and return the
    /// highest level on which `key` was found.
    ///
    /// With `stop_at_found`, the search returns as soon as it sees the key and
    /// the lower entries of `preds`/`succs` are left stale.
    fn search<'g, Q>(
        &'g self,
        prefix: u64,
        key: &Q,
        preds: &mut Preds<'g, K, S>,
        succs: &mut Succs<K, S>,
        stop_at_found: bool,
        guard: &'g LocalGuard<'_>,
    ) -> Option<usize>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        let mut pred: &'g Tower<Node<K, S>> = &self.head;
        let mut found: Option<usize> = None;

        for level in (0..self.highest_level.load(READ_ORD)).rev() {
            let (last, succ, ord) = Self::scan_level(pred, level, prefix, key, guard);
            pred = last;
            preds[level] = last;
            succs[level] = succ;

            if found.is_none() && ord == Some(Ordering::Equal) {
                found = Some(level);
                if stop_at_found {
                    break;
                }
            }
        }

        found
    }

    /// Lock-free lookup: the live node holding `key`, if any.
    pub(crate) fn find<'g, Q>(&'g self, key: &Q, guard: &'g LocalGuard<'_>) -> Option<&'g Node<K, S>>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        let prefix: u64 = C::prefix(key);
        let mut pred: &'g Tower<Node<K, S>> = &self.head;

        for level in (0..self.highest_level.load(READ_ORD)).rev() {
            let (last, succ, ord) = Self::scan_level(pred, level, prefix, key, guard);

            if ord == Some(Ordering::Equal) {
                // SAFETY: compared equal, so non-null and protected by guard
                let node: &'g Node<K, S> = unsafe { &*succ };
                return node.is_live().then_some(node);
            }

            pred = last;
        }

        None
    }

    /// Visit live nodes in order on level 0 until `f` returns false.
    pub(crate) fn for_each<'g, F>(&'g self, mut f: F, guard: &'g LocalGuard<'_>)
    where
        F: FnMut(&'g Node<K, S>) -> bool,
    {
        let mut cursor: *mut Node<K, S> = guard.protect(self.head.next(0), READ_ORD);

        // SAFETY: every pointer is loaded under `guard`
        while let Some(node) = unsafe { cursor.as_ref() } {
            if node.is_live() && !f(node) {
                return;
            }

            cursor = guard.protect(node.tower.next(0), READ_ORD);
        }
    }

    /// Spin until a node found unmarked finishes linking.
    fn wait_linked(node: &Node<K, S>) {
        if node.tower.flags.get(FULLY_LINKED) {
            return;
        }

        bump(&SKIP_LINK_WAIT_COUNT);
        let backoff = Backoff::new();
        while !node.tower.flags.get(FULLY_LINKED) {
            backoff.snooze();
        }
    }

    // ========================================================================
    //  Insert
    // ========================================================================

    /// Insert `key` with `slot` unless the key is present.
    ///
    /// When the key exists and is not being removed, returns
    /// [`Insert::Found`] with `key` and `slot` handed back. With `wait_linked`, waits
    /// first until that node is fully linked.
    ///
    /// `publish` runs exactly once, on the winning attempt only, after the
    /// predecessors are locked and validated and before the node becomes
    /// reachable.
    pub(crate) fn insert<'g, P>(
        &'g self,
        key: K,
        slot: S,
        wait_linked: bool,
        publish: P,
        guard: &'g LocalGuard<'_>,
    ) -> Insert<'g, K, S>
    where
        C: Comparator<K>,
        P: FnOnce(&S),
    {
        let prefix: u64 = C::prefix(&key);
        let level: usize = self.random_level();

        let mut preds: Preds<'g, K, S> = [&self.head; MAX_LEVEL];
        let mut succs: Succs<K, S> = [StdPtr::null_mut(); MAX_LEVEL];

        loop {
            if let Some(found_level) =
                self.search(prefix, &key, &mut preds, &mut succs, true, guard)
            {
                // SAFETY: compared equal, so non-null and protected by guard
                let found: &'g Node<K, S> = unsafe { &*succs[found_level] };

                if !found.tower.flags.get(MARKED) {
                    if wait_linked {
                        Self::wait_linked(found);
                    }
                    return Insert::Found {
                        node: found,
                        key,
                        slot,
                    };
                }

                // A remover owns it; retry once it is unlinked.
                bump(&SKIP_INSERT_RETRY_COUNT);
                trace_log!(key_level = found_level, "insert: key is being removed, retrying");
                continue;
            }

            // Dropping this array releases every predecessor lock.
            let mut held: [Option<MutexGuard<'g, ()>>; MAX_LEVEL] = [const { None }; MAX_LEVEL];
            let mut prev_pred: *const Tower<Node<K, S>> = StdPtr::null();
            let mut valid: bool = true;

            for layer in 0..level {
                let pred: &'g Tower<Node<K, S>> = preds[layer];
                let succ: *mut Node<K, S> = succs[layer];

                if !StdPtr::eq(pred, prev_pred) {
                    held[layer] = Some(pred.lock.lock());
                    prev_pred = pred;
                }

                // SAFETY: succ was loaded under guard
                let succ_marked: bool =
                    unsafe { succ.as_ref() }.is_some_and(|s| s.tower.flags.get(MARKED));

                valid = !pred.flags.get(MARKED)
                    && !succ_marked
                    && pred.next(layer).load(READ_ORD) == succ;

                if !valid {
                    break;
                }
            }

            if !valid {
                drop(held);
                bump(&SKIP_INSERT_RETRY_COUNT);
                trace_log!(tower_height = level, "insert: predecessor changed, retrying");
                continue;
            }

            let node_ptr: *mut Node<K, S> =
                Box::into_raw(Box::new(Node::new(key, prefix, slot, level)));

            // SAFETY: just allocated; freed only after being unlinked and retired
            let node: &'g Node<K, S> = unsafe { &*node_ptr };
            publish(&node.slot);

            for layer in 0..level {
                node.tower.next(layer).store(succs[layer], RELAXED);
                preds[layer].next(layer).store(node_ptr, WRITE_ORD);
            }

            node.tower.flags.set(FULLY_LINKED);
            drop(held);

            self.length.fetch_add(1, RELAXED);
            return Insert::Inserted(node);
        }
    }

    // ========================================================================
    //  Remove
    // ========================================================================

    /// Unlink the live node holding `key`.
    ///
    /// Returns the removed node; it stays readable for the lifetime of
    /// `guard` and is reclaimed afterwards. Returns `None` if the key is
    /// absent, not yet fully linked, or claimed by a concurrent remover.
    pub(crate) fn remove<'g, Q>(&'g self, key: &Q, guard: &'g LocalGuard<'_>) -> Option<&'g Node<K, S>>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        let prefix: u64 = C::prefix(key);

        let mut preds: Preds<'g, K, S> = [&self.head; MAX_LEVEL];
        let mut succs: Succs<K, S> = [StdPtr::null_mut(); MAX_LEVEL];

        // Set once this call has marked the node; the node lock is held from
        // then until the node is unlinked.
        let mut claimed: Option<(&'g Node<K, S>, MutexGuard<'g, ()>)> = None;
        let mut top_layer: usize = 0;

        loop {
            let found_level: Option<usize> =
                self.search(prefix, key, &mut preds, &mut succs, false, guard);

            let victim: &'g Node<K, S> = if let Some(node) = claimed.as_ref().map(|(n, _)| *n) {
                node
            } else {
                let level: usize = found_level?;

                // SAFETY: compared equal, so non-null and protected by guard
                let node: &'g Node<K, S> = unsafe { &*succs[level] };

                // Only act when the node was found at its own top level.
                if !(node.is_live() && node.levels() - 1 == level) {
                    return None;
                }

                let node_lock: MutexGuard<'g, ()> = node.tower.lock.lock();
                if node.tower.flags.get(MARKED) {
                    return None;
                }

                node.tower.flags.set(MARKED);
                top_layer = level;
                claimed = Some((node, node_lock));
                node
            };

            let victim_ptr: *mut Node<K, S> = StdPtr::from_ref(victim).cast_mut();

            let mut held: [Option<MutexGuard<'g, ()>>; MAX_LEVEL] = [const { None }; MAX_LEVEL];
            let mut prev_pred: *const Tower<Node<K, S>> = StdPtr::null();
            let mut valid: bool = true;

            for layer in 0..=top_layer {
                let pred: &'g Tower<Node<K, S>> = preds[layer];

                if !StdPtr::eq(pred, prev_pred) {
                    held[layer] = Some(pred.lock.lock());
                    prev_pred = pred;
                }

                valid = !pred.flags.get(MARKED) && pred.next(layer).load(READ_ORD) == victim_ptr;

                if !valid {
                    break;
                }
            }

            if !valid {
                drop(held);
                bump(&SKIP_REMOVE_RETRY_COUNT);
                trace_log!(top_layer, "remove: predecessor changed, retrying");
                continue;
            }

            for layer in (0..=top_layer).rev() {
                let next: *mut Node<K, S> = victim.tower.next(layer).load(READ_ORD);
                preds[layer].next(layer).store(next, WRITE_ORD);
            }

            drop(claimed);
            drop(held);
            self.length.fetch_sub(1, RELAXED);

            // SAFETY: unlinked from every level; new readers cannot reach it
            // and current ones hold guards.
            unsafe {
                guard.defer_retire(victim_ptr, reclaim_node::<K, S>);
            }

            return Some(victim);
        }
    }
}

impl<K, S, C> Drop for SkipList<K, S, C> {
    fn drop(&mut self) {
        let mut cursor: *mut Node<K, S> = self.head.next(0).load(RELAXED);

        while !cursor.is_null() {
            // SAFETY: `&mut self` rules out other users; every linked node is
            // owned by the list and visited once on level 0.
            let node: Box<Node<K, S>> = unsafe { Box::from_raw(cursor) };
            cursor = node.tower.next(0).load(RELAXED);
        }
    }
}

/// Free an unlinked node.
///
/// # Safety
/// `ptr` must come from `Box::into_raw` and be retired exactly once.
unsafe fn reclaim_node<K, S>(ptr: *mut Node<K, S>, _collector: &Collector) {
    // SAFETY: guaranteed by caller
    drop(unsafe { Box::from_raw(ptr) });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{Ascending, Descending};

    type IntList = SkipList<i64, (), Ascending>;

    fn add(list: &IntList, key: i64) -> bool {
        let guard = list.guard();
        matches!(list.insert(key, (), true, |()| {}, &guard), Insert::Inserted(_))
    }

    fn keys<C: Comparator<i64>>(list: &SkipList<i64, (), C>) -> Vec<i64> {
        let guard = list.guard();
        let mut out = Vec::new();
        list.for_each(
            |node| {
                out.push(*node.key());
                true
            },
            &guard,
        );
        out
    }

    #[test]
    fn test_empty() {
        let list = IntList::new(LevelConfig::default());
        let guard = list.guard();
        assert_eq!(list.len(), 0);
        assert!(list.find(&1, &guard).is_none());
        assert!(list.remove(&1, &guard).is_none());
    }

    #[test]
    fn test_insert_find_remove() {
        let list = IntList::new(LevelConfig::default());
        assert!(add(&list, 10));
        assert!(!add(&list, 10));
        assert_eq!(list.len(), 1);

        let guard = list.guard();
        assert_eq!(list.find(&10, &guard).map(Node::key), Some(&10));

        let removed = list.remove(&10, &guard).unwrap();
        assert_eq!(*removed.key(), 10);
        assert!(list.find(&10, &guard).is_none());
        assert!(list.remove(&10, &guard).is_none());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_order_and_tall_towers() {
        // Force tall towers to exercise the overflow block.
        let list = IntList::new(LevelConfig::new(MAX_LEVEL, 0.9).unwrap());
        for key in [5, 1, 9, 3, 7, 2, 8] {
            assert!(add(&list, key));
        }
        assert_eq!(keys(&list), vec![1, 2, 3, 5, 7, 8, 9]);

        let guard = list.guard();
        for key in [1, 5, 9] {
            assert!(list.remove(&key, &guard).is_some());
        }
        drop(guard);
        assert_eq!(keys(&list), vec![2, 3, 7, 8]);
    }

    #[test]
    fn test_descending_order() {
        let list: SkipList<i64, (), Descending> = SkipList::new(LevelConfig::default());
        let guard = list.guard();
        for key in [2, 3, 1] {
            let _ = list.insert(key, (), true, |()| {}, &guard);
        }
        drop(guard);
        assert_eq!(keys(&list), vec![3, 2, 1]);
    }

    #[test]
    fn test_found_returns_slot() {
        let list: SkipList<i64, ArcSlot<u8>, Ascending> = SkipList::new(LevelConfig::default());
        let guard = list.guard();

        let first = list.insert(1, ArcSlot::new(std::sync::Arc::new(1)), true, |_| {}, &guard);
        assert!(matches!(first, Insert::Inserted(_)));

        match list.insert(1, ArcSlot::new(std::sync::Arc::new(2)), true, |_| {}, &guard) {
            Insert::Found { node, slot, .. } => {
                assert_eq!(node.slot().get(&guard), Some(&1));
                assert_eq!(slot.into_inner().as_deref(), Some(&2));
            }
            Insert::Inserted(_) => panic!("duplicate key inserted"),
        }
    }

    #[test]
    fn test_publish_runs_only_on_insert() {
        let list = IntList::new(LevelConfig::default());
        let guard = list.guard();
        let mut calls = 0;

        let _ = list.insert(4, (), true, |()| calls += 1, &guard);
        let _ = list.insert(4, (), true, |()| calls += 1, &guard);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_highest_level_monotonic() {
        let list = IntList::new(LevelConfig::default());
        let mut last = list.highest_level.load(RELAXED);
        for key in 0..500 {
            assert!(add(&list, key));
            let now = list.highest_level.load(RELAXED);
            assert!(now >= last);
            last = now;
        }

        let guard = list.guard();
        for key in 0..500 {
            assert!(list.remove(&key, &guard).is_some());
        }
        assert_eq!(list.highest_level.load(RELAXED), last);
        assert_eq!(list.len(), 0);
    }
}
