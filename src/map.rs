//! `SkipMap` - a concurrent ordered map.
//!
//! Values are stored as `Arc<V>`. Readers clone the `Arc` without locking;
//! [`SkipMap::store`] on an existing key swaps the value in place and retires
//! the old one once no reader can still be using it.
//!
//! # Insert-once semantics
//!
//! [`SkipMap::load_or_store`] and [`SkipMap::load_or_store_lazy`] are exact:
//! when many threads race on one absent key, one links its node and every
//! other caller returns that same `Arc`. The lazy factory runs at most once
//! per call, and only in the call that wins.
//!
//! # Example
//!
//! ```rust
//! use collectx::StringMap;
//!
//! let map: StringMap<u32> = StringMap::new();
//! map.store("a".to_string(), 1);
//!
//! let (v, loaded) = map.load_or_store("a".to_string(), 2);
//! assert!(loaded);
//! assert_eq!(*v, 1);
//!
//! assert_eq!(map.load_and_delete("a").as_deref(), Some(&1));
//! assert!(map.is_empty());
//! ```

use std::borrow::Borrow;
use std::fmt as StdFmt;
use std::sync::Arc;

use seize::LocalGuard;

use crate::compare::{Ascending, Comparator, Descending, HashOrder, Reversed};
use crate::level::LevelConfig;
use crate::skiplist::{ArcSlot, Insert, SkipList};

/// Concurrent ordered map.
///
/// See the [module docs](self) for the concurrency contract.
pub struct SkipMap<K, V, C = Ascending> {
    list: SkipList<K, ArcSlot<V>, C>,
}

/// `i64` keys, ascending.
pub type Int64Map<V> = SkipMap<i64, V>;

/// `i64` keys, descending.
pub type Int64MapDesc<V> = SkipMap<i64, V, Descending>;

/// String keys ordered by hash, then by content.
pub type StringMap<V> = SkipMap<String, V, HashOrder>;

/// Reverse of [`StringMap`]'s order.
pub type StringMapDesc<V> = SkipMap<String, V, Reversed<HashOrder>>;

impl<K, V, C> SkipMap<K, V, C>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    C: Comparator<K>,
{
    /// Create an empty map with default level parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LevelConfig::default())
    }

    /// Create an empty map with custom level parameters.
    #[must_use]
    pub fn with_config(config: LevelConfig) -> Self {
        Self {
            list: SkipList::new(config),
        }
    }

    /// Enter a protected region for the `*_with_guard` methods.
    #[must_use]
    #[inline(always)]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.list.guard()
    }

    /// Number of entries.
    #[must_use]
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True if the map has no entries.
    #[must_use]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    //  Writes
    // ========================================================================

    /// Insert or overwrite the value for `key`.
    pub fn store(&self, key: K, value: V) {
        self.store_with_guard(key, value, &self.guard());
    }

    /// [`store`](Self::store) with a caller-provided guard.
    pub fn store_with_guard(&self, key: K, value: V, guard: &LocalGuard<'_>) {
        let slot: ArcSlot<V> = ArcSlot::new(Arc::new(value));

        // An existing entry is overwritten even if it is still being linked.
        if let Insert::Found { node, slot, .. } = self.list.insert(key, slot, false, |_| {}, guard) {
            if let Some(value) = slot.into_inner() {
                node.slot().store(value, guard);
            }
        }
    }

    /// Return the existing value for `key`, or insert `value`.
    ///
    /// The flag is true when the value was already present.
    pub fn load_or_store(&self, key: K, value: V) -> (Arc<V>, bool) {
        let guard = self.guard();
        let value: Arc<V> = Arc::new(value);
        let mut key: K = key;

        loop {
            match self
                .list
                .insert(key, ArcSlot::new(Arc::clone(&value)), true, |_| {}, &guard)
            {
                Insert::Inserted(_) => return (value, false),

                Insert::Found { node, key: back, .. } => {
                    if let Some(existing) = node.slot().load(&guard) {
                        return (existing, true);
                    }
                    key = back;
                }
            }
        }
    }

    /// Like [`load_or_store`](Self::load_or_store), but builds the value with
    /// `f` only if this call inserts it.
    pub fn load_or_store_lazy<F>(&self, key: K, f: F) -> (Arc<V>, bool)
    where
        F: FnOnce() -> V,
    {
        let guard = self.guard();
        let mut factory: Option<F> = Some(f);
        let mut created: Option<Arc<V>> = None;
        let mut key: K = key;

        loop {
            let outcome = self.list.insert(
                key,
                ArcSlot::empty(),
                true,
                |slot| {
                    if let Some(f) = factory.take() {
                        let value: Arc<V> = Arc::new(f());
                        created = Some(Arc::clone(&value));
                        slot.fill(value);
                    }
                },
                &guard,
            );

            match outcome {
                Insert::Inserted(_) => {
                    let Some(value) = created.take() else {
                        unreachable!("publish runs before an insert is reported");
                    };
                    return (value, false);
                }

                Insert::Found { node, key: back, .. } => {
                    if let Some(existing) = node.slot().load(&guard) {
                        return (existing, true);
                    }
                    key = back;
                }
            }
        }
    }

    /// Remove `key` and return its value.
    ///
    /// Among concurrent callers for one key, exactly one gets the value.
    pub fn load_and_delete<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        let guard = self.guard();
        let node = self.list.remove(key, &guard)?;
        node.slot().load(&guard)
    }

    /// Remove `key`. Returns true only for the call that removed it.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        let guard = self.guard();
        self.list.remove(key, &guard).is_some()
    }

    // ========================================================================
    //  Reads
    // ========================================================================

    /// Clone the value for `key`. Never blocks.
    #[must_use]
    pub fn load<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        self.load_with_guard(key, &self.guard())
    }

    /// [`load`](Self::load) with a caller-provided guard.
    #[must_use]
    pub fn load_with_guard<Q>(&self, key: &Q, guard: &LocalGuard<'_>) -> Option<Arc<V>>
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        self.list.find(key, guard)?.slot().load(guard)
    }

    /// True if `key` is present.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        let guard = self.guard();
        self.list.find(key, &guard).is_some()
    }

    /// Call `f` on each entry in key order until it returns false.
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let guard = self.guard();
        self.list.for_each(
            |node| match node.slot().get(&guard) {
                Some(value) => f(node.key(), value),
                None => true,
            },
            &guard,
        );
    }
}

impl<K, V, C> Default for SkipMap<K, V, C>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    C: Comparator<K>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> StdFmt::Debug for SkipMap<K, V, C>
where
    K: StdFmt::Debug + Send + Sync + 'static,
    V: StdFmt::Debug + Send + Sync + 'static,
    C: Comparator<K>,
{
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        let mut map = f.debug_map();
        self.range(|key, value| {
            map.entry(key, value);
            true
        });
        map.finish()
    }
}

impl<K, V, C> Extend<(K, V)> for SkipMap<K, V, C>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    C: Comparator<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let guard = self.guard();
        for (key, value) in iter {
            self.store_with_guard(key, value, &guard);
        }
    }
}

impl<K, V, C> FromIterator<(K, V)> for SkipMap<K, V, C>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    C: Comparator<K>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_load_overwrite() {
        let map: Int64Map<&str> = Int64Map::new();
        map.store(1, "one");
        assert_eq!(map.load(&1).as_deref(), Some(&"one"));

        map.store(1, "uno");
        assert_eq!(map.load(&1).as_deref(), Some(&"uno"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_load_or_store_twice() {
        let map: Int64Map<u32> = Int64Map::new();

        let (first, loaded) = map.load_or_store(7, 100);
        assert!(!loaded);
        assert_eq!(*first, 100);

        let (second, loaded) = map.load_or_store(7, 200);
        assert!(loaded);
        assert_eq!(*second, 100);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_lazy_factory_skipped_when_present() {
        let map: Int64Map<u32> = Int64Map::new();
        map.store(1, 10);

        let (v, loaded) = map.load_or_store_lazy(1, || panic!("factory must not run"));
        assert!(loaded);
        assert_eq!(*v, 10);

        let mut calls = 0;
        let (v, loaded) = map.load_or_store_lazy(2, || {
            calls += 1;
            20
        });
        assert!(!loaded);
        assert_eq!(*v, 20);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_load_and_delete() {
        let map: Int64Map<String> = Int64Map::new();
        map.store(3, "three".to_string());

        assert_eq!(map.load_and_delete(&3).as_deref().map(String::as_str), Some("three"));
        assert!(map.load_and_delete(&3).is_none());
        assert!(!map.delete(&3));
        assert!(map.is_empty());
    }

    #[test]
    fn test_old_value_survives_overwrite() {
        let map: Int64Map<Vec<u8>> = Int64Map::new();
        map.store(1, vec![1, 2, 3]);

        let held = map.load(&1).unwrap();
        map.store(1, vec![9]);
        assert_eq!(*held, vec![1, 2, 3]);
        assert_eq!(*map.load(&1).unwrap(), vec![9]);
    }

    #[test]
    fn test_range_in_order() {
        let map: Int64MapDesc<i64> = (0..5).map(|k| (k, k * 10)).collect();
        let mut seen = Vec::new();
        map.range(|k, v| {
            seen.push((*k, *v));
            true
        });
        assert_eq!(seen, vec![(4, 40), (3, 30), (2, 20), (1, 10), (0, 0)]);
    }

    #[test]
    fn test_string_map_borrowed() {
        let map: StringMapDesc<usize> = StringMapDesc::new();
        map.store("k".to_string(), 1);
        assert!(map.contains_key("k"));
        assert_eq!(map.load("k").as_deref(), Some(&1));
        assert!(map.delete("k"));
        assert!(!map.contains_key("k"));
    }

    #[test]
    fn test_values_dropped_with_map() {
        let probe = Arc::new(());
        {
            let map: Int64Map<Arc<()>> = Int64Map::new();
            map.store(1, Arc::clone(&probe));
            map.store(1, Arc::clone(&probe));
            map.store(2, Arc::clone(&probe));
            let _ = map.load_and_delete(&2);
        }
        assert_eq!(Arc::strong_count(&probe), 1);
    }

    #[test]
    fn test_debug() {
        let map: Int64Map<char> = [(2, 'b'), (1, 'a')].into_iter().collect();
        assert_eq!(format!("{map:?}"), "{1: 'a', 2: 'b'}");
    }
}
