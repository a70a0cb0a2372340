//! `SkipSet` - a concurrent ordered set.
//!
//! Writers lock only the nodes around the key they touch; readers never lock.
//! Iteration via [`SkipSet::range`] is weakly consistent: it sees every element
//! present for the whole traversal and may or may not see concurrent changes.
//!
//! # Example
//!
//! ```rust
//! use collectx::Int64Set;
//!
//! let set = Int64Set::new();
//! for v in [20, 22, 21] {
//!     set.add(v);
//! }
//!
//! let mut seen = Vec::new();
//! set.range(|v| {
//!     seen.push(*v);
//!     true
//! });
//! assert_eq!(seen, [20, 21, 22]);
//!
//! assert!(set.remove(&21));
//! assert_eq!(set.len(), 2);
//! ```

use std::borrow::Borrow;
use std::fmt as StdFmt;

use seize::LocalGuard;

use crate::compare::{Ascending, Comparator, Descending, HashOrder, Reversed};
use crate::level::LevelConfig;
use crate::skiplist::{Insert, SkipList};

/// Concurrent ordered set of unique keys.
///
/// See the [module docs](self) for the concurrency contract.
pub struct SkipSet<K, C = Ascending> {
    list: SkipList<K, (), C>,
}

/// `i64` keys, ascending.
pub type Int64Set = SkipSet<i64>;

/// `i64` keys, descending.
pub type Int64SetDesc = SkipSet<i64, Descending>;

/// `u64` keys, ascending.
pub type Uint64Set = SkipSet<u64>;

/// String keys ordered by hash, then by content.
pub type StringSet = SkipSet<String, HashOrder>;

/// Reverse of [`StringSet`]'s order.
pub type StringSetDesc = SkipSet<String, Reversed<HashOrder>>;

impl<K, C> SkipSet<K, C>
where
    K: Send + Sync + 'static,
    C: Comparator<K>,
{
    /// Create an empty set with default level parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LevelConfig::default())
    }

    /// Create an empty set with custom level parameters.
    #[must_use]
    pub fn with_config(config: LevelConfig) -> Self {
        Self {
            list: SkipList::new(config),
        }
    }

    /// Enter a protected region for the `*_with_guard` methods.
    ///
    /// Holding a guard delays reclamation of removed nodes, so keep it short.
    #[must_use]
    #[inline(always)]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.list.guard()
    }

    /// Number of elements.
    ///
    /// Exact when no writer is running, approximate otherwise.
    #[must_use]
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True if the set has no elements.
    #[must_use]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum tower height of this set.
    #[must_use]
    pub const fn max_level(&self) -> usize {
        self.list.max_level()
    }

    /// Insert `key`. Returns false if it was already present.
    pub fn add(&self, key: K) -> bool {
        self.add_with_guard(key, &self.guard())
    }

    /// [`add`](Self::add) with a caller-provided guard from [`guard`](Self::guard).
    pub fn add_with_guard(&self, key: K, guard: &LocalGuard<'_>) -> bool {
        matches!(
            self.list.insert(key, (), true, |()| {}, guard),
            Insert::Inserted(_)
        )
    }

    /// True if `key` is present. Never blocks.
    #[must_use]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        self.contains_with_guard(key, &self.guard())
    }

    /// [`contains`](Self::contains) with a caller-provided guard.
    #[must_use]
    pub fn contains_with_guard<Q>(&self, key: &Q, guard: &LocalGuard<'_>) -> bool
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        self.list.find(key, guard).is_some()
    }

    /// Remove `key`. Returns true only for the call that removed it.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        self.remove_with_guard(key, &self.guard())
    }

    /// [`remove`](Self::remove) with a caller-provided guard.
    pub fn remove_with_guard<Q>(&self, key: &Q, guard: &LocalGuard<'_>) -> bool
    where
        Q: ?Sized,
        K: Borrow<Q>,
        C: Comparator<Q>,
    {
        self.list.remove(key, guard).is_some()
    }

    /// Call `f` on each element in order until it returns false.
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&K) -> bool,
    {
        let guard = self.guard();
        self.list.for_each(|node| f(node.key()), &guard);
    }
}

impl<K, C> Default for SkipSet<K, C>
where
    K: Send + Sync + 'static,
    C: Comparator<K>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, C> StdFmt::Debug for SkipSet<K, C>
where
    K: StdFmt::Debug + Send + Sync + 'static,
    C: Comparator<K>,
{
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        let mut set = f.debug_set();
        self.range(|key| {
            set.entry(key);
            true
        });
        set.finish()
    }
}

impl<K, C> Extend<K> for SkipSet<K, C>
where
    K: Send + Sync + 'static,
    C: Comparator<K>,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        let guard = self.guard();
        for key in iter {
            self.add_with_guard(key, &guard);
        }
    }
}

impl<K, C> FromIterator<K> for SkipSet<K, C>
where
    K: Send + Sync + 'static,
    C: Comparator<K>,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
