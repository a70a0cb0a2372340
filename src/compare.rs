//! Key comparators for the skip list.
//!
//! A comparator orders keys in two stages: a cheap `u64` prefix computed once
//! per key (stored in the node), then a full comparison only when prefixes tie.
//! Integer keys use a constant prefix and fall straight through to `Ord`;
//! string keys use a 64-bit hash as the prefix and the string itself as the
//! tie-break, which keeps the order total (two distinct strings never compare
//! equal, even on a hash collision).
//!
//! The order produced by [`HashOrder`] is stable for a given build but is not
//! lexicographic.

use std::cmp::Ordering;
use std::hash::Hasher;

use rustc_hash::FxHasher;

/// A total order over `T`, split into a prefix and a tie-break.
///
/// Implementations must be consistent: `compare_prefixed(prefix(a), a,
/// prefix(b), b)` defines a strict total order, and for borrowed lookups the
/// owned and borrowed forms of one key must produce the same prefix.
pub trait Comparator<T: ?Sized> {
    /// Coarse ordering key, computed once per key.
    fn prefix(key: &T) -> u64;

    /// Full comparison, used when prefixes are equal.
    fn compare(a: &T, b: &T) -> Ordering;

    /// Compare two keys given their prefixes.
    #[inline(always)]
    fn compare_prefixed(a_prefix: u64, a: &T, b_prefix: u64, b: &T) -> Ordering {
        a_prefix
            .cmp(&b_prefix)
            .then_with(|| Self::compare(a, b))
    }
}

// ============================================================================
//  Ascending
// ============================================================================

/// Natural `Ord` order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ascending;

impl<T: Ord + ?Sized> Comparator<T> for Ascending {
    #[inline(always)]
    fn prefix(_key: &T) -> u64 {
        0
    }

    #[inline(always)]
    fn compare(a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

// ============================================================================
//  Reversed
// ============================================================================

/// Reverses another comparator, prefix included.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reversed<C>(C);

/// Natural order, largest first.
pub type Descending = Reversed<Ascending>;

impl<T: ?Sized, C: Comparator<T>> Comparator<T> for Reversed<C> {
    #[inline(always)]
    fn prefix(key: &T) -> u64 {
        C::prefix(key)
    }

    #[inline(always)]
    fn compare(a: &T, b: &T) -> Ordering {
        C::compare(b, a)
    }

    #[inline(always)]
    fn compare_prefixed(a_prefix: u64, a: &T, b_prefix: u64, b: &T) -> Ordering {
        C::compare_prefixed(b_prefix, b, a_prefix, a)
    }
}

// ============================================================================
//  HashOrder
// ============================================================================

/// Hash first, then byte-wise string comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashOrder;

/// The 64-bit hash used as the [`HashOrder`] prefix.
#[inline]
#[must_use]
pub fn string_hash(s: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(s.as_bytes());
    hasher.finish()
}

impl<T: AsRef<str> + ?Sized> Comparator<T> for HashOrder {
    #[inline(always)]
    fn prefix(key: &T) -> u64 {
        string_hash(key.as_ref())
    }

    #[inline(always)]
    fn compare(a: &T, b: &T) -> Ordering {
        a.as_ref().cmp(b.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp<C: Comparator<T>, T: ?Sized>(a: &T, b: &T) -> Ordering {
        C::compare_prefixed(C::prefix(a), a, C::prefix(b), b)
    }

    #[test]
    fn test_ascending() {
        assert_eq!(cmp::<Ascending, i64>(&1, &2), Ordering::Less);
        assert_eq!(cmp::<Ascending, i64>(&2, &2), Ordering::Equal);
        assert_eq!(cmp::<Ascending, i64>(&i64::MIN, &i64::MAX), Ordering::Less);
    }

    #[test]
    fn test_descending() {
        assert_eq!(cmp::<Descending, i64>(&1, &2), Ordering::Greater);
        assert_eq!(cmp::<Descending, i64>(&2, &2), Ordering::Equal);
        assert_eq!(cmp::<Descending, u64>(&u64::MAX, &0), Ordering::Less);
    }

    #[test]
    fn test_hash_order_is_total() {
        let words = ["", "a", "b", "ab", "ba", "hello", "world", "hello "];
        for a in words {
            for b in words {
                let ord = cmp::<HashOrder, str>(a, b);
                assert_eq!(ord == Ordering::Equal, a == b, "{a:?} vs {b:?}");
                assert_eq!(ord.reverse(), cmp::<HashOrder, str>(b, a));
            }
        }
    }

    #[test]
    fn test_hash_order_owned_matches_borrowed() {
        let owned = String::from("key-17");
        assert_eq!(
            <HashOrder as Comparator<String>>::prefix(&owned),
            <HashOrder as Comparator<str>>::prefix("key-17")
        );
    }

    #[test]
    fn test_hash_tie_breaks_on_string() {
        // Equal prefixes force the string comparison.
        assert_eq!(
            <HashOrder as Comparator<str>>::compare_prefixed(7, "a", 7, "b"),
            Ordering::Less
        );
        assert_eq!(
            <HashOrder as Comparator<str>>::compare_prefixed(6, "b", 7, "a"),
            Ordering::Less
        );
    }

    #[test]
    fn test_reversed_hash_order() {
        let a = "alpha";
        let b = "beta";
        assert_eq!(
            cmp::<Reversed<HashOrder>, str>(a, b),
            cmp::<HashOrder, str>(b, a)
        );
    }
}
