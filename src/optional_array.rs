//! Forward-pointer storage for skip-list towers.
//!
//! Most towers are short (with `p = 0.25`, about 99.6% of nodes have four
//! levels or fewer), so the first [`INLINE_LEVELS`] pointers live inside the
//! node and only taller towers pay for a heap block holding the rest.
//!
//! ```text
//! level:   0   1   2   3 | 4   5   ...  len-1
//!        [ inline array ] [ overflow (boxed slice) ]
//! ```

use std::ptr as StdPtr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Pointers stored inline before spilling to the heap.
pub const INLINE_LEVELS: usize = 4;

/// A fixed-length array of atomic pointers with inline small-size storage.
///
/// The length is chosen at construction and never changes.
///
/// # Example
///
/// ```rust
/// use collectx::optional_array::OptionalArray;
/// use std::sync::atomic::Ordering;
///
/// let arr: OptionalArray<u64> = OptionalArray::new(6);
/// assert_eq!(arr.len(), 6);
/// assert!(arr.load(5, Ordering::Relaxed).is_null());
/// ```
pub struct OptionalArray<T> {
    base: [AtomicPtr<T>; INLINE_LEVELS],

    /// Levels `INLINE_LEVELS..len`. Empty (and unallocated) for short towers.
    extra: Box<[AtomicPtr<T>]>,

    len: usize,
}

impl<T> OptionalArray<T> {
    /// Create an array of `len` null pointers.
    ///
    /// # Panics
    /// Panics in debug builds if `len` is zero.
    #[must_use]
    pub fn new(len: usize) -> Self {
        debug_assert!(len > 0, "tower must have at least one level");

        let extra: Box<[AtomicPtr<T>]> = if len > INLINE_LEVELS {
            (INLINE_LEVELS..len)
                .map(|_| AtomicPtr::new(StdPtr::null_mut()))
                .collect()
        } else {
            Box::new([])
        };

        Self {
            base: [const { AtomicPtr::new(StdPtr::null_mut()) }; INLINE_LEVELS],
            extra,
            len,
        }
    }

    /// Number of levels.
    #[inline(always)]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always false; towers have at least one level.
    #[inline(always)]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The atomic cell for `level`.
    ///
    /// # Panics
    /// Panics if `level >= len`.
    #[inline(always)]
    #[must_use]
    pub fn get(&self, level: usize) -> &AtomicPtr<T> {
        assert!(level < self.len, "level {level} out of range {}", self.len);

        if level < INLINE_LEVELS {
            &self.base[level]
        } else {
            &self.extra[level - INLINE_LEVELS]
        }
    }

    /// Load the pointer at `level`.
    #[inline(always)]
    #[must_use]
    pub fn load(&self, level: usize, order: Ordering) -> *mut T {
        self.get(level).load(order)
    }

    /// Store `ptr` at `level`.
    #[inline(always)]
    pub fn store(&self, level: usize, ptr: *mut T, order: Ordering) {
        self.get(level).store(ptr, order);
    }

    /// True if this array owns a heap overflow block.
    #[inline]
    #[must_use]
    pub fn spilled(&self) -> bool {
        !self.extra.is_empty()
    }
}

impl<T> std::fmt::Debug for OptionalArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionalArray")
            .field("len", &self.len)
            .field("spilled", &self.spilled())
            .finish_non_exhaustive()
    }
}
