//! Values that fit in the 64-bit data half of a ring slot.
//!
//! The queue moves one machine word per element so that the `(flags, data)`
//! pair can be swapped with a single 128-bit CAS. Integers are stored as
//! their bits; owning pointers (`Box`, `Arc`) are stored as addresses with
//! their provenance exposed, and reconstructed exactly once on dequeue.

use std::ptr as StdPtr;
use std::sync::Arc;

/// A value that can be packed into and restored from a `u64`.
///
/// # Safety
///
/// `from_word(into_word(v))` must return a value equivalent to `v`, and
/// calling `from_word` once on a word produced by `into_word` must not
/// duplicate ownership. The queue guarantees it calls `from_word` at most
/// once per enqueued word.
pub unsafe trait Payload: Send + 'static {
    /// Pack into a word, giving up ownership.
    fn into_word(self) -> u64;

    /// Restore a value packed by [`into_word`](Self::into_word).
    ///
    /// # Safety
    /// `word` must come from `into_word` on the same type and must not be
    /// restored twice.
    unsafe fn from_word(word: u64) -> Self;
}

// ============================================================================
//  Integers
// ============================================================================

macro_rules! impl_payload_int {
    ($($ty:ty),* $(,)?) => {
        $(
            // SAFETY: integer bits round-trip through u64 unchanged.
            unsafe impl Payload for $ty {
                #[inline(always)]
                #[allow(clippy::cast_sign_loss, clippy::cast_lossless)]
                fn into_word(self) -> u64 {
                    self as u64
                }

                #[inline(always)]
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                unsafe fn from_word(word: u64) -> Self {
                    word as $ty
                }
            }
        )*
    };
}

impl_payload_int!(u64, i64, u32, i32, usize, isize);

// ============================================================================
//  Owning pointers
// ============================================================================

#[inline(always)]
fn addr_to_word(addr: usize) -> u64 {
    addr as u64
}

#[inline(always)]
#[expect(
    clippy::cast_possible_truncation,
    reason = "words come from addr_to_word, so they fit in usize"
)]
const fn word_to_addr(word: u64) -> usize {
    word as usize
}

// SAFETY: the box is leaked into the word and rebuilt once by from_word.
unsafe impl<T: Send + 'static> Payload for Box<T> {
    #[inline]
    fn into_word(self) -> u64 {
        addr_to_word(Box::into_raw(self).expose_provenance())
    }

    #[inline]
    unsafe fn from_word(word: u64) -> Self {
        let ptr: *mut T = StdPtr::with_exposed_provenance_mut(word_to_addr(word));

        // SAFETY: caller guarantees the word came from `into_word`
        unsafe { Box::from_raw(ptr) }
    }
}

// SAFETY: the strong count held by `self` moves into the word and back.
unsafe impl<T: Send + Sync + 'static> Payload for Arc<T> {
    #[inline]
    fn into_word(self) -> u64 {
        addr_to_word(Arc::into_raw(self).expose_provenance())
    }

    #[inline]
    unsafe fn from_word(word: u64) -> Self {
        let ptr: *const T = StdPtr::with_exposed_provenance(word_to_addr(word));

        // SAFETY: caller guarantees the word came from `into_word`
        unsafe { Arc::from_raw(ptr) }
    }
}
