//! Packed ring slot: `(flags, data)` in one 128-bit atomic.
//!
//! # Layout
//! ```text
//! bit 127      bit 126      bits 64..126     bits 0..64
//! [ is_safe ] [ is_empty ] [    cycle    ] [    data    ]
//! ```
//!
//! Flags and data always change together through one CAS, so a reader never
//! pairs a fresh cycle with stale data. On targets without a native 16-byte
//! CAS, `portable-atomic` substitutes a lock-based implementation with the
//! same all-or-nothing semantics.

use portable_atomic::AtomicU128;

use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD, WRITE_ORD};

/// Slot may be filled by an enqueuer that is behind the dequeue head.
pub const SAFE_BIT: u64 = 1 << 63;

/// Slot holds no data.
pub const EMPTY_BIT: u64 = 1 << 62;

/// Lap counter bits.
pub const CYCLE_MASK: u64 = EMPTY_BIT - 1;

// ============================================================================
//  Entry
// ============================================================================

/// A decoded slot value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    raw: u128,
}

impl Entry {
    /// Initial state of every slot: safe, empty, cycle 0.
    pub const INITIAL: Self = Self::new(true, true, 0, 0);

    /// Pack flags and data.
    #[inline(always)]
    #[must_use]
    pub const fn new(safe: bool, empty: bool, cycle: u64, data: u64) -> Self {
        let mut flags: u64 = cycle & CYCLE_MASK;
        if safe {
            flags |= SAFE_BIT;
        }
        if empty {
            flags |= EMPTY_BIT;
        }

        Self {
            raw: ((flags as u128) << 64) | data as u128,
        }
    }

    #[inline(always)]
    const fn from_raw(raw: u128) -> Self {
        Self { raw }
    }

    #[inline(always)]
    #[expect(clippy::cast_possible_truncation, reason = "high half of a u128")]
    const fn flags(self) -> u64 {
        (self.raw >> 64) as u64
    }

    /// Safe bit.
    #[inline(always)]
    #[must_use]
    pub const fn is_safe(self) -> bool {
        self.flags() & SAFE_BIT != 0
    }

    /// Empty bit.
    #[inline(always)]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.flags() & EMPTY_BIT != 0
    }

    /// Lap counter.
    #[inline(always)]
    #[must_use]
    pub const fn cycle(self) -> u64 {
        self.flags() & CYCLE_MASK
    }

    /// Payload word.
    #[inline(always)]
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "low half of a u128")]
    pub const fn data(self) -> u64 {
        self.raw as u64
    }

    /// Same flags with the empty bit set and data cleared.
    #[inline(always)]
    #[must_use]
    pub const fn consumed(self) -> Self {
        Self::from_raw(((self.flags() | EMPTY_BIT) as u128) << 64)
    }
}

// ============================================================================
//  Slot
// ============================================================================

/// One ring cell.
#[derive(Debug)]
pub struct Slot {
    cell: AtomicU128,
}

impl Default for Slot {
    fn default() -> Self {
        Self::new()
    }
}

impl Slot {
    /// A slot in the [`Entry::INITIAL`] state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: AtomicU128::new(Entry::INITIAL.raw),
        }
    }

    /// Load both halves at once.
    #[inline(always)]
    #[must_use]
    pub fn load(&self) -> Entry {
        Entry::from_raw(self.cell.load(READ_ORD))
    }

    /// Replace `current` with `new` if the slot still holds `current`.
    #[inline(always)]
    pub fn compare_exchange(&self, current: Entry, new: Entry) -> bool {
        self.cell
            .compare_exchange(current.raw, new.raw, CAS_SUCCESS, CAS_FAILURE)
            .is_ok()
    }

    /// Mark the slot empty and clear its data, keeping cycle and safe bit.
    ///
    /// Racing dequeuers may flip the safe bit concurrently, so this retries
    /// on the latest value instead of storing blindly.
    #[inline]
    pub fn consume(&self) {
        let _ = self
            .cell
            .fetch_update(CAS_SUCCESS, CAS_FAILURE, |raw| {
                Some(Entry::from_raw(raw).consumed().raw)
            });
    }

    /// Return to the initial state. Only for slots nobody else can reach.
    #[inline]
    pub fn reset(&self) {
        self.cell.store(Entry::INITIAL.raw, WRITE_ORD);
    }
}
