//! Construction-time configuration for the queue and the shared
//! configuration error type.
//!
//! Nothing here is read at runtime: a container validates its config once in
//! its constructor and keeps only the derived constants.

use std::fmt as StdFmt;

use crate::level::MAX_LEVEL;

/// Default number of slots in one ring segment.
pub const DEFAULT_SEGMENT_CAPACITY: usize = 1 << 16;

/// Smallest ring a queue accepts (one cache line of slots).
pub const MIN_SEGMENT_CAPACITY: usize = 4;

/// Largest ring a queue accepts.
pub const MAX_SEGMENT_CAPACITY: usize = 1 << (usize::BITS / 2);

/// Default number of drained segments kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 8;

// ============================================================================
//  ConfigError
// ============================================================================

/// Errors reported when a container is built from an invalid configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Ring capacity must be a power of two so indices can be masked.
    SegmentCapacityNotPowerOfTwo(usize),

    /// Ring capacity is below [`MIN_SEGMENT_CAPACITY`].
    SegmentCapacityTooSmall(usize),

    /// Ring capacity is above [`MAX_SEGMENT_CAPACITY`].
    SegmentCapacityTooLarge(usize),

    /// Skip-list max level outside `1..=MAX_LEVEL`.
    MaxLevelOutOfRange(usize),

    /// Level probability outside the open interval `(0, 1)`.
    ProbabilityOutOfRange(f64),
}

impl StdFmt::Display for ConfigError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::SegmentCapacityNotPowerOfTwo(cap) => {
                write!(f, "segment capacity {cap} is not a power of two")
            }

            Self::SegmentCapacityTooSmall(cap) => {
                write!(
                    f,
                    "segment capacity {cap} is below the minimum of {MIN_SEGMENT_CAPACITY}"
                )
            }

            Self::SegmentCapacityTooLarge(cap) => {
                write!(
                    f,
                    "segment capacity {cap} is above the maximum of {MAX_SEGMENT_CAPACITY}"
                )
            }

            Self::MaxLevelOutOfRange(level) => {
                write!(f, "max level {level} is outside 1..={MAX_LEVEL}")
            }

            Self::ProbabilityOutOfRange(p) => {
                write!(f, "level probability {p} is outside (0, 1)")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
//  QueueConfig
// ============================================================================

/// Configuration for [`LinkedQueue`](crate::queue::LinkedQueue).
///
/// # Example
///
/// ```rust
/// use collectx::{ConfigError, QueueConfig};
///
/// let cfg = QueueConfig::default().segment_capacity(1024);
/// assert!(cfg.validate().is_ok());
///
/// let bad = QueueConfig::default().segment_capacity(1000);
/// assert_eq!(bad.validate(), Err(ConfigError::SegmentCapacityNotPowerOfTwo(1000)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Slots per ring segment. Power of two, at least [`MIN_SEGMENT_CAPACITY`].
    pub segment_capacity: usize,

    /// Drained segments kept for reuse. Zero disables pooling.
    pub pool_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl QueueConfig {
    /// Set the ring segment capacity.
    #[must_use]
    pub const fn segment_capacity(mut self, capacity: usize) -> Self {
        self.segment_capacity = capacity;
        self
    }

    /// Set the segment pool capacity.
    #[must_use]
    pub const fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    /// [`ConfigError::SegmentCapacityTooSmall`],
    /// [`ConfigError::SegmentCapacityTooLarge`] or
    /// [`ConfigError::SegmentCapacityNotPowerOfTwo`].
    pub const fn validate(&self) -> Result<(), ConfigError> {
        validate_segment_capacity(self.segment_capacity)
    }
}

/// Check a ring capacity: a power of two in
/// `MIN_SEGMENT_CAPACITY..=MAX_SEGMENT_CAPACITY`.
///
/// # Errors
/// See [`QueueConfig::validate`].
pub const fn validate_segment_capacity(capacity: usize) -> Result<(), ConfigError> {
    if capacity < MIN_SEGMENT_CAPACITY {
        return Err(ConfigError::SegmentCapacityTooSmall(capacity));
    }

    if capacity > MAX_SEGMENT_CAPACITY {
        return Err(ConfigError::SegmentCapacityTooLarge(capacity));
    }

    if !capacity.is_power_of_two() {
        return Err(ConfigError::SegmentCapacityNotPowerOfTwo(capacity));
    }

    Ok(())
}
