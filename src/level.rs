//! Random tower heights for skip-list nodes.
//!
//! Heights follow a geometric distribution: level `k` is drawn with
//! probability `p^(k-1) * (1 - p)`, capped at the configured max level.
//! The draw uses `fastrand`'s thread-local generator, so it never contends.

use crate::config::ConfigError;

/// Hard cap on tower height. Sizes the predecessor/successor arrays and the
/// head tower.
pub const MAX_LEVEL: usize = 32;

/// Default promotion probability.
pub const DEFAULT_PROBABILITY: f64 = 0.25;

// ============================================================================
//  LevelConfig
// ============================================================================

/// Tower height parameters.
///
/// # Example
///
/// ```rust
/// use collectx::LevelConfig;
///
/// let cfg = LevelConfig::new(16, 0.5).unwrap();
/// assert_eq!(cfg.max_level(), 16);
///
/// assert!(LevelConfig::new(0, 0.25).is_err());
/// assert!(LevelConfig::new(8, 1.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelConfig {
    max_level: usize,
    probability: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            max_level: MAX_LEVEL,
            probability: DEFAULT_PROBABILITY,
        }
    }
}

impl LevelConfig {
    /// Build a validated config.
    ///
    /// # Errors
    /// [`ConfigError::MaxLevelOutOfRange`] unless `1 <= max_level <= 32`,
    /// [`ConfigError::ProbabilityOutOfRange`] unless `0 < probability < 1`.
    pub fn new(max_level: usize, probability: f64) -> Result<Self, ConfigError> {
        if max_level == 0 || max_level > MAX_LEVEL {
            return Err(ConfigError::MaxLevelOutOfRange(max_level));
        }

        // Written as a negated range check so NaN is rejected too.
        if !(probability > 0.0 && probability < 1.0) {
            return Err(ConfigError::ProbabilityOutOfRange(probability));
        }

        Ok(Self {
            max_level,
            probability,
        })
    }

    /// Maximum tower height.
    #[inline]
    #[must_use]
    pub const fn max_level(&self) -> usize {
        self.max_level
    }

    /// Promotion probability.
    #[inline]
    #[must_use]
    pub const fn probability(&self) -> f64 {
        self.probability
    }
}

// ============================================================================
//  LevelGenerator
// ============================================================================

/// Draws tower heights for one container.
#[derive(Debug, Clone, Copy)]
pub struct LevelGenerator {
    max_level: usize,

    /// `p` scaled to the `u32` range; a draw below it promotes one level.
    threshold: u32,
}

impl LevelGenerator {
    /// Build a generator from a validated config.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "probability is in (0, 1), so the product fits in u32"
    )]
    pub fn new(config: LevelConfig) -> Self {
        let threshold: u32 = (config.probability * f64::from(u32::MAX)) as u32;

        Self {
            max_level: config.max_level,
            threshold,
        }
    }

    /// Maximum height this generator returns.
    #[inline]
    #[must_use]
    pub const fn max_level(&self) -> usize {
        self.max_level
    }

    /// Draw a height in `1..=max_level`.
    #[inline]
    #[must_use]
    pub fn next_level(&self) -> usize {
        let mut level: usize = 1;

        while level < self.max_level && fastrand::u32(..) < self.threshold {
            level += 1;
        }

        level
    }
}

impl Default for LevelGenerator {
    fn default() -> Self {
        Self::new(LevelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = LevelConfig::default();
        assert_eq!(cfg.max_level(), 32);
        assert!((cfg.probability() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_bad_max_level() {
        assert_eq!(
            LevelConfig::new(33, 0.25),
            Err(ConfigError::MaxLevelOutOfRange(33))
        );
        assert_eq!(
            LevelConfig::new(0, 0.25),
            Err(ConfigError::MaxLevelOutOfRange(0))
        );
    }

    #[test]
    fn test_rejects_bad_probability() {
        assert!(LevelConfig::new(8, 0.0).is_err());
        assert!(LevelConfig::new(8, 1.0).is_err());
        assert!(LevelConfig::new(8, -0.5).is_err());
        assert!(LevelConfig::new(8, f64::NAN).is_err());
    }

    #[test]
    fn test_levels_in_range() {
        let generator = LevelGenerator::new(LevelConfig::new(6, 0.9).unwrap());
        for _ in 0..10_000 {
            let level = generator.next_level();
            assert!((1..=6).contains(&level));
        }
    }

    #[test]
    fn test_max_level_one_is_flat() {
        let generator = LevelGenerator::new(LevelConfig::new(1, 0.75).unwrap());
        for _ in 0..1_000 {
            assert_eq!(generator.next_level(), 1);
        }
    }

    #[test]
    fn test_distribution_is_geometric() {
        let generator = LevelGenerator::default();
        let draws = 100_000;
        let ones = (0..draws).filter(|_| generator.next_level() == 1).count();

        // P(level = 1) = 1 - p = 0.75
        #[expect(clippy::cast_precision_loss, reason = "small counts")]
        let ratio = ones as f64 / f64::from(draws);
        assert!((0.72..0.78).contains(&ratio), "ratio = {ratio}");
    }
}
