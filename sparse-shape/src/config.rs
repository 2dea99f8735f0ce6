//! Process-wide shape configuration: a pruning threshold, process-scoped,
//! initialized to a small positive default.
//!
//! Resolved here as an explicit value threaded through every operation
//! rather than a bare mutable global, with [`ShapeConfig::global`] kept
//! around as a convenience default for callers that want the old ambient
//! ergonomics, split between an explicit config value and a lazily-
//! initialized global convenience default.

use std::sync::OnceLock;

use crate::error::ShapeError;

/// Default threshold: small and positive, on the order of machine epsilon
/// for `f64`.
const DEFAULT_THRESHOLD: f64 = 1e-12;

/// Holds the pruning threshold below which a tile's normalized norm is
/// hard-zeroed. Immutable once built; construct a new one to change it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeConfig {
    threshold: f64,
}

impl ShapeConfig {
    /// Builds a config with an explicit threshold.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::InvalidThreshold`] if `threshold` is not
    /// strictly positive.
    pub fn new(threshold: f64) -> Result<Self, ShapeError> {
        if threshold <= 0.0 || !threshold.is_finite() {
            return Err(ShapeError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    /// The configured threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// A lazily-initialized process-wide default, for callers that don't
    /// want to thread a `ShapeConfig` through every call site.
    #[must_use]
    pub fn global() -> &'static ShapeConfig {
        static GLOBAL: OnceLock<ShapeConfig> = OnceLock::new();
        GLOBAL.get_or_init(|| ShapeConfig::new(DEFAULT_THRESHOLD).expect("default threshold is valid"))
    }
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD).expect("default threshold is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_thresholds() {
        assert!(matches!(
            ShapeConfig::new(0.0),
            Err(ShapeError::InvalidThreshold(_))
        ));
        assert!(matches!(
            ShapeConfig::new(-1.0),
            Err(ShapeError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn global_is_stable_across_calls() {
        let a = ShapeConfig::global();
        let b = ShapeConfig::global();
        assert_eq!(a.threshold(), b.threshold());
    }
}
