//! Errors this crate raises itself, as distinct from [`substrate::SubstrateError`]
//! values propagated up from a collective all-reduce.

use thiserror::Error;

/// A precondition of the shape algebra was violated by the caller.
#[derive(Debug, Clone, Error)]
pub enum ShapeError {
    /// Two shapes (or a shape and a size-vector list) that an operation
    /// expected to line up did not: mismatched tile-grid shape, mismatched
    /// rank, or a size vector whose length didn't match its axis extent.
    #[error("mismatched shape: {0}")]
    MismatchedRange(String),

    /// A raw norm value was negative. Norms are magnitudes and cannot be.
    #[error("negative norm encountered (value = {0})")]
    NegativeNorm(f64),

    /// A threshold must be strictly positive; non-positive thresholds are
    /// invalid.
    #[error("threshold must be positive (value = {0})")]
    InvalidThreshold(f64),

    /// A permutation mapping was not a bijection on `0..dim`.
    #[error("not a valid permutation of 0..{0}: {1}")]
    InvalidPermutation(usize, String),

    /// The collective all-reduce that precedes normalization failed.
    #[error("collective shape construction failed: {0}")]
    CollectiveFailed(#[from] substrate::error::SubstrateError),
}
