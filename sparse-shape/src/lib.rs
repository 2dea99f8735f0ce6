#![warn(clippy::pedantic)]
#![warn(missing_docs)]
//! A dense tensor of normalized per-tile Frobenius norms that approximates
//! where a distributed block-sparse tensor's nonzero mass lives, plus an
//! algebra of shape-preserving operations (`perm`, `scale`, `add`, `mult`,
//! `gemm`, ...) over it, so a contraction's output sparsity pattern can be
//! estimated without ever materializing the tensor's actual data.
//!
//! [`SparseShape`] stores the product-of-tile-sizes factor implicitly, as
//! per-dimension rank-1 vectors, and only expands it (via a divide-and-
//! conquer outer product) when an operation actually needs the full-rank
//! tensor.

mod config;
mod error;
mod gemm;
mod permutation;
mod shape;
mod transform;

pub use config::ShapeConfig;
pub use error::ShapeError;
pub use gemm::{AxisGemmHelper, GemmHelper};
pub use permutation::Permutation;
pub use shape::SparseShape;
