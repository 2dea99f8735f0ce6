//! Error taxonomy for the substrate layer.

use std::sync::Arc;

use thiserror::Error;

/// Failures that can occur in the host runtime's future/task-queue/collective
/// layer, and that must be allowed to propagate into a [`ReduceTask`]'s
/// result future as a poisoned state.
///
/// [`ReduceTask`]: https://docs.rs/reduce-task
#[derive(Debug, Clone, Error)]
pub enum SubstrateError {
    /// A producing future resolved to an error rather than a value.
    #[error("upstream future failed: {0}")]
    UpstreamFailed(String),

    /// The host runtime canceled an upstream future before it settled.
    #[error("upstream future was canceled")]
    Canceled,

    /// The task queue rejected a submission (e.g. it has been shut down).
    #[error("task queue exhausted, could not submit task")]
    Exhausted,

    /// The collective all-reduce-sum failed.
    #[error("collective all-reduce failed: {0}")]
    CollectiveFailed(String),
}

/// A cheaply cloneable handle to a [`SubstrateError`], used so that a single
/// failure can be observed by every callback registered on a future.
pub type SharedError = Arc<SubstrateError>;
