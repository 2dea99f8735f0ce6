//! Errors this crate raises itself, as distinct from [`substrate::SubstrateError`]
//! values that arrive already-settled on an upstream future and simply get
//! propagated.

use thiserror::Error;

/// A precondition of the reduction protocol was violated by the caller.
#[derive(Debug, Clone, Copy, Error)]
pub enum ReduceTaskError {
    /// [`crate::ReduceTask::add`] (or [`crate::PairReduceTask::add`]) was
    /// called after [`crate::ReduceTask::submit`] had already run. The
    /// protocol requires every argument to be registered before the task is
    /// closed off; by the time `submit` runs the sentinel count has already
    /// been released and a late argument could arrive after the terminal
    /// step.
    #[error("add() called after submit() on the same reduce task")]
    AlreadySubmitted,
}
