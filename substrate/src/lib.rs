#![warn(clippy::pedantic)]
#![warn(missing_docs)]
//! Contracts consumed from the host distributed runtime: a settable future,
//! a priority task queue, and a collective all-reduce-sum.
//!
//! This crate is deliberately thin. The actual distributed process group,
//! remote-reference mechanism and task scheduler live outside this
//! workspace; what's here is the narrow interface `reduce-task` and
//! `sparse-shape` are written against, plus [`local::LocalExecutor`], an
//! in-process stand-in used by tests and doctests.

pub mod all_reduce;
pub mod error;
pub mod future;
pub mod local;
pub mod task_queue;

pub use all_reduce::AllReduceSum;
pub use error::SubstrateError;
pub use future::SettableFuture;
pub use task_queue::{Priority, TaskQueue};
