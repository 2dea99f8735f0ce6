//! Internal adaptor layer: both [`crate::SingleArgOp`] and
//! [`crate::PairArgOp`] get folded down to one shape ([`Reducer`]) so the
//! scheduling engine in `task.rs` is written exactly once.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::op::{PairArgOp, SingleArgOp};

/// What the engine needs from an operator, independent of whether it came
/// from a [`SingleArgOp`] or a [`PairArgOp`].
pub(crate) trait Reducer: Send + Sync + 'static {
    type Contribution: Send + 'static;
    type Output: Send + Clone + 'static;

    fn identity(&self) -> Self::Output;
    fn combine(&self, result: &mut Self::Output, other: Self::Output);
    fn reduce_one(&self, result: &mut Self::Output, contribution: Self::Contribution);
    fn reduce_two(
        &self,
        result: &mut Self::Output,
        a: Self::Contribution,
        b: Self::Contribution,
    );
    fn finalize(&self, result: Self::Output) -> Self::Output;
}

pub(crate) struct SingleAdaptor<Op>(pub Op);

impl<Op: SingleArgOp> Reducer for SingleAdaptor<Op> {
    type Contribution = Op::Value;
    type Output = Op::Output;

    fn identity(&self) -> Self::Output {
        self.0.identity()
    }

    fn combine(&self, result: &mut Self::Output, other: Self::Output) {
        self.0.combine(result, other);
    }

    fn reduce_one(&self, result: &mut Self::Output, contribution: Self::Contribution) {
        self.0.reduce(result, contribution);
    }

    fn reduce_two(&self, result: &mut Self::Output, a: Self::Contribution, b: Self::Contribution) {
        self.0.reduce_two(result, a, b);
    }

    fn finalize(&self, result: Self::Output) -> Self::Output {
        self.0.finalize(result)
    }
}

pub(crate) struct PairAdaptor<Op>(pub Op);

impl<Op: PairArgOp> Reducer for PairAdaptor<Op> {
    type Contribution = (Op::Left, Op::Right);
    type Output = Op::Output;

    fn identity(&self) -> Self::Output {
        self.0.identity()
    }

    fn combine(&self, result: &mut Self::Output, other: Self::Output) {
        self.0.combine(result, other);
    }

    fn reduce_one(&self, result: &mut Self::Output, contribution: Self::Contribution) {
        self.0.reduce_pair(result, contribution.0, contribution.1);
    }

    fn reduce_two(&self, result: &mut Self::Output, a: Self::Contribution, b: Self::Contribution) {
        self.0.reduce_two_pairs(result, a.0, a.1, b.0, b.1);
    }

    fn finalize(&self, result: Self::Output) -> Self::Output {
        self.0.finalize(result)
    }
}

/// An argument that has fully arrived: its contribution plus the callback
/// that releases whatever backing storage it held, run once the
/// contribution has been folded in.
pub(crate) struct ReadyPayload<C> {
    contribution: C,
    on_destroy: Option<Box<dyn FnOnce() + Send>>,
}

impl<C> ReadyPayload<C> {
    pub(crate) fn new(contribution: C, on_destroy: Option<Box<dyn FnOnce() + Send>>) -> Self {
        Self {
            contribution,
            on_destroy,
        }
    }

    pub(crate) fn into_parts(self) -> (C, Option<Box<dyn FnOnce() + Send>>) {
        (self.contribution, self.on_destroy)
    }
}

/// Runs `on_destroy` if present. Exists so every call site looks the same,
/// whether the payload was folded normally or abandoned mid-poison.
pub(crate) fn release(on_destroy: Option<Box<dyn FnOnce() + Send>>) {
    if let Some(cb) = on_destroy {
        cb();
    }
}

/// Runs `f`, converting a panic into a human-readable message instead of
/// unwinding past this point. A poisoned reduction is still observable
/// through its result future; an unwound worker thread is not.
pub(crate) fn guarded<F, R>(f: F) -> Result<R, String>
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operator panicked with a non-string payload".to_string()
    }
}
