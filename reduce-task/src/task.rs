//! The "R" half of the protocol: a single shared instance pairing up ready
//! arguments two at a time and folding each settlement into one running
//! result, with no caller-visible lock held while the operator itself runs.
//!
//! # Closing the set and the merge race
//!
//! `outstanding` counts arguments that have been registered via
//! [`ReduceTaskImpl::begin_argument`] but not yet folded into some result.
//! `submitted` latches once [`ReduceTaskImpl::submit`] has been called,
//! after which no more arguments may be added. The terminal step may only
//! run once both `submitted` is set and `outstanding` has fallen to zero;
//! checking either alone is not enough, since arguments can still be
//! in-flight toward `outstanding == 0` when the caller closes the set, and
//! the set can still be open when a coincidental `outstanding == 0` happens
//! to occur mid-reduction (more arguments may yet be added).
//!
//! More than one worker can be mid-fold at once (say two disjoint pairs
//! resolve around the same time), each holding its own partial `result`
//! that hasn't been parked into `ready_result` yet. If the decrement that
//! brings `outstanding` to zero happened outside the slot lock, whichever
//! worker observed the zero could race a sibling that already decremented
//! but hasn't parked its own result yet, and finish without ever merging it
//! in. To rule that out, every decrement happens *while holding* `slots`,
//! in the same critical section that decides whether to fold from a parked
//! slot, merge a parked result, park, or finish. That serializes the
//! decrement sequence with the merge sequence: whichever worker's decrement
//! observes zero is also the one guaranteed, by lock ordering, to see every
//! earlier sibling's contribution already parked or already merged into
//! what it is currently holding.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use substrate::error::{SharedError, SubstrateError};
use substrate::future::LocalFuture;
use substrate::task_queue::{Priority, TaskQueue};
use tracing::{debug, trace};

use crate::error::ReduceTaskError;
use crate::reducer::{guarded, release, ReadyPayload, Reducer};

struct Slots<C, O> {
    ready_result: Option<O>,
    ready_arg: Option<ReadyPayload<C>>,
}

pub(crate) struct ReduceTaskImpl<Red: Reducer> {
    op: Red,
    slots: Mutex<Slots<Red::Contribution, Red::Output>>,
    outstanding: AtomicUsize,
    submitted: AtomicBool,
    finished: AtomicBool,
    poisoned: AtomicBool,
    count: AtomicUsize,
    task_queue: Arc<dyn TaskQueue>,
    result_future: Arc<LocalFuture<Red::Output>>,
    completion_cb: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl<Red: Reducer> ReduceTaskImpl<Red> {
    pub(crate) fn new(
        op: Red,
        task_queue: Arc<dyn TaskQueue>,
        completion_cb: Option<Box<dyn FnOnce() + Send>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            op,
            slots: Mutex::new(Slots {
                ready_result: None,
                ready_arg: None,
            }),
            outstanding: AtomicUsize::new(0),
            submitted: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
            count: AtomicUsize::new(0),
            task_queue,
            result_future: Arc::new(LocalFuture::new()),
            completion_cb: Mutex::new(completion_cb),
        })
    }

    pub(crate) fn result_future(&self) -> Arc<LocalFuture<Red::Output>> {
        Arc::clone(&self.result_future)
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Registers one more argument's worth of pending work. Must run before
    /// the argument itself is constructed, since an already-settled future
    /// can signal readiness synchronously, inline, before this returns.
    pub(crate) fn begin_argument(self: &Arc<Self>) -> Result<Weak<Self>, ReduceTaskError> {
        if self.submitted.load(Ordering::Acquire) {
            return Err(ReduceTaskError::AlreadySubmitted);
        }
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        self.count.fetch_add(1, Ordering::AcqRel);
        Ok(Arc::downgrade(self))
    }

    /// Closes the argument set. If no arguments were ever added, finishes
    /// immediately on the operator's identity. Otherwise, schedules a check
    /// for the case where every argument had already settled (and merged
    /// down to a single parked result, or a single still-unpaired one) by
    /// the time this was called.
    pub(crate) fn submit(self: &Arc<Self>) -> Arc<LocalFuture<Red::Output>> {
        if !self.submitted.swap(true, Ordering::AcqRel) {
            if self.count.load(Ordering::Acquire) == 0 {
                trace!("submit() with no arguments, finishing on the identity");
                let identity = self.op.identity();
                self.finish(identity);
            } else {
                let this = Arc::clone(self);
                self.task_queue
                    .submit(Priority::High, Box::new(move || this.check_closed()));
            }
        }
        self.result_future()
    }

    /// Called by an argument once every future it was waiting on has
    /// settled successfully.
    pub(crate) fn ready(self: &Arc<Self>, incoming: ReadyPayload<Red::Contribution>) {
        if self.poisoned.load(Ordering::Acquire) {
            let (_, cb) = incoming.into_parts();
            release(cb);
            return;
        }

        let mut guard = self.slots.lock();
        if let Some(result) = guard.ready_result.take() {
            drop(guard);
            let this = Arc::clone(self);
            self.task_queue.submit(
                Priority::High,
                Box::new(move || this.reduce_result_with_arg(result, incoming)),
            );
            return;
        }
        if let Some(parked) = guard.ready_arg.take() {
            drop(guard);
            let this = Arc::clone(self);
            self.task_queue.submit(
                Priority::High,
                Box::new(move || this.reduce_pair(parked, incoming)),
            );
            return;
        }

        // Neither slot occupied. If the set is already closed and this is
        // the only argument left outstanding, nothing will ever arrive to
        // pair with it; fold it against the identity right away instead of
        // parking it where nothing would ever drain it.
        let is_last =
            self.submitted.load(Ordering::Acquire) && self.outstanding.load(Ordering::Acquire) == 1;
        if is_last {
            drop(guard);
            let this = Arc::clone(self);
            let identity = self.op.identity();
            self.task_queue.submit(
                Priority::High,
                Box::new(move || this.reduce_result_with_arg(identity, incoming)),
            );
        } else {
            guard.ready_arg = Some(incoming);
        }
    }

    fn reduce_result_with_arg(
        self: Arc<Self>,
        mut result: Red::Output,
        arg: ReadyPayload<Red::Contribution>,
    ) {
        if self.poisoned.load(Ordering::Acquire) {
            let (_, cb) = arg.into_parts();
            release(cb);
            return;
        }
        let (contribution, cb) = arg.into_parts();
        match guarded(|| self.op.reduce_one(&mut result, contribution)) {
            Ok(()) => {
                release(cb);
                self.drain(result, 1);
            }
            Err(msg) => {
                release(cb);
                self.poison(poison_error(msg));
            }
        }
    }

    fn reduce_pair(
        self: Arc<Self>,
        a: ReadyPayload<Red::Contribution>,
        b: ReadyPayload<Red::Contribution>,
    ) {
        if self.poisoned.load(Ordering::Acquire) {
            let (_, cb_a) = a.into_parts();
            let (_, cb_b) = b.into_parts();
            release(cb_a);
            release(cb_b);
            return;
        }
        let (ca, cb_a) = a.into_parts();
        let (cb_val, cb_b) = b.into_parts();
        let mut result = self.op.identity();
        match guarded(|| self.op.reduce_two(&mut result, ca, cb_val)) {
            Ok(()) => {
                release(cb_a);
                release(cb_b);
                self.drain(result, 2);
            }
            Err(msg) => {
                release(cb_a);
                release(cb_b);
                self.poison(poison_error(msg));
            }
        }
    }

    /// Repeatedly folds whatever is parked into `result` until nothing more
    /// is available, then either parks `result` for the next arrival, or,
    /// if the set is closed and `outstanding` has hit zero, runs the
    /// terminal step.
    ///
    /// `fresh` is how many just-folded arguments this call accounts for
    /// that haven't been subtracted from `outstanding` yet.
    fn drain(self: Arc<Self>, mut result: Red::Output, fresh: usize) {
        let mut fresh = fresh;
        loop {
            let mut guard = self.slots.lock();
            let remaining = self.outstanding.fetch_sub(fresh, Ordering::AcqRel) - fresh;
            fresh = 0;

            if let Some(payload) = guard.ready_arg.take() {
                drop(guard);
                if self.poisoned.load(Ordering::Acquire) {
                    let (_, cb) = payload.into_parts();
                    release(cb);
                    return;
                }
                let (contribution, cb) = payload.into_parts();
                match guarded(|| self.op.reduce_one(&mut result, contribution)) {
                    Ok(()) => {
                        release(cb);
                        fresh = 1;
                        continue;
                    }
                    Err(msg) => {
                        release(cb);
                        self.poison(poison_error(msg));
                        return;
                    }
                }
            }

            if let Some(other) = guard.ready_result.take() {
                drop(guard);
                if self.poisoned.load(Ordering::Acquire) {
                    return;
                }
                match guarded(|| self.op.combine(&mut result, other)) {
                    Ok(()) => continue,
                    Err(msg) => {
                        self.poison(poison_error(msg));
                        return;
                    }
                }
            }

            if remaining == 0 && self.submitted.load(Ordering::Acquire) {
                drop(guard);
                self.finish(result);
                return;
            }
            guard.ready_result = Some(result);
            return;
        }
    }

    /// Runs once, right after [`Self::submit`], to cover the case where
    /// every argument had already settled by the time the caller closed the
    /// set: either fully merged down to one parked result, or a single
    /// still-unpaired one waiting for a partner that will now never come.
    fn check_closed(self: Arc<Self>) {
        if self.poisoned.load(Ordering::Acquire) {
            return;
        }
        let mut guard = self.slots.lock();
        let outstanding = self.outstanding.load(Ordering::Acquire);
        if outstanding == 0 {
            if let Some(result) = guard.ready_result.take() {
                drop(guard);
                self.finish(result);
            }
            return;
        }
        if outstanding == 1 {
            if let Some(payload) = guard.ready_arg.take() {
                drop(guard);
                self.reduce_result_with_arg(self.op.identity(), payload);
            }
        }
        // Otherwise arguments are still genuinely outstanding; whichever
        // one's settlement eventually drains `outstanding` to zero will
        // notice `submitted` and finish then.
    }

    fn finish(self: Arc<Self>, result: Red::Output) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("reduce task reaching terminal step");
        match guarded(|| self.op.finalize(result)) {
            Ok(finalized) => self.result_future.set(Ok(finalized)),
            Err(msg) => self.result_future.set(Err(poison_error(msg))),
        }
        if let Some(cb) = self.completion_cb.lock().take() {
            cb();
        }
    }

    /// Poisons the task: whatever is parked is discarded, the result future
    /// settles to `error`, and the completion callback fires. Idempotent;
    /// only the first caller (whichever future failed first, or whichever
    /// operator invocation panicked first) has any effect.
    pub(crate) fn poison(self: &Arc<Self>, error: SharedError) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        self.poisoned.store(true, Ordering::Release);
        let mut guard = self.slots.lock();
        if let Some(payload) = guard.ready_arg.take() {
            let (_, cb) = payload.into_parts();
            release(cb);
        }
        guard.ready_result.take();
        drop(guard);
        self.result_future.set(Err(error));
        if let Some(cb) = self.completion_cb.lock().take() {
            cb();
        }
    }
}

fn poison_error(msg: String) -> SharedError {
    Arc::new(SubstrateError::UpstreamFailed(msg))
}
