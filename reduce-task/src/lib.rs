#![warn(clippy::pedantic)]
#![warn(missing_docs)]
//! Asynchronous data-flow reduction of an a-priori-unknown number of
//! future-valued arguments into one future-valued result, under a
//! commutative-monoid operator.
//!
//! Arguments arrive in whatever order their producing futures settle in;
//! [`ReduceTask`] (or [`PairReduceTask`], for operators that consume a pair
//! of futures per argument) pairs them up two at a time as they become
//! ready and folds each pairing into a single running result, without ever
//! holding an internal lock while the operator itself runs. The caller
//! registers every argument with [`ReduceTask::add`], then calls
//! [`ReduceTask::submit`] to close the set off; the returned future settles
//! once every argument has been folded in.

mod argument;
mod error;
mod op;
mod reducer;
mod task;

use std::sync::Arc;

use substrate::future::LocalFuture;
use substrate::task_queue::TaskQueue;

pub use error::ReduceTaskError;
pub use op::{PairArgOp, SingleArgOp};

use argument::{PairReduceArgument, SingleReduceArgument};
use reducer::{PairAdaptor, SingleAdaptor};
use task::ReduceTaskImpl;

/// A reduction over single-future arguments.
pub struct ReduceTask<Op: SingleArgOp> {
    inner: Arc<ReduceTaskImpl<SingleAdaptor<Op>>>,
}

impl<Op: SingleArgOp> ReduceTask<Op> {
    /// Starts a new reduction, draining its internal steps through
    /// `task_queue`. `completion_cb`, if given, runs once, after the result
    /// future has been set (success or failure).
    pub fn new(
        op: Op,
        task_queue: Arc<dyn TaskQueue>,
        completion_cb: Option<Box<dyn FnOnce() + Send>>,
    ) -> Self {
        Self {
            inner: ReduceTaskImpl::new(SingleAdaptor(op), task_queue, completion_cb),
        }
    }

    /// Registers another argument, settled by `future`. `on_destroy`, if
    /// given, runs once the argument's value has been folded into the
    /// running result and its storage can be released.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceTaskError::AlreadySubmitted`] if [`Self::submit`] has
    /// already been called.
    pub fn add(
        &self,
        future: Arc<dyn substrate::future::SettableFuture<Op::Value>>,
        on_destroy: Option<Box<dyn FnOnce() + Send>>,
    ) -> Result<(), ReduceTaskError> {
        let parent = self.inner.begin_argument()?;
        SingleReduceArgument::attach(future, parent, on_destroy);
        Ok(())
    }

    /// Closes the argument set. After this call, [`Self::add`] returns
    /// [`ReduceTaskError::AlreadySubmitted`]. Returns the future that
    /// settles once every registered argument has been folded in (or to the
    /// first failure, if any argument's future or the operator itself
    /// fails).
    pub fn submit(&self) -> Arc<LocalFuture<Op::Output>> {
        self.inner.submit()
    }

    /// The number of arguments registered so far via [`Self::add`].
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.count()
    }

    /// Whether this reduction has been poisoned by a failed argument or a
    /// panicking operator call.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.inner.is_poisoned()
    }
}

/// A reduction over paired-future arguments: each argument contributes a
/// left and a right value that arrive independently.
pub struct PairReduceTask<Op: PairArgOp> {
    inner: Arc<ReduceTaskImpl<PairAdaptor<Op>>>,
}

impl<Op: PairArgOp> PairReduceTask<Op> {
    /// Starts a new reduction, draining its internal steps through
    /// `task_queue`. `completion_cb`, if given, runs once, after the result
    /// future has been set (success or failure).
    pub fn new(
        op: Op,
        task_queue: Arc<dyn TaskQueue>,
        completion_cb: Option<Box<dyn FnOnce() + Send>>,
    ) -> Self {
        Self {
            inner: ReduceTaskImpl::new(PairAdaptor(op), task_queue, completion_cb),
        }
    }

    /// Registers another argument, settled by a `left` and `right` future
    /// arriving independently. `on_destroy`, if given, runs once both
    /// values have been folded into the running result.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceTaskError::AlreadySubmitted`] if [`Self::submit`] has
    /// already been called.
    pub fn add(
        &self,
        left: Arc<dyn substrate::future::SettableFuture<Op::Left>>,
        right: Arc<dyn substrate::future::SettableFuture<Op::Right>>,
        on_destroy: Option<Box<dyn FnOnce() + Send>>,
    ) -> Result<(), ReduceTaskError> {
        let parent = self.inner.begin_argument()?;
        PairReduceArgument::attach(left, right, parent, on_destroy);
        Ok(())
    }

    /// Closes the argument set; see [`ReduceTask::submit`].
    pub fn submit(&self) -> Arc<LocalFuture<Op::Output>> {
        self.inner.submit()
    }

    /// The number of arguments registered so far via [`Self::add`].
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.count()
    }

    /// Whether this reduction has been poisoned by a failed argument or a
    /// panicking operator call.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.inner.is_poisoned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use substrate::future::LocalFuture;
    use substrate::local::LocalExecutor;

    use super::*;

    struct Sum;

    impl SingleArgOp for Sum {
        type Value = i64;
        type Output = i64;

        fn identity(&self) -> i64 {
            0
        }

        fn combine(&self, result: &mut i64, other: i64) {
            *result += other;
        }

        fn reduce(&self, result: &mut i64, arg: i64) {
            *result += arg;
        }
    }

    struct DotProduct;

    impl PairArgOp for DotProduct {
        type Left = f64;
        type Right = f64;
        type Output = f64;

        fn identity(&self) -> f64 {
            0.0
        }

        fn combine(&self, result: &mut f64, other: f64) {
            *result += other;
        }

        fn reduce_pair(&self, result: &mut f64, left: f64, right: f64) {
            *result += left * right;
        }
    }

    fn exec() -> Arc<LocalExecutor> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Arc::new(LocalExecutor::new(4))
    }

    /// Reduction steps run asynchronously on the executor's workers; spin
    /// until the result future settles rather than racing it.
    fn wait<T: Clone>(future: &LocalFuture<T>) -> substrate::future::Settled<T> {
        use substrate::future::SettableFuture;
        loop {
            if future.probe() {
                return future.get();
            }
            std::thread::yield_now();
        }
    }

    #[test]
    fn sums_values_arriving_out_of_order() {
        let queue = exec();
        let task = ReduceTask::new(Sum, queue, None);
        let values = [3, 1, 4, 1, 5, 9];
        let futures: Vec<_> = values.iter().map(|_| Arc::new(LocalFuture::new())).collect();
        for f in &futures {
            task.add(Arc::clone(f) as Arc<dyn substrate::future::SettableFuture<i64>>, None)
                .unwrap();
        }
        let result = task.submit();
        // Settle out of the order the arguments were registered in.
        for i in [3, 0, 5, 1, 4, 2] {
            futures[i].set(Ok(values[i]));
        }
        assert_eq!(wait(&result).unwrap(), 23);
        assert_eq!(task.count(), 6);
        assert!(!task.is_poisoned());
    }

    #[test]
    fn streaming_arrival_of_many_ones() {
        let queue = exec();
        let task = ReduceTask::new(Sum, queue, None);
        let futures: Vec<_> = (0..10).map(|_| Arc::new(LocalFuture::new())).collect();
        let destroyed = Arc::new(AtomicUsize::new(0));
        for f in &futures {
            let counter = Arc::clone(&destroyed);
            task.add(
                Arc::clone(f) as Arc<dyn substrate::future::SettableFuture<i64>>,
                Some(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        }
        let result = task.submit();
        for f in &futures[..5] {
            f.set(Ok(1));
        }
        for f in &futures[5..] {
            f.set(Ok(1));
        }
        assert_eq!(wait(&result).unwrap(), 10);
        // Every argument's destroy callback must fire exactly once, releasing
        // its backing storage as soon as its value has been folded in.
        assert_eq!(destroyed.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn pair_reducer_computes_dot_product() {
        let queue = exec();
        let task = PairReduceTask::new(DotProduct, queue, None);
        let left = [1.0, 2.0, 3.0, 4.0];
        let right = [10.0, 9.0, 8.0, 7.0];
        let lefts: Vec<_> = left.iter().map(|_| Arc::new(LocalFuture::new())).collect();
        let rights: Vec<_> = right.iter().map(|_| Arc::new(LocalFuture::new())).collect();
        let destroyed = Arc::new(AtomicUsize::new(0));
        for (l, r) in lefts.iter().zip(rights.iter()) {
            let counter = Arc::clone(&destroyed);
            task.add(
                Arc::clone(l) as Arc<dyn substrate::future::SettableFuture<f64>>,
                Arc::clone(r) as Arc<dyn substrate::future::SettableFuture<f64>>,
                Some(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        }
        let result = task.submit();
        for (i, (l, r)) in lefts.iter().zip(rights.iter()).enumerate() {
            l.set(Ok(left[i]));
            r.set(Ok(right[i]));
        }
        // 1*10 + 2*9 + 3*8 + 4*7 = 10 + 18 + 24 + 28 = 80
        assert_eq!(wait(&result).unwrap(), 80.0);
        assert_eq!(destroyed.load(Ordering::SeqCst), 4);
    }

    struct VectorDotProduct;

    impl PairArgOp for VectorDotProduct {
        type Left = Vec<f64>;
        type Right = Vec<f64>;
        type Output = f64;

        fn identity(&self) -> f64 {
            0.0
        }

        fn combine(&self, result: &mut f64, other: f64) {
            *result += other;
        }

        fn reduce_pair(&self, result: &mut f64, left: Vec<f64>, right: Vec<f64>) {
            for (l, r) in left.iter().zip(right.iter()) {
                *result += l * r;
            }
        }
    }

    #[test]
    fn pair_reducer_sums_dot_products_of_vector_pairs() {
        let queue = exec();
        let task = PairReduceTask::new(VectorDotProduct, queue, None);
        let lefts = [vec![1.0, 2.0], vec![5.0, 6.0]];
        let rights = [vec![3.0, 4.0], vec![7.0, 8.0]];
        let left_futures: Vec<_> = lefts.iter().map(|_| Arc::new(LocalFuture::new())).collect();
        let right_futures: Vec<_> = rights.iter().map(|_| Arc::new(LocalFuture::new())).collect();
        for (l, r) in left_futures.iter().zip(right_futures.iter()) {
            task.add(
                Arc::clone(l) as Arc<dyn substrate::future::SettableFuture<Vec<f64>>>,
                Arc::clone(r) as Arc<dyn substrate::future::SettableFuture<Vec<f64>>>,
                None,
            )
            .unwrap();
        }
        let result = task.submit();
        for (i, (l, r)) in left_futures.iter().zip(right_futures.iter()).enumerate() {
            l.set(Ok(lefts[i].clone()));
            r.set(Ok(rights[i].clone()));
        }
        // 1*3+2*4 + 5*7+6*8 = 11 + 83 = 94
        assert_eq!(wait(&result).unwrap(), 94.0);
    }

    #[test]
    fn zero_arguments_finishes_on_identity() {
        let queue = exec();
        let task = ReduceTask::new(Sum, queue, None);
        let result = task.submit();
        assert_eq!(wait(&result).unwrap(), 0);
    }

    #[test]
    fn single_argument_skips_pairing() {
        let queue = exec();
        let task = ReduceTask::new(Sum, queue, None);
        let future = Arc::new(LocalFuture::new());
        task.add(Arc::clone(&future) as Arc<dyn substrate::future::SettableFuture<i64>>, None)
            .unwrap();
        let result = task.submit();
        future.set(Ok(41));
        assert_eq!(wait(&result).unwrap(), 41);
    }

    #[test]
    fn add_after_submit_is_rejected() {
        let queue = exec();
        let task = ReduceTask::new(Sum, queue, None);
        let _ = task.submit();
        let late = Arc::new(LocalFuture::new());
        let err = task
            .add(Arc::clone(&late) as Arc<dyn substrate::future::SettableFuture<i64>>, None)
            .unwrap_err();
        assert!(matches!(err, ReduceTaskError::AlreadySubmitted));
    }

    #[test]
    fn a_failed_argument_poisons_the_result() {
        let queue = exec();
        let task = ReduceTask::new(Sum, queue, None);
        let ok = Arc::new(LocalFuture::new());
        let bad = Arc::new(LocalFuture::new());
        task.add(Arc::clone(&ok) as Arc<dyn substrate::future::SettableFuture<i64>>, None)
            .unwrap();
        task.add(Arc::clone(&bad) as Arc<dyn substrate::future::SettableFuture<i64>>, None)
            .unwrap();
        let result = task.submit();
        ok.set(Ok(1));
        bad.set(Err(Arc::new(substrate::error::SubstrateError::Canceled)));
        assert!(wait(&result).is_err());
        assert!(task.is_poisoned());
    }

    #[test]
    fn completion_callback_fires_exactly_once() {
        let queue = exec();
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&fired);
        let task = ReduceTask::new(
            Sum,
            queue,
            Some(Box::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            })),
        );
        let future = Arc::new(LocalFuture::new());
        task.add(Arc::clone(&future) as Arc<dyn substrate::future::SettableFuture<i64>>, None)
            .unwrap();
        let result = task.submit();
        future.set(Ok(5));
        assert_eq!(wait(&result).unwrap(), 5);
        while fired.load(Ordering::SeqCst) == 0 {
            std::thread::yield_now();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
