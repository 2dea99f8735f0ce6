//! An in-process stand-in for the distributed runtime: a fixed-size worker
//! pool servicing two priority lanes, plus a single-process identity
//! all-reduce. Used by tests, doctests, and by anything embedding this
//! workspace without a real distributed runtime at hand.

use std::ops::AddAssign;
use std::thread::{self, JoinHandle};

use tracing::trace;

use crate::all_reduce::AllReduceSum;
use crate::error::SubstrateError;
use crate::task_queue::{Priority, Task, TaskQueue};

/// A small fixed-size thread pool with a high-priority and a normal-priority
/// lane. High-priority tasks are always drained before normal-priority ones
/// become visible to an idle worker, matching the scheduling algorithm's
/// expectation that reduction steps drain eagerly.
pub struct LocalExecutor {
    high_tx: flume::Sender<Task>,
    normal_tx: flume::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
}

impl LocalExecutor {
    /// Spawns `worker_count` worker threads sharing one high-priority and
    /// one normal-priority queue.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (high_tx, high_rx) = flume::unbounded::<Task>();
        let (normal_tx, normal_rx) = flume::unbounded::<Task>();

        let workers = (0..worker_count)
            .map(|id| {
                let high_rx = high_rx.clone();
                let normal_rx = normal_rx.clone();
                thread::Builder::new()
                    .name(format!("local-executor-{id}"))
                    .spawn(move || loop {
                        // Drain the high-priority lane first; only wait on
                        // the normal lane once it's empty, so reduction
                        // steps never queue up behind unrelated work.
                        if let Ok(task) = high_rx.try_recv() {
                            trace!(worker = id, "running high-priority task");
                            task();
                            continue;
                        }
                        let next = flume::Selector::new()
                            .recv(&high_rx, |msg| msg)
                            .recv(&normal_rx, |msg| msg)
                            .wait();
                        match next {
                            Ok(task) => {
                                trace!(worker = id, "running task");
                                task();
                            }
                            Err(_) => return,
                        }
                    })
                    .expect("failed to spawn local-executor worker thread")
            })
            .collect();

        Self {
            high_tx,
            normal_tx,
            workers,
        }
    }

    /// Blocks until every queued task has been observed by a worker, then
    /// stops accepting new work and joins all workers. Intended for test
    /// teardown, not for production use.
    pub fn join(self) {
        drop(self.high_tx);
        drop(self.normal_tx);
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new(std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get))
    }
}

impl TaskQueue for LocalExecutor {
    fn submit(&self, priority: Priority, task: Task) {
        let sent = match priority {
            Priority::High => self.high_tx.send(task),
            Priority::Normal => self.normal_tx.send(task),
        };
        // A closed channel only happens after `join`, which consumes
        // `self`; reaching this from a live `&self` would be a logic bug.
        sent.expect("LocalExecutor channel closed while still reachable");
    }
}

/// Single-process stand-in for the real collective: there is only one
/// participant, so the sum across the process group is the identity.
/// Real multi-process all-reduce is outside this workspace's scope.
impl<T: AddAssign + Copy> AllReduceSum<T> for LocalExecutor {
    fn all_reduce_sum(&self, _data: &mut [T]) -> Result<(), SubstrateError> {
        Ok(())
    }
}
