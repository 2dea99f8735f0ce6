//! A priority task queue: closures submitted for later execution on
//! whatever worker picks them up next.

/// The two priority lanes the scheduling algorithm needs: `Normal` for
/// ordinary work, `High` for reduction steps that should drain ahead of it
/// so ready tile pairs don't pile up behind unrelated work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Ordinary work.
    Normal,
    /// Reduction steps: pairing two ready arguments, folding a ready result
    /// with a newly ready argument, or running the terminal step.
    High,
}

/// A unit of work submitted to the queue.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The contract `reduce-task` submits its internal reduction steps through.
/// Implementations may run tasks on any worker, in any order relative to
/// other tasks of the same priority.
pub trait TaskQueue: Send + Sync {
    /// Enqueues `task` at the given priority.
    fn submit(&self, priority: Priority, task: Task);
}
