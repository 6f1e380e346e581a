//! Metadata and execution context handed to task callbacks.

use snap_core::{Color, LaunchId, Redop, TaskId};

use crate::launcher::LaunchTarget;

/// Identity of the running task instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskInfo {
    /// Task kind id.
    pub task_id: TaskId,
    /// Task kind name.
    pub name: String,
    /// Reduction operator the task writes through.
    pub redop: Redop,
    /// Program-order id of this point.
    pub launch_id: LaunchId,
    /// Color of this point in an index launch; `None` for single launches.
    pub point: Option<Color>,
}

/// Execution context passed to each callback.
///
/// Callbacks must not assume which worker runs them; the index is for
/// diagnostics only.
pub struct TaskContext<'a> {
    worker: usize,
    runtime: &'a dyn LaunchTarget,
}

impl<'a> TaskContext<'a> {
    /// Construct a context. Typically called by the runtime.
    pub fn new(worker: usize, runtime: &'a dyn LaunchTarget) -> Self {
        Self { worker, runtime }
    }

    /// Index of the worker thread running the callback.
    pub fn worker_index(&self) -> usize {
        self.worker
    }

    /// The runtime, for launching child tasks.
    ///
    /// A callback may launch, but must not wait on the returned future:
    /// the child may need the worker the parent occupies.
    pub fn runtime(&self) -> &dyn LaunchTarget {
        self.runtime
    }
}
