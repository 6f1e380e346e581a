//! Completion tracking for launched tasks.
//!
//! Each launch point owns a [`Completion`] that walks the task state
//! machine `Launched → Ready → Executing → Completed` (or `Failed`). A
//! [`TaskFuture`] groups the completions of one launch call: one for a
//! single launch, one per point for an index launch.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use smallvec::SmallVec;
use snap_core::{LaunchId, RuntimeError};

/// Lifecycle of a launched task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskState {
    /// Queued; waiting on earlier conflicting launches.
    Launched,
    /// All dependencies satisfied; waiting for a worker.
    Ready,
    /// The callback is running.
    Executing,
    /// The callback returned and its writes are visible.
    Completed,
    /// The callback failed, or the runtime was poisoned first.
    Failed,
}

impl TaskState {
    /// Whether the state is final.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

struct Slot {
    state: TaskState,
    outcome: Option<Result<(), RuntimeError>>,
}

/// Completion cell for one launch point.
pub struct Completion {
    slot: Mutex<Slot>,
    done: Condvar,
}

impl Completion {
    /// A fresh completion in the `Launched` state.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot {
                state: TaskState::Launched,
                outcome: None,
            }),
            done: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advance to a non-terminal state. Ignored once terminal.
    pub fn advance(&self, state: TaskState) {
        let mut slot = self.lock();
        if !slot.state.is_terminal() && !state.is_terminal() {
            slot.state = state;
        }
    }

    /// Record the final outcome and wake waiters.
    ///
    /// The first outcome wins; returns `false` if one was already recorded.
    pub fn finish(&self, outcome: Result<(), RuntimeError>) -> bool {
        let mut slot = self.lock();
        if slot.outcome.is_some() {
            return false;
        }
        slot.state = if outcome.is_ok() {
            TaskState::Completed
        } else {
            TaskState::Failed
        };
        slot.outcome = Some(outcome);
        drop(slot);
        self.done.notify_all();
        true
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    /// The outcome, if the task has finished.
    pub fn outcome(&self) -> Option<Result<(), RuntimeError>> {
        self.lock().outcome.clone()
    }

    /// Block until the task finishes.
    pub fn wait(&self) -> Result<(), RuntimeError> {
        let mut slot = self.lock();
        loop {
            if let Some(outcome) = &slot.outcome {
                return outcome.clone();
            }
            slot = self
                .done
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Handle to the outcome of one launch call.
///
/// Dropping a future does not cancel the task. Waiting is the only
/// blocking operation application code performs.
#[derive(Clone)]
pub struct TaskFuture {
    points: SmallVec<[(LaunchId, Arc<Completion>); 1]>,
}

impl TaskFuture {
    /// Group the completions of a launch.
    pub fn new(points: impl IntoIterator<Item = (LaunchId, Arc<Completion>)>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }

    /// A future with no points; always complete and successful.
    pub fn ready() -> Self {
        Self {
            points: SmallVec::new(),
        }
    }

    /// Block until every point finishes.
    ///
    /// Returns the first failure in point order.
    pub fn wait(&self) -> Result<(), RuntimeError> {
        let mut first_err = None;
        for (_, completion) in &self.points {
            if let Err(e) = completion.wait() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether every point has finished.
    pub fn is_ready(&self) -> bool {
        self.points.iter().all(|(_, c)| c.state().is_terminal())
    }

    /// Aggregate state: failed if any point failed, otherwise the least
    /// advanced point's state.
    pub fn state(&self) -> TaskState {
        let states = self.points.iter().map(|(_, c)| c.state());
        let mut least = TaskState::Completed;
        for s in states {
            if s == TaskState::Failed {
                return TaskState::Failed;
            }
            least = least.min(s);
        }
        least
    }

    /// Launch ids of the points, in point order.
    pub fn launch_ids(&self) -> Vec<LaunchId> {
        self.points.iter().map(|(id, _)| *id).collect()
    }

    /// Number of points.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }
}

impl std::fmt::Debug for TaskFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFuture")
            .field("launch_ids", &self.launch_ids())
            .field("state", &self.state())
            .finish()
    }
}
