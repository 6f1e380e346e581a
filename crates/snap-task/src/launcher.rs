//! Launch descriptions and the [`LaunchTarget`] seam.

use std::any::Any;
use std::sync::Arc;

use smallvec::SmallVec;
use snap_core::{Color, LaunchError, Redop, RegionRequirement, TaskId};

use crate::future::TaskFuture;

/// Type-erased task arguments, shared by every point of a launch.
pub type TaskArgs = Arc<dyn Any + Send + Sync>;

/// The set of points a launch expands to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchDomain {
    /// One task instance.
    Single,
    /// One point task per color; projected requirements bind to the
    /// subregion of the point's color.
    Index(Vec<Color>),
}

/// Everything the runtime needs to schedule a task: identity, region
/// requirements in declaration order, arguments, and launch domain.
#[derive(Clone)]
pub struct TaskLauncher {
    task_id: TaskId,
    name: String,
    redop: Redop,
    requirements: SmallVec<[RegionRequirement; 4]>,
    args: TaskArgs,
    domain: LaunchDomain,
}

impl TaskLauncher {
    /// A single launch with no requirements and unit arguments.
    pub fn new(task_id: TaskId, name: impl Into<String>, redop: Redop) -> Self {
        Self {
            task_id,
            name: name.into(),
            redop,
            requirements: SmallVec::new(),
            args: Arc::new(()),
            domain: LaunchDomain::Single,
        }
    }

    /// Append a requirement. The callback receives regions in the order
    /// requirements were added.
    pub fn with_requirement(mut self, requirement: RegionRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Append several requirements.
    pub fn with_requirements(
        mut self,
        requirements: impl IntoIterator<Item = RegionRequirement>,
    ) -> Self {
        self.requirements.extend(requirements);
        self
    }

    /// Attach arguments.
    pub fn with_args<A: Any + Send + Sync>(mut self, args: A) -> Self {
        self.args = Arc::new(args);
        self
    }

    /// Attach already-shared arguments.
    pub fn with_shared_args(mut self, args: TaskArgs) -> Self {
        self.args = args;
        self
    }

    /// Turn this into an index launch over `colors`.
    pub fn over(mut self, colors: impl IntoIterator<Item = Color>) -> Self {
        self.domain = LaunchDomain::Index(colors.into_iter().collect());
        self
    }

    /// Task kind id.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Task kind name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared reduction operator.
    pub fn redop(&self) -> Redop {
        self.redop
    }

    /// Requirements in declaration order.
    pub fn requirements(&self) -> &[RegionRequirement] {
        &self.requirements
    }

    /// Shared arguments.
    pub fn args(&self) -> &TaskArgs {
        &self.args
    }

    /// Launch domain.
    pub fn domain(&self) -> &LaunchDomain {
        &self.domain
    }

    /// The point colors this launch expands to; `None` for a single launch.
    pub fn points(&self) -> Vec<Option<Color>> {
        match &self.domain {
            LaunchDomain::Single => vec![None],
            LaunchDomain::Index(colors) => colors.iter().copied().map(Some).collect(),
        }
    }
}

impl std::fmt::Debug for TaskLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLauncher")
            .field("task_id", &self.task_id)
            .field("name", &self.name)
            .field("redop", &self.redop)
            .field("requirements", &self.requirements)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

/// Something that accepts launches: the runtime, its handle, or a test
/// double that records launches without running them.
pub trait LaunchTarget: Send + Sync {
    /// Schedule a launch and return a handle to its outcome.
    ///
    /// Never blocks on task execution.
    fn launch(&self, launcher: TaskLauncher) -> Result<TaskFuture, LaunchError>;
}
