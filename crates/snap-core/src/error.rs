//! Error types for the snap task runtime.
//!
//! Organized by where the failure surfaces: array definition, task
//! callbacks, registration, launch, and waiting on a launched task.

use std::error::Error;
use std::fmt;

use crate::access::AccessMode;
use crate::id::{ArrayId, Redop, ReductionId, TaskId, VariantKind};

/// Errors from defining array shapes and partitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrayError {
    /// An extent or the component count is zero.
    EmptyShape {
        /// The requested zone-grid extents.
        extents: [usize; 3],
        /// The requested per-zone component count.
        components: usize,
    },
    /// The element count does not fit in `usize`.
    ShapeOverflow {
        /// The requested zone-grid extents.
        extents: [usize; 3],
        /// The requested per-zone component count.
        components: usize,
    },
    /// Subregions overlap, leave gaps, or are empty.
    InvalidPartition {
        /// Description of the defect.
        reason: String,
    },
    /// The partition was built for a different zone count than the shape.
    PartitionMismatch {
        /// Zones covered by the partition.
        partition_zones: usize,
        /// Zones in the shape.
        shape_zones: usize,
    },
}

impl fmt::Display for ArrayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyShape {
                extents,
                components,
            } => write!(
                f,
                "array shape {extents:?} x {components} has no elements"
            ),
            Self::ShapeOverflow {
                extents,
                components,
            } => write!(
                f,
                "array shape {extents:?} x {components} overflows usize"
            ),
            Self::InvalidPartition { reason } => write!(f, "invalid partition: {reason}"),
            Self::PartitionMismatch {
                partition_zones,
                shape_zones,
            } => write!(
                f,
                "partition covers {partition_zones} zones but the shape has {shape_zones}"
            ),
        }
    }
}

impl Error for ArrayError {}

/// Errors raised inside a task callback.
///
/// Any of these ends the run: the runtime poisons itself and reports the
/// failure through the task's future.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskError {
    /// The callback's own logic failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The callback received a different number of regions than it expects.
    RegionCount {
        /// Regions the callback needs.
        expected: usize,
        /// Regions the runtime supplied.
        actual: usize,
    },
    /// The callback used a region beyond its declared permission.
    AccessDenied {
        /// Name of the array behind the region.
        array: String,
        /// The permission the region was mapped with.
        access: AccessMode,
        /// The refused operation (`"read"`, `"write"`, `"reduce"`).
        operation: &'static str,
    },
    /// An element index fell outside the mapped region.
    IndexOutOfRange {
        /// Name of the array behind the region.
        array: String,
        /// The offending local element index.
        index: usize,
        /// Number of elements in the region.
        len: usize,
    },
    /// A region's shape does not match what the callback was built for.
    ShapeMismatch {
        /// Name of the array behind the region.
        array: String,
        /// Description of the mismatch.
        reason: String,
    },
    /// The callback panicked.
    Panicked {
        /// The panic payload, when it was a string.
        reason: String,
    },
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::RegionCount { expected, actual } => {
                write!(f, "expected {expected} regions, got {actual}")
            }
            Self::AccessDenied {
                array,
                access,
                operation,
            } => write!(
                f,
                "{operation} refused on '{array}' mapped {access}"
            ),
            Self::IndexOutOfRange { array, index, len } => write!(
                f,
                "index {index} outside region of '{array}' with {len} elements"
            ),
            Self::ShapeMismatch { array, reason } => {
                write!(f, "shape mismatch on '{array}': {reason}")
            }
            Self::Panicked { reason } => write!(f, "task panicked: {reason}"),
        }
    }
}

impl Error for TaskError {}

/// Errors from populating a task registry.
///
/// All of these are fatal configuration errors: the registry is rejected
/// before the runtime dispatches anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Two different task kinds claim the same id.
    DuplicateTaskId {
        /// The contested id.
        task: TaskId,
        /// Name of the kind registered first.
        existing: String,
        /// Name of the kind that tried to register second.
        incoming: String,
    },
    /// Two reduction operators claim the same id.
    DuplicateReductionId {
        /// The contested id.
        redop: ReductionId,
        /// Name of the operator registered first.
        existing: String,
        /// Name of the operator that tried to register second.
        incoming: String,
    },
    /// A task reduces through an operator that was never registered.
    UnknownReduction {
        /// Name of the task kind.
        task: String,
        /// The missing operator.
        redop: ReductionId,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTaskId {
                task,
                existing,
                incoming,
            } => write!(
                f,
                "task id {task} registered by '{existing}' and '{incoming}'"
            ),
            Self::DuplicateReductionId {
                redop,
                existing,
                incoming,
            } => write!(
                f,
                "reduction id {redop} registered by '{existing}' and '{incoming}'"
            ),
            Self::UnknownReduction { task, redop } => write!(
                f,
                "task '{task}' reduces through unregistered operator {redop}"
            ),
        }
    }
}

impl Error for RegistryError {}

/// Errors from issuing a launch. Nothing has been scheduled when one of
/// these is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchError {
    /// No task kind is registered under the id.
    UnregisteredTask {
        /// The unknown id.
        task: TaskId,
    },
    /// The task kind has no variant for the runtime's processors.
    NoVariant {
        /// Name of the task kind.
        task: String,
        /// The processor kind the runtime executes on.
        kind: VariantKind,
    },
    /// The launcher's reduction operator disagrees with the registration.
    RedopMismatch {
        /// Name of the task kind.
        task: String,
        /// Operator in the registry.
        registered: Redop,
        /// Operator on the launcher.
        launched: Redop,
    },
    /// An array handle belongs to a different runtime.
    ForeignArray {
        /// Name of the task kind.
        task: String,
        /// Name of the array.
        array: String,
    },
    /// An array id is not known to this runtime.
    UnknownArray {
        /// Name of the task kind.
        task: String,
        /// The unknown array id.
        array: ArrayId,
    },
    /// A requirement's selector does not resolve for this launch.
    InvalidSelector {
        /// Name of the task kind.
        task: String,
        /// Position of the requirement in declaration order.
        requirement: usize,
        /// Description of the problem.
        reason: String,
    },
    /// A requirement's access mode is not allowed for the task's redop.
    AccessMismatch {
        /// Name of the task kind.
        task: String,
        /// Position of the requirement in declaration order.
        requirement: usize,
        /// Description of the problem.
        reason: String,
    },
    /// Two requirements of one task overlap and at least one writes.
    AliasedRequirements {
        /// Name of the task kind.
        task: String,
        /// Position of the first requirement.
        first: usize,
        /// Position of the second requirement.
        second: usize,
    },
    /// An index launch with no points.
    EmptyDomain {
        /// Name of the task kind.
        task: String,
    },
    /// A previous task failed; the runtime accepts no more work.
    Poisoned {
        /// Description of the original failure.
        reason: String,
    },
    /// The runtime is shutting down.
    ShuttingDown,
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnregisteredTask { task } => write!(f, "task id {task} is not registered"),
            Self::NoVariant { task, kind } => {
                write!(f, "task '{task}' has no {kind} variant")
            }
            Self::RedopMismatch {
                task,
                registered,
                launched,
            } => write!(
                f,
                "task '{task}' registered with redop {registered} but launched with {launched}"
            ),
            Self::ForeignArray { task, array } => write!(
                f,
                "task '{task}' names array '{array}' from another runtime"
            ),
            Self::UnknownArray { task, array } => {
                write!(f, "task '{task}' names unknown array {array}")
            }
            Self::InvalidSelector {
                task,
                requirement,
                reason,
            } => write!(
                f,
                "task '{task}' requirement {requirement}: invalid selector: {reason}"
            ),
            Self::AccessMismatch {
                task,
                requirement,
                reason,
            } => write!(
                f,
                "task '{task}' requirement {requirement}: {reason}"
            ),
            Self::AliasedRequirements {
                task,
                first,
                second,
            } => write!(
                f,
                "task '{task}' requirements {first} and {second} alias with a write"
            ),
            Self::EmptyDomain { task } => write!(f, "index launch of '{task}' has no points"),
            Self::Poisoned { reason } => write!(f, "runtime poisoned: {reason}"),
            Self::ShuttingDown => write!(f, "runtime is shutting down"),
        }
    }
}

impl Error for LaunchError {}

/// Outcome of waiting on a launched task.
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeError {
    /// The task's callback failed.
    TaskFailed {
        /// Id of the failing task kind.
        task: TaskId,
        /// Name of the failing task kind.
        name: String,
        /// The callback's error.
        reason: TaskError,
    },
    /// Another task failed first; this one never ran or its result was
    /// discarded.
    Poisoned {
        /// Description of the original failure.
        reason: String,
    },
    /// The runtime shut down before the task completed.
    ShuttingDown,
    /// The work was never scheduled.
    Rejected(LaunchError),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskFailed { task, name, reason } => {
                write!(f, "task '{name}' (id {task}) failed: {reason}")
            }
            Self::Poisoned { reason } => write!(f, "runtime poisoned: {reason}"),
            Self::ShuttingDown => write!(f, "runtime is shutting down"),
            Self::Rejected(e) => write!(f, "launch rejected: {e}"),
        }
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TaskFailed { reason, .. } => Some(reason),
            Self::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LaunchError> for RuntimeError {
    fn from(e: LaunchError) -> Self {
        Self::Rejected(e)
    }
}
