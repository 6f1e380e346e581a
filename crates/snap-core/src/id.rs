//! Strongly-typed identifiers for tasks, arrays, reductions, and launches.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a task kind.
///
/// Every task kind registered with a
/// `TaskRegistry` must carry a distinct `TaskId`. Registering a second
/// kind under an existing id is a configuration error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TaskId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a reduction operator in the registry's operator table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReductionId(pub u32);

impl fmt::Display for ReductionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ReductionId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// The reduction operator a task kind writes through.
///
/// `None` marks an exclusive-write task: its writes are ordered against
/// every other access to the same data. `Reduce(op)` marks a task whose
/// writes commute with other `Reduce(op)` writes, so the runtime may run
/// many of them concurrently over overlapping data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Redop {
    /// Exclusive (non-reducing) writes.
    None,
    /// Commutative writes through the given reduction operator.
    Reduce(ReductionId),
}

impl Redop {
    /// The operator id, or `None` for exclusive-write tasks.
    pub fn reduction_id(self) -> Option<ReductionId> {
        match self {
            Self::None => None,
            Self::Reduce(id) => Some(id),
        }
    }
}

impl fmt::Display for Redop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Reduce(id) => write!(f, "reduce({id})"),
        }
    }
}

/// Identifies an array within one runtime.
///
/// Arrays are created at problem setup and assigned sequential IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(pub u32);

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ArrayId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Index of a subregion within an array's partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color(pub u32);

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Color {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Monotonically increasing launch counter.
///
/// Assigned by the runtime in program order; the dependency analysis
/// orders conflicting launches by this id. Each point of an index launch
/// receives its own id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaunchId(pub u64);

impl fmt::Display for LaunchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counter for unique [`RuntimeInstanceId`] allocation.
static RUNTIME_INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a runtime.
///
/// Every array handle records the instance that created it, so that a
/// handle from one runtime cannot be launched against another runtime's
/// storage even when the array ids coincide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeInstanceId(u64);

impl RuntimeInstanceId {
    /// Allocate a fresh, unique instance ID. Thread-safe.
    pub fn next() -> Self {
        Self(RUNTIME_INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RuntimeInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution resource a task variant targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariantKind {
    /// Host CPU threads.
    Cpu,
    /// GPU devices. Registrable, but this runtime schedules CPU work only.
    Gpu,
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}
