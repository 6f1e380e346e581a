//! Region access modes and the conflict rule the scheduler is built on.

use std::fmt;

use crate::id::ReductionId;

/// Permission a task requests on a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Read existing contents; no writes.
    ReadOnly,
    /// Read existing contents and overwrite them.
    ReadWrite,
    /// Overwrite every element without reading. Prior contents are not
    /// materialized; the task must fill the whole region.
    WriteDiscard,
    /// Fold contributions into the region through a reduction operator.
    /// Prior contents are not visible to the task.
    Reduce(ReductionId),
}

impl AccessMode {
    /// Whether the task sees the region's existing contents.
    pub fn reads_existing(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Whether the task's output is stored back into the region.
    pub fn is_write(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }

    /// Whether the task writes through a reduction operator.
    pub fn is_reduce(self) -> bool {
        matches!(self, Self::Reduce(_))
    }

    /// Whether two accesses to overlapping data must be ordered.
    ///
    /// Two reads never conflict, and two reductions through the same
    /// operator never conflict. Everything else does.
    pub fn conflicts_with(self, other: Self) -> bool {
        match (self, other) {
            (Self::ReadOnly, Self::ReadOnly) => false,
            (Self::Reduce(a), Self::Reduce(b)) => a != b,
            _ => true,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::ReadWrite => write!(f, "read-write"),
            Self::WriteDiscard => write!(f, "write-discard"),
            Self::Reduce(id) => write!(f, "reduce({id})"),
        }
    }
}
