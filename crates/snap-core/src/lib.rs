//! Core types for the snap task runtime.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by every other crate in the workspace: task, array,
//! and reduction identifiers, region access modes, array shapes and
//! partitions, the [`SnapArray`] handle, and the error enums.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod access;
pub mod array;
pub mod error;
pub mod id;
pub mod region;
pub mod set;

pub use access::AccessMode;
pub use array::{ArrayDef, ArrayShape, Partition, SnapArray, ZoneRange};
pub use error::{ArrayError, LaunchError, RegistryError, RuntimeError, TaskError};
pub use id::{
    ArrayId, Color, LaunchId, Redop, ReductionId, RuntimeInstanceId, TaskId, VariantKind,
};
pub use region::{RegionRequirement, RegionSelector};
pub use set::ArraySet;
