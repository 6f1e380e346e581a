//! Task contract and registry for the snap task runtime.
//!
//! A task kind implements [`SnapTask`]: a compile-time id and reduction
//! operator, the region requirements computed at construction, and a CPU
//! callback that receives one [`PhysicalRegion`] per requirement. Kinds
//! are registered into an explicit [`TaskRegistry`] during startup and the
//! registry is handed to the runtime before anything is launched.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod future;
pub mod guard;
pub mod launcher;
pub mod physical;
pub mod reduction;
pub mod registry;
pub mod requirement;
pub mod task;

pub use context::{TaskContext, TaskInfo};
pub use future::{Completion, TaskFuture, TaskState};
pub use guard::FullWriteGuard;
pub use launcher::{LaunchDomain, LaunchTarget, TaskArgs, TaskLauncher};
pub use physical::PhysicalRegion;
pub use reduction::{
    builtin_reductions, ReductionOp, MAX_REDUCTION_ID, MIN_REDUCTION_ID, PROD_REDUCTION_ID,
    SUM_REDUCTION_ID,
};
pub use registry::{RegisteredTask, TaskCallback, TaskRegistry, TaskVariant};
pub use requirement::validate_requirements;
pub use task::SnapTask;
