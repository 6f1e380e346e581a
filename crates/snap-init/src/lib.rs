//! Problem context and field initializers for the snap transport proxy.
//!
//! [`Snap`] is the validated problem setup: mesh extents, energy groups,
//! angles, and the material and source layouts. [`InitMaterial`] and
//! [`InitSource`] are the first tasks of a run. Each writes one field with
//! write-discard access and reads nothing, so the runtime runs them
//! concurrently with each other and orders every later reader of either
//! field after them.
//!
//! ```no_run
//! use snap_init::{preregister_all, InitMaterial, InitSource, Snap, SnapConfig};
//! use snap_runtime::{Runtime, RuntimeConfig};
//! use snap_task::{SnapTask, TaskRegistry};
//!
//! let mut registry = TaskRegistry::new();
//! preregister_all(&mut registry).unwrap();
//! let runtime = Runtime::new(RuntimeConfig::default(), registry).unwrap();
//!
//! let snap = Snap::new(SnapConfig::default()).unwrap();
//! let mat = runtime.create_array(snap.material_def().unwrap()).unwrap();
//! let qi = runtime.create_array(snap.source_def().unwrap()).unwrap();
//! InitMaterial::new(&snap, &mat).unwrap().dispatch(&runtime).unwrap();
//! InitSource::new(&snap, &qi).unwrap().dispatch(&runtime).unwrap();
//! runtime.fence().unwrap();
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod material;
pub mod problem;
pub mod source;

pub use material::InitMaterial;
pub use problem::{
    MaterialLayout, ProblemError, Snap, SnapConfig, SourceLayout, ZoneBox, BACKGROUND_MATERIAL,
    FEATURE_MATERIAL, UNSET,
};
pub use source::InitSource;

use snap_core::{RegistryError, TaskId};
use snap_task::{SnapTask, TaskRegistry};

/// Task id of [`InitMaterial`].
pub const INIT_MATERIAL_TASK_ID: TaskId = TaskId(1);

/// Task id of [`InitSource`].
pub const INIT_SOURCE_TASK_ID: TaskId = TaskId(2);

/// Register the CPU variants of every initializer.
///
/// Idempotent: calling it twice on one registry is a no-op.
pub fn preregister_all(registry: &mut TaskRegistry) -> Result<(), RegistryError> {
    InitMaterial::preregister_cpu_variants(registry)?;
    InitSource::preregister_cpu_variants(registry)?;
    tracing::debug!(tasks = registry.len(), "initializers registered");
    Ok(())
}
