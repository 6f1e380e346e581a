//! Snap: the task/region execution core of a discrete-ordinates transport
//! proxy.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the snap sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use snap::prelude::*;
//!
//! let mut registry = TaskRegistry::new();
//! snap::init::preregister_all(&mut registry).unwrap();
//! let runtime = Runtime::new(RuntimeConfig::default(), registry).unwrap();
//!
//! let problem = Snap::new(SnapConfig {
//!     extents: [4, 4, 4],
//!     pieces: 2,
//!     ..SnapConfig::default()
//! })
//! .unwrap();
//! let mat = runtime.create_array(problem.material_def().unwrap()).unwrap();
//! let qi = runtime.create_array(problem.source_def().unwrap()).unwrap();
//!
//! // Both launches return at once; the runtime runs them concurrently.
//! InitMaterial::new(&problem, &mat).unwrap().dispatch(&runtime).unwrap();
//! InitSource::new(&problem, &qi).unwrap().dispatch(&runtime).unwrap();
//!
//! // The map waits for InitMaterial and nothing else.
//! let ids = runtime.map_array(&mat).unwrap();
//! assert!(ids.iter().all(|&m| m == 1.0 || m == 2.0));
//! assert!(runtime.shutdown().outcome.is_ok());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `snap-core` | IDs, access modes, shapes, partitions, `SnapArray`, errors |
//! | [`task`] | `snap-task` | `SnapTask`, registry, physical regions, reductions, futures |
//! | [`runtime`] | `snap-runtime` | Shared-memory runtime, config, metrics |
//! | [`init`] | `snap-init` | Problem context, `InitMaterial`, `InitSource` |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, IDs, and error enums (`snap-core`).
pub use snap_core as types;

/// Task contract and registry (`snap-task`).
///
/// [`task::SnapTask`] is the main extension point for user-defined work.
pub use snap_task as task;

/// Shared-memory runtime (`snap-runtime`).
pub use snap_runtime as runtime;

/// Problem context and field initializers (`snap-init`).
pub use snap_init as init;

/// Common imports for typical snap usage.
///
/// ```rust
/// use snap::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use snap_core::{
        AccessMode, ArrayDef, ArrayShape, Color, Partition, Redop, RegionRequirement, SnapArray,
        TaskId, ZoneRange,
    };

    // Errors
    pub use snap_core::{ArrayError, LaunchError, RegistryError, RuntimeError, TaskError};

    // Tasks
    pub use snap_task::{
        LaunchDomain, LaunchTarget, PhysicalRegion, SnapTask, TaskContext, TaskFuture, TaskInfo,
        TaskRegistry,
    };

    // Runtime
    pub use snap_runtime::{Runtime, RuntimeConfig, RuntimeHandle, RuntimeMetrics};

    // Initializers
    pub use snap_init::{InitMaterial, InitSource, Snap, SnapConfig};
}
