//! Benchmark profiles for the snap task runtime.
//!
//! Provides pre-built problem setups and runtimes for benchmarking:
//!
//! - [`reference_problem`]: 32x32x32 mesh, 4 groups, 8 angles, 8 pieces
//! - [`stress_problem`]: 64x64x64 mesh, 8 groups, 16 angles, 16 pieces
//! - [`bench_runtime`]: a runtime with the initializers registered

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use snap_core::RegistryError;
use snap_init::{preregister_all, MaterialLayout, SnapConfig, SourceLayout};
use snap_runtime::{ConfigError, Runtime, RuntimeConfig};
use snap_task::TaskRegistry;

/// Reference problem: 32^3 zones (~32K), 32 source components per zone.
pub fn reference_problem() -> SnapConfig {
    SnapConfig {
        extents: [32, 32, 32],
        num_groups: 4,
        num_angles: 8,
        material_layout: MaterialLayout::Center,
        source_layout: SourceLayout::Center,
        source_strength: 1.0,
        pieces: 8,
    }
}

/// Stress problem: 64^3 zones (~262K), 128 source components per zone.
pub fn stress_problem() -> SnapConfig {
    SnapConfig {
        extents: [64, 64, 64],
        num_groups: 8,
        num_angles: 16,
        material_layout: MaterialLayout::Corner,
        source_layout: SourceLayout::Everywhere,
        source_strength: 1.0,
        pieces: 16,
    }
}

/// Registry with the initializers, plus whatever `extra` registers.
pub fn bench_registry(
    extra: impl FnOnce(&mut TaskRegistry) -> Result<(), RegistryError>,
) -> Result<TaskRegistry, RegistryError> {
    let mut registry = TaskRegistry::new();
    preregister_all(&mut registry)?;
    extra(&mut registry)?;
    Ok(registry)
}

/// Runtime over `registry` with `workers` threads.
pub fn bench_runtime(registry: TaskRegistry, workers: usize) -> Result<Runtime, ConfigError> {
    let config = RuntimeConfig {
        worker_count: Some(workers),
        thread_name_prefix: "snap-bench".to_string(),
        ..RuntimeConfig::default()
    };
    Runtime::new(config, registry)
}
