//! Initialize the material and source fields of a problem and report what
//! the runtime did.
//!
//! Run with `RUST_LOG=debug` to see launches and dependency decisions.

use snap::init::{preregister_all, MaterialLayout, SourceLayout, FEATURE_MATERIAL};
use snap::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut registry = TaskRegistry::new();
    preregister_all(&mut registry)?;
    let runtime = Runtime::new(
        RuntimeConfig {
            trace_dependencies: true,
            ..RuntimeConfig::default()
        },
        registry,
    )?;

    let problem = Snap::new(SnapConfig {
        extents: [16, 16, 8],
        num_groups: 4,
        num_angles: 8,
        material_layout: MaterialLayout::Center,
        source_layout: SourceLayout::Corner,
        source_strength: 2.0,
        pieces: 8,
    })?;
    let mat = runtime.create_array(problem.material_def()?)?;
    let qi = runtime.create_array(problem.source_def()?)?;

    let material = InitMaterial::new(&problem, &mat)?.dispatch(&runtime)?;
    let source = InitSource::new(&problem, &qi)?.dispatch(&runtime)?;
    material.wait()?;
    source.wait()?;

    let ids = runtime.map_array(&mat)?;
    let feature_zones = ids.iter().filter(|&&m| m == FEATURE_MATERIAL).count();
    let intensities = runtime.map_array(&qi)?;
    let total: f64 = intensities.iter().sum();
    tracing::info!(
        zones = problem.zone_count(),
        feature_zones,
        total_source = total,
        "fields initialized"
    );

    for record in runtime.dependency_trace() {
        tracing::info!(
            launch = %record.launch,
            task = %record.task,
            point = ?record.point,
            waits_on = ?record.waits_on,
            "dependency"
        );
    }

    let metrics = runtime.metrics();
    tracing::info!(
        points = metrics.points_completed,
        peak_concurrency = metrics.peak_concurrency,
        workers = metrics.workers,
        "runtime metrics"
    );
    let report = runtime.shutdown();
    report.outcome?;
    Ok(())
}
