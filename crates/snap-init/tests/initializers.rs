//! End-to-end checks of the initializers on a live runtime.

use std::collections::HashSet;

use proptest::prelude::*;
use snap_core::{AccessMode, Redop, RegistryError, SnapArray, TaskError, VariantKind};
use snap_init::{
    preregister_all, InitMaterial, InitSource, MaterialLayout, Snap, SnapConfig, SourceLayout,
    INIT_MATERIAL_TASK_ID, INIT_SOURCE_TASK_ID,
};
use snap_runtime::{Runtime, RuntimeConfig};
use snap_task::{PhysicalRegion, SnapTask, TaskCallback, TaskContext, TaskInfo, TaskRegistry};
use snap_test_utils::fixtures::{register_fixtures, LoggedTask};
use snap_test_utils::EventLog;
use std::any::Any;
use std::sync::Arc;

fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    preregister_all(&mut registry).unwrap();
    register_fixtures(&mut registry).unwrap();
    registry
}

fn runtime(workers: usize) -> Runtime {
    let config = RuntimeConfig {
        worker_count: Some(workers),
        trace_dependencies: true,
        ..RuntimeConfig::default()
    };
    Runtime::new(config, registry()).unwrap()
}

fn fields(rt: &Runtime, snap: &Snap) -> (SnapArray, SnapArray) {
    let mat = rt.create_array(snap.material_def().unwrap()).unwrap();
    let qi = rt.create_array(snap.source_def().unwrap()).unwrap();
    (mat, qi)
}

fn expected_material(snap: &Snap, mat: &SnapArray) -> Vec<f64> {
    (0..snap.zone_count())
        .map(|z| snap.material_at(mat.shape().zone_coords(z)))
        .collect()
}

fn expected_source(snap: &Snap, qi: &SnapArray) -> Vec<f64> {
    (0..snap.zone_count())
        .flat_map(|z| {
            let v = snap.source_at(qi.shape().zone_coords(z));
            std::iter::repeat(v).take(snap.source_components())
        })
        .collect()
}

/// Launch both initializers and return the two fields' contents.
fn initialize(snap: &Snap, material_first: bool) -> (Vec<f64>, Vec<f64>) {
    let rt = runtime(4);
    let (mat, qi) = fields(&rt, snap);
    let init_mat = InitMaterial::new(snap, &mat).unwrap();
    let init_src = InitSource::new(snap, &qi).unwrap();
    if material_first {
        init_mat.dispatch(&rt).unwrap();
        init_src.dispatch(&rt).unwrap();
    } else {
        init_src.dispatch(&rt).unwrap();
        init_mat.dispatch(&rt).unwrap();
    }
    (rt.map_array(&mat).unwrap(), rt.map_array(&qi).unwrap())
}

#[test]
fn task_ids_are_unique_across_registrations() {
    let registry = registry();
    let ids: Vec<_> = registry.task_ids().collect();
    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len());
    assert!(ids.contains(&INIT_MATERIAL_TASK_ID));
    assert!(ids.contains(&INIT_SOURCE_TASK_ID));
}

#[test]
fn conflicting_registration_names_both_kinds() {
    let mut registry = registry();
    let noop: TaskCallback = Arc::new(
        |_: &TaskInfo,
         _: &(dyn Any + Send + Sync),
         _: &mut [PhysicalRegion],
         _: &TaskContext<'_>|
         -> Result<(), TaskError> { Ok(()) },
    );
    let err = registry
        .register_raw(
            INIT_SOURCE_TASK_ID,
            "Impostor",
            Redop::None,
            VariantKind::Cpu,
            noop,
        )
        .unwrap_err();
    match err {
        RegistryError::DuplicateTaskId {
            task,
            existing,
            incoming,
        } => {
            assert_eq!(task, INIT_SOURCE_TASK_ID);
            assert_eq!(existing, "InitSource");
            assert_eq!(incoming, "Impostor");
        }
        other => panic!("expected DuplicateTaskId, got {other}"),
    }
}

#[test]
fn initializers_run_concurrently_and_gate_readers() {
    let snap = Snap::new(SnapConfig::default()).unwrap();
    let rt = runtime(4);
    let (mat, qi) = fields(&rt, &snap);
    let fm = InitMaterial::new(&snap, &mat).unwrap().dispatch(&rt).unwrap();
    let fs = InitSource::new(&snap, &qi).unwrap().dispatch(&rt).unwrap();
    let log = EventLog::new();
    LoggedTask::new(
        &log,
        "reader",
        vec![
            mat.requirement(AccessMode::ReadOnly),
            qi.requirement(AccessMode::ReadOnly),
        ],
    )
    .dispatch(&rt)
    .unwrap();
    rt.fence().unwrap();

    let trace = rt.dependency_trace();
    let init_points = fm.point_count() + fs.point_count();
    assert_eq!(init_points, 8);
    for record in &trace[..init_points] {
        assert!(
            record.waits_on.is_empty(),
            "{} waited on {:?}",
            record.task,
            record.waits_on
        );
    }
    let reader = &trace[init_points];
    assert_eq!(reader.task, "LoggedTask");
    let mut all_init = fm.launch_ids();
    all_init.extend(fs.launch_ids());
    assert_eq!(reader.waits_on, all_init);
}

#[test]
fn launch_order_is_unobservable() {
    let snap = Snap::new(SnapConfig::default()).unwrap();
    assert_eq!(initialize(&snap, true), initialize(&snap, false));
}

#[test]
fn every_zone_gets_its_material() {
    for layout in [
        MaterialLayout::Homogeneous,
        MaterialLayout::Center,
        MaterialLayout::Corner,
    ] {
        let snap = Snap::new(SnapConfig {
            material_layout: layout,
            ..SnapConfig::default()
        })
        .unwrap();
        let rt = runtime(3);
        let (mat, _) = fields(&rt, &snap);
        InitMaterial::new(&snap, &mat).unwrap().dispatch(&rt).unwrap();
        let data = rt.map_array(&mat).unwrap();
        assert!(data.iter().all(|v| !v.is_nan()), "{layout:?} left zones unset");
        assert_eq!(data, expected_material(&snap, &mat), "{layout:?}");
    }
}

#[test]
fn source_is_strength_inside_and_zero_outside() {
    for layout in [
        SourceLayout::Everywhere,
        SourceLayout::Center,
        SourceLayout::Corner,
    ] {
        let snap = Snap::new(SnapConfig {
            source_layout: layout,
            source_strength: 3.5,
            ..SnapConfig::default()
        })
        .unwrap();
        let rt = runtime(3);
        let (_, qi) = fields(&rt, &snap);
        InitSource::new(&snap, &qi).unwrap().dispatch(&rt).unwrap();
        let data = rt.map_array(&qi).unwrap();
        assert!(data.iter().all(|&v| v == 0.0 || v == 3.5), "{layout:?}");
        assert_eq!(data, expected_source(&snap, &qi), "{layout:?}");
        let inside = data.iter().filter(|&&v| v == 3.5).count();
        assert_eq!(
            inside,
            snap.source_box().zone_count() * snap.source_components()
        );
    }
}

#[test]
fn rerunning_initializers_is_idempotent() {
    let snap = Snap::new(SnapConfig::default()).unwrap();
    let rt = runtime(4);
    let (mat, qi) = fields(&rt, &snap);
    InitMaterial::new(&snap, &mat).unwrap().dispatch(&rt).unwrap();
    InitSource::new(&snap, &qi).unwrap().dispatch(&rt).unwrap();
    let first = (rt.map_array(&mat).unwrap(), rt.map_array(&qi).unwrap());
    InitMaterial::new(&snap, &mat).unwrap().dispatch(&rt).unwrap();
    InitSource::new(&snap, &qi).unwrap().dispatch(&rt).unwrap();
    let second = (rt.map_array(&mat).unwrap(), rt.map_array(&qi).unwrap());
    assert_eq!(first, second);
    assert_eq!(rt.metrics().points_failed, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_valid_problem_initializes_fully(
        nx in 1usize..7, ny in 1usize..7, nz in 1usize..5,
        groups in 1usize..4, angles in 1usize..4,
        pieces in 1usize..6,
        strength in 0.5f64..10.0,
        corner in any::<bool>(),
    ) {
        let zones = nx * ny * nz;
        let snap = Snap::new(SnapConfig {
            extents: [nx, ny, nz],
            num_groups: groups,
            num_angles: angles,
            material_layout: if corner { MaterialLayout::Corner } else { MaterialLayout::Center },
            source_layout: if corner { SourceLayout::Center } else { SourceLayout::Corner },
            source_strength: strength,
            pieces: pieces.min(zones),
        })
        .unwrap();
        let rt = runtime(2);
        let (mat, qi) = fields(&rt, &snap);
        InitMaterial::new(&snap, &mat).unwrap().dispatch(&rt).unwrap();
        InitSource::new(&snap, &qi).unwrap().dispatch(&rt).unwrap();
        prop_assert_eq!(rt.map_array(&mat).unwrap(), expected_material(&snap, &mat));
        prop_assert_eq!(rt.map_array(&qi).unwrap(), expected_source(&snap, &qi));
    }
}
