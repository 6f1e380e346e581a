//! A failing task ends the run: its own future reports the failure and
//! everything else is poisoned.

use snap_core::{
    AccessMode, ArrayDef, ArrayShape, LaunchError, Redop, RuntimeError, TaskError, TaskId,
    VariantKind,
};
use snap_runtime::{Runtime, RuntimeConfig};
use snap_task::{
    PhysicalRegion, SnapTask, TaskCallback, TaskContext, TaskInfo, TaskLauncher, TaskRegistry,
};
use snap_test_utils::fixtures::{register_fixtures, ConstFill, FailingTask, PanickingTask};
use std::any::Any;
use std::sync::Arc;

fn runtime(workers: usize) -> Runtime {
    let mut registry = TaskRegistry::new();
    register_fixtures(&mut registry).unwrap();
    let config = RuntimeConfig {
        worker_count: Some(workers),
        ..RuntimeConfig::default()
    };
    Runtime::new(config, registry).unwrap()
}

fn shape() -> ArrayShape {
    ArrayShape::new([2, 2, 2], 1).unwrap()
}

#[test]
fn failure_is_reported_through_its_future() {
    let rt = runtime(2);
    let fut = FailingTask::new(vec![]).dispatch(&rt).unwrap();
    match fut.wait() {
        Err(RuntimeError::TaskFailed { task, name, reason }) => {
            assert_eq!(task, FailingTask::TASK_ID);
            assert_eq!(name, "FailingTask");
            assert!(matches!(reason, TaskError::ExecutionFailed { .. }));
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }
    assert!(rt.is_poisoned());
    assert_eq!(rt.metrics().points_failed, 1);
}

#[test]
fn panic_is_caught_and_reported() {
    let rt = runtime(1);
    let fut = PanickingTask.dispatch(&rt).unwrap();
    match fut.wait() {
        Err(RuntimeError::TaskFailed {
            reason: TaskError::Panicked { reason },
            ..
        }) => assert_eq!(reason, "deliberate panic"),
        other => panic!("expected a caught panic, got {other:?}"),
    }
    // The worker survived the panic and still answers shutdown.
    let report = rt.shutdown();
    assert_eq!(report.workers_joined, 1);
    assert!(matches!(report.outcome, Err(RuntimeError::Poisoned { .. })));
}

#[test]
fn launches_after_failure_are_rejected() {
    let rt = runtime(2);
    let a = rt.create_array(ArrayDef::new("a", shape())).unwrap();
    let _ = FailingTask::new(vec![]).dispatch(&rt).unwrap().wait();
    let err = ConstFill::whole(&a, 1.0).dispatch(&rt).unwrap_err();
    assert!(matches!(err, LaunchError::Poisoned { .. }));
    assert!(matches!(rt.fence(), Err(RuntimeError::Poisoned { .. })));
    assert!(rt.map_array(&a).is_err());
}

#[test]
fn dependent_of_failed_task_never_writes() {
    let rt = runtime(2);
    let a = rt
        .create_array(ArrayDef::new("a", shape()).with_fill(-1.0))
        .unwrap();
    let failing = FailingTask::new(vec![a.requirement(AccessMode::ReadWrite)])
        .dispatch(&rt)
        .unwrap();
    // Depending on timing the follower is either parked and discarded, or
    // rejected because the poison landed first.
    match ConstFill::whole(&a, 3.0).dispatch(&rt) {
        Ok(follower) => assert!(matches!(
            follower.wait(),
            Err(RuntimeError::Poisoned { .. })
        )),
        Err(e) => assert!(matches!(e, LaunchError::Poisoned { .. })),
    }
    assert!(matches!(
        failing.wait(),
        Err(RuntimeError::TaskFailed { .. })
    ));
    assert_eq!(rt.metrics().points_completed, 0);
}

#[test]
fn gpu_only_kind_has_no_cpu_variant() {
    let mut registry = TaskRegistry::new();
    let noop: TaskCallback = Arc::new(
        |_: &TaskInfo,
         _: &(dyn Any + Send + Sync),
         _: &mut [PhysicalRegion],
         _: &TaskContext<'_>|
         -> Result<(), TaskError> { Ok(()) },
    );
    registry
        .register_raw(TaskId(77), "Accelerated", Redop::None, VariantKind::Gpu, noop)
        .unwrap();
    let rt = Runtime::new(RuntimeConfig::default(), registry).unwrap();
    let err = rt
        .launch(TaskLauncher::new(TaskId(77), "Accelerated", Redop::None))
        .unwrap_err();
    assert!(matches!(err, LaunchError::NoVariant { kind: VariantKind::Cpu, .. }));
    assert!(!rt.is_poisoned());
}
