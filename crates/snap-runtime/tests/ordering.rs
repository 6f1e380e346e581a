//! Execution-order guarantees derived from region requirements.
//!
//! Ordering is asserted through an [`EventLog`]; concurrency through
//! [`Rendezvous`] groups, which fail unless every member runs at once.

use std::thread;
use std::time::Duration;

use snap_core::{AccessMode, ArrayDef, ArrayShape, Color, LaunchError, Partition, SnapArray};
use snap_runtime::{Runtime, RuntimeConfig};
use snap_task::{SnapTask, TaskRegistry};
use snap_test_utils::fixtures::{
    register_fixtures, ConstFill, LoggedTask, ParentTask, ReadProbe, Rendezvous, RendezvousPoint,
};
use snap_test_utils::{small_array, EventLog, Phase};

const RENDEZVOUS_TIMEOUT: Duration = Duration::from_secs(10);

fn runtime(workers: usize) -> Runtime {
    let mut registry = TaskRegistry::new();
    register_fixtures(&mut registry).unwrap();
    let config = RuntimeConfig {
        worker_count: Some(workers),
        trace_dependencies: true,
        ..RuntimeConfig::default()
    };
    Runtime::new(config, registry).unwrap()
}

fn array(rt: &Runtime, name: &str, pieces: usize) -> SnapArray {
    let shape = ArrayShape::new([4, 4, 2], 2).unwrap();
    let partition = Partition::blocked(shape.zone_count(), pieces).unwrap();
    rt.create_array(ArrayDef::new(name, shape).with_partition(partition))
        .unwrap()
}

#[test]
fn reader_waits_for_writer() {
    let rt = runtime(4);
    let a = array(&rt, "a", 1);
    let log = EventLog::new();
    let w = LoggedTask::new(&log, "w", vec![a.requirement(AccessMode::ReadWrite)])
        .dispatch(&rt)
        .unwrap();
    let r = LoggedTask::new(&log, "r", vec![a.requirement(AccessMode::ReadOnly)])
        .dispatch(&rt)
        .unwrap();
    w.wait().unwrap();
    r.wait().unwrap();
    assert!(log.finished_before("w", "r"));
}

#[test]
fn writer_waits_for_earlier_reader() {
    let rt = runtime(4);
    let a = array(&rt, "a", 1);
    let log = EventLog::new();
    LoggedTask::new(&log, "r", vec![a.requirement(AccessMode::ReadOnly)])
        .dispatch(&rt)
        .unwrap();
    LoggedTask::new(&log, "w", vec![a.requirement(AccessMode::WriteDiscard)])
        .dispatch(&rt)
        .unwrap();
    rt.fence().unwrap();
    assert!(log.finished_before("r", "w"));
}

#[test]
fn concurrent_readers_run_together() {
    let rt = runtime(2);
    let a = array(&rt, "a", 1);
    let point = RendezvousPoint::new(2, RENDEZVOUS_TIMEOUT);
    let f1 = Rendezvous::new(&point, vec![a.requirement(AccessMode::ReadOnly)])
        .dispatch(&rt)
        .unwrap();
    let f2 = Rendezvous::new(&point, vec![a.requirement(AccessMode::ReadOnly)])
        .dispatch(&rt)
        .unwrap();
    f1.wait().unwrap();
    f2.wait().unwrap();
}

#[test]
fn writers_of_different_arrays_run_together() {
    let rt = runtime(2);
    let a = array(&rt, "a", 1);
    let b = array(&rt, "b", 1);
    let point = RendezvousPoint::new(2, RENDEZVOUS_TIMEOUT);
    Rendezvous::new(&point, vec![a.requirement(AccessMode::WriteDiscard)])
        .dispatch(&rt)
        .unwrap();
    Rendezvous::new(&point, vec![b.requirement(AccessMode::WriteDiscard)])
        .dispatch(&rt)
        .unwrap();
    rt.fence().unwrap();
    let trace = rt.dependency_trace();
    assert!(trace.iter().all(|r| r.waits_on.is_empty()));
}

#[test]
fn writers_of_disjoint_pieces_run_together() {
    let rt = runtime(2);
    let a = array(&rt, "a", 2);
    let point = RendezvousPoint::new(2, RENDEZVOUS_TIMEOUT);
    for color in [Color(0), Color(1)] {
        Rendezvous::new(
            &point,
            vec![a.subregion_requirement(color, AccessMode::WriteDiscard)],
        )
        .dispatch(&rt)
        .unwrap();
    }
    rt.fence().unwrap();
}

#[test]
fn reader_of_two_arrays_waits_on_both_writers() {
    let rt = runtime(4);
    let a = array(&rt, "a", 1);
    let b = array(&rt, "b", 1);
    let log = EventLog::new();
    let fa = LoggedTask::new(&log, "wa", vec![a.requirement(AccessMode::WriteDiscard)])
        .dispatch(&rt)
        .unwrap();
    let fb = LoggedTask::new(&log, "wb", vec![b.requirement(AccessMode::WriteDiscard)])
        .dispatch(&rt)
        .unwrap();
    LoggedTask::new(
        &log,
        "r",
        vec![
            a.requirement(AccessMode::ReadOnly),
            b.requirement(AccessMode::ReadOnly),
        ],
    )
    .dispatch(&rt)
    .unwrap();
    rt.fence().unwrap();

    assert!(log.finished_before("wa", "r"));
    assert!(log.finished_before("wb", "r"));
    let trace = rt.dependency_trace();
    assert!(trace[0].waits_on.is_empty());
    assert!(trace[1].waits_on.is_empty());
    let mut expected = fa.launch_ids();
    expected.extend(fb.launch_ids());
    assert_eq!(trace[2].task, "LoggedTask");
    assert_eq!(trace[2].waits_on, expected);
}

#[test]
fn index_launch_fills_every_piece() {
    let rt = runtime(3);
    let a = array(&rt, "a", 4);
    let fut = ConstFill::per_piece(&a, 5.0).dispatch(&rt).unwrap();
    assert_eq!(fut.point_count(), 4);
    fut.wait().unwrap();
    assert_eq!(rt.map_array(&a).unwrap(), vec![5.0; a.shape().len()]);
    assert_eq!(rt.metrics().points_completed, 4);
}

#[test]
fn map_sees_every_earlier_write_without_waiting() {
    let rt = runtime(2);
    let a = array(&rt, "a", 2);
    ConstFill::whole(&a, 1.0).dispatch(&rt).unwrap();
    ConstFill::piece(&a, Color(1), 7.0).dispatch(&rt).unwrap();
    let data = rt.map_array(&a).unwrap();
    let half = a.shape().len() / 2;
    assert!(data[..half].iter().all(|&v| v == 1.0));
    assert!(data[half..].iter().all(|&v| v == 7.0));
}

#[test]
fn probe_reads_after_fill() {
    let rt = runtime(2);
    let a = array(&rt, "a", 1);
    ConstFill::whole(&a, 9.0).dispatch(&rt).unwrap();
    let (probe, sink) = ReadProbe::new(&a);
    probe.dispatch(&rt).unwrap().wait().unwrap();
    assert_eq!(sink.take(), Some(vec![9.0; a.shape().len()]));
}

#[test]
fn foreign_array_is_rejected() {
    let rt = runtime(1);
    let stranger = small_array([2, 2, 1], 1, 1);
    let err = ConstFill::whole(&stranger, 0.0).dispatch(&rt).unwrap_err();
    assert!(matches!(err, LaunchError::ForeignArray { .. }));
    assert!(rt.map_array(&stranger).is_err());
}

#[test]
fn unregistered_kind_is_rejected() {
    let rt = Runtime::new(RuntimeConfig::default(), TaskRegistry::new()).unwrap();
    let shape = ArrayShape::new([2, 2, 2], 1).unwrap();
    let a = rt.create_array(ArrayDef::new("a", shape)).unwrap();
    let err = ConstFill::whole(&a, 0.0).dispatch(&rt).unwrap_err();
    assert_eq!(
        err,
        LaunchError::UnregisteredTask {
            task: ConstFill::TASK_ID
        }
    );
    assert_eq!(rt.metrics().launches, 0);
}

#[test]
fn handle_launches_from_another_thread() {
    let rt = runtime(2);
    let a = array(&rt, "a", 1);
    let handle = rt.handle();
    let arr = a.clone();
    thread::spawn(move || {
        ConstFill::whole(&arr, 4.0)
            .dispatch(&handle)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(handle.map_array(&arr).unwrap()[0], 4.0);
    })
    .join()
    .unwrap();
    assert_eq!(rt.map_array(&a).unwrap(), vec![4.0; a.shape().len()]);
}

#[test]
fn shutdown_drains_in_flight_work() {
    let rt = runtime(2);
    let a = array(&rt, "a", 1);
    let log = EventLog::new();
    LoggedTask::new(&log, "slow", vec![a.requirement(AccessMode::ReadWrite)])
        .with_delay(Duration::from_millis(50))
        .dispatch(&rt)
        .unwrap();
    let report = rt.shutdown();
    assert!(report.outcome.is_ok());
    assert_eq!(report.workers_joined, 2);
    assert!(log.position("slow", Phase::End).is_some());
}

#[test]
fn metrics_count_points_and_maps() {
    let rt = runtime(2);
    let a = array(&rt, "a", 2);
    ConstFill::per_piece(&a, 1.0).dispatch(&rt).unwrap();
    ConstFill::whole(&a, 2.0).dispatch(&rt).unwrap();
    rt.map_array(&a).unwrap();
    rt.fence().unwrap();
    let m = rt.metrics();
    assert_eq!(m.launches, 2);
    assert_eq!(m.points_launched, 3);
    assert_eq!(m.points_completed, 3);
    assert_eq!(m.inline_maps, 1);
    assert_eq!(m.points_failed, 0);
    assert_eq!(m.workers, 2);
    assert!(m.peak_concurrency >= 1);
}

#[test]
fn child_launch_is_ordered_after_earlier_writer() {
    let rt = runtime(2);
    let a = array(&rt, "a", 1);
    let log = EventLog::new();
    // The writer copies the old contents back when it ends, so the child's
    // fill only survives if the child runs after it.
    LoggedTask::new(&log, "w", vec![a.requirement(AccessMode::ReadWrite)])
        .with_delay(Duration::from_millis(100))
        .dispatch(&rt)
        .unwrap();
    let parent = ParentTask::new(vec![ConstFill::whole(&a, 7.0).launcher()])
        .dispatch(&rt)
        .unwrap();
    parent.wait().unwrap();
    assert_eq!(rt.map_array(&a).unwrap(), vec![7.0; a.shape().len()]);
    rt.fence().unwrap();
    assert_eq!(rt.metrics().points_completed, 3);
}

#[test]
fn fence_waits_for_children() {
    let rt = runtime(2);
    let a = array(&rt, "a", 2);
    let (probe, sink) = ReadProbe::new(&a);
    ParentTask::new(vec![
        ConstFill::per_piece(&a, 2.0).launcher(),
        probe.launcher(),
    ])
    .with_delay(Duration::from_millis(20))
    .dispatch(&rt)
    .unwrap();
    rt.fence().unwrap();
    assert_eq!(sink.take(), Some(vec![2.0; a.shape().len()]));
}

#[test]
fn shutdown_accepts_children_of_running_tasks() {
    let rt = runtime(2);
    let a = array(&rt, "a", 1);
    let (probe, sink) = ReadProbe::new(&a);
    ParentTask::new(vec![ConstFill::whole(&a, 7.0).launcher(), probe.launcher()])
        .with_delay(Duration::from_millis(150))
        .dispatch(&rt)
        .unwrap();
    let handle = rt.handle();
    let report = rt.shutdown();
    assert!(report.outcome.is_ok(), "{:?}", report.outcome);
    assert_eq!(sink.take(), Some(vec![7.0; a.shape().len()]));
    // Launches from outside a task are still refused.
    let err = ConstFill::whole(&a, 1.0).dispatch(&handle).unwrap_err();
    assert_eq!(err, LaunchError::ShuttingDown);
}
