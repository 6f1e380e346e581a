//! Worker threads and point-task execution.
//!
//! Each worker receives [`WorkerMsg`]s over a shared crossbeam channel and
//! runs jobs until it receives `Shutdown`. Running a point task means:
//! copy each requirement's range into a private buffer, call the variant
//! callback under `catch_unwind`, and hand the buffers back for copy-out.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use snap_core::{AccessMode, LaunchId, SnapArray, TaskError, ZoneRange};
use snap_task::{
    Completion, LaunchTarget, PhysicalRegion, ReductionOp, TaskArgs, TaskCallback, TaskContext,
    TaskInfo,
};

use crate::runtime::Inner;
use crate::store::ArrayStorage;

/// Message sent to a worker.
pub(crate) enum WorkerMsg {
    Run(Job),
    Shutdown,
}

/// One requirement of a point task, resolved to storage and zones.
pub(crate) struct MappedRequirement {
    pub(crate) array: SnapArray,
    pub(crate) storage: Arc<ArrayStorage>,
    pub(crate) zones: ZoneRange,
    pub(crate) access: AccessMode,
    pub(crate) reduction: Option<ReductionOp>,
}

/// A point task ready to execute once its dependencies complete.
pub(crate) struct PointJob {
    pub(crate) info: TaskInfo,
    pub(crate) callback: TaskCallback,
    pub(crate) args: TaskArgs,
    pub(crate) regions: Vec<MappedRequirement>,
    pub(crate) completion: Arc<Completion>,
}

/// Unit of work scheduled through the dependency graph.
pub(crate) enum Job {
    Point(PointJob),
    /// Inline map: snapshot an array and reply on a bounded(1) channel.
    Map {
        id: LaunchId,
        storage: Arc<ArrayStorage>,
        reply: Sender<Vec<f64>>,
        completion: Arc<Completion>,
    },
}

impl Job {
    pub(crate) fn launch_id(&self) -> LaunchId {
        match self {
            Self::Point(p) => p.info.launch_id,
            Self::Map { id, .. } => *id,
        }
    }

    pub(crate) fn completion(&self) -> &Arc<Completion> {
        match self {
            Self::Point(p) => &p.completion,
            Self::Map { completion, .. } => completion,
        }
    }
}

/// Main loop for a worker thread.
///
/// Runs until a `Shutdown` message arrives or every sender is dropped.
pub(crate) fn worker_loop(index: usize, rx: Receiver<WorkerMsg>, inner: Arc<Inner>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            WorkerMsg::Run(job) => inner.run(index, job),
            WorkerMsg::Shutdown => break,
        }
    }
    tracing::debug!(worker = index, "worker exiting");
}

/// Map the job's regions and run its callback.
///
/// Returns the regions on success so the caller can decide whether to
/// copy them out.
pub(crate) fn execute_point(
    job: &PointJob,
    worker: usize,
    runtime: &dyn LaunchTarget,
) -> Result<Vec<PhysicalRegion>, TaskError> {
    let mut regions = Vec::with_capacity(job.regions.len());
    for m in &job.regions {
        let data = m.storage.map_in(m.zones, m.access, m.reduction);
        regions.push(PhysicalRegion::new(
            m.array.clone(),
            m.access,
            m.zones,
            m.reduction,
            data,
        )?);
    }
    let ctx = TaskContext::new(worker, runtime);
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        (job.callback)(&job.info, &*job.args, regions.as_mut_slice(), &ctx)
    }));
    match outcome {
        Ok(Ok(())) => Ok(regions),
        Ok(Err(e)) => Err(e),
        Err(payload) => Err(TaskError::Panicked {
            reason: panic_message(payload.as_ref()),
        }),
    }
}

/// Merge a finished point's buffers back into storage.
pub(crate) fn copy_out(job: &PointJob, regions: Vec<PhysicalRegion>) {
    for (m, region) in job.regions.iter().zip(regions) {
        m.storage
            .map_out(m.zones, m.access, m.reduction, &region.into_data());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_strings() {
        let caught = catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom 7");
        let caught = catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "static");
        let caught = catch_unwind(|| std::panic::panic_any(5u8)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "non-string panic payload");
    }
}
