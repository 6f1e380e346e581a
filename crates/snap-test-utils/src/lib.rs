//! Test utilities and mock types for snap development.
//!
//! Provides a [`RecordingLauncher`] that accepts launches without running
//! them, an [`EventLog`] for asserting execution order across worker
//! threads, small [`fixtures`] task kinds, and [`small_array`] for building
//! detached array handles.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use snap_core::{
    ArrayDef, ArrayId, ArrayShape, LaunchError, Partition, RuntimeInstanceId, SnapArray,
};
use snap_task::{LaunchTarget, TaskFuture, TaskLauncher};

/// [`LaunchTarget`] that records every launcher and runs nothing.
///
/// Each launch returns an already-complete future.
#[derive(Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<TaskLauncher>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TaskLauncher>> {
        self.launched.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Launchers received so far, in launch order.
    pub fn launched(&self) -> Vec<TaskLauncher> {
        self.lock().clone()
    }

    /// Names of the launched task kinds, in launch order.
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|l| l.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl LaunchTarget for RecordingLauncher {
    fn launch(&self, launcher: TaskLauncher) -> Result<TaskFuture, LaunchError> {
        self.lock().push(launcher);
        Ok(TaskFuture::ready())
    }
}

/// Which edge of a task's execution an event marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Start,
    End,
}

/// Thread-safe append-only log of task start/end events.
///
/// Clones share the same log.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<(String, Phase)>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, Phase)>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, label: &str, phase: Phase) {
        self.lock().push((label.to_string(), phase));
    }

    /// Copy of every event so far.
    pub fn events(&self) -> Vec<(String, Phase)> {
        self.lock().clone()
    }

    /// Position of the first `phase` event for `label`.
    pub fn position(&self, label: &str, phase: Phase) -> Option<usize> {
        self.lock()
            .iter()
            .position(|(l, p)| l == label && *p == phase)
    }

    /// Whether `first` ended before `second` started.
    pub fn finished_before(&self, first: &str, second: &str) -> bool {
        match (
            self.position(first, Phase::End),
            self.position(second, Phase::Start),
        ) {
            (Some(end), Some(start)) => end < start,
            _ => false,
        }
    }

    /// Whether both labels started before either ended.
    pub fn overlapped(&self, a: &str, b: &str) -> bool {
        let pos = |l, p| self.position(l, p);
        match (
            pos(a, Phase::Start),
            pos(a, Phase::End),
            pos(b, Phase::Start),
            pos(b, Phase::End),
        ) {
            (Some(sa), Some(ea), Some(sb), Some(eb)) => sa < eb && sb < ea,
            _ => false,
        }
    }
}

/// A detached handle to an `nx * ny * nz` array with `components` values
/// per zone, split into `pieces` blocked subregions.
///
/// The handle belongs to a fresh instance id, so any runtime rejects it as
/// foreign.
pub fn small_array(extents: [usize; 3], components: usize, pieces: usize) -> SnapArray {
    let shape = ArrayShape::new(extents, components).expect("valid test shape");
    let partition = Partition::blocked(shape.zone_count(), pieces).expect("valid test partition");
    let def = ArrayDef::new("test", shape).with_partition(partition);
    SnapArray::new(ArrayId(0), RuntimeInstanceId::next(), Arc::new(def))
}
