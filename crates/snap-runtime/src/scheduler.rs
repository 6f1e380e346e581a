//! Dependency analysis over in-flight launch points.
//!
//! Every launch point is added in program order with its footprint: the
//! `(array, zone range, access)` triples its requirements resolve to. A
//! new point depends on every in-flight point whose footprint conflicts
//! with its own: same array, overlapping zones, and access modes that
//! [`AccessMode::conflicts_with`] says must be ordered. A point becomes
//! ready when all of its dependencies have completed.
//!
//! The graph is generic over the job payload so it can be tested without
//! threads.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use snap_core::{AccessMode, ArrayId, ArraySet, Color, LaunchId, ZoneRange};
use snap_task::{Completion, TaskState};

/// The data a launch point touches.
#[derive(Clone, Debug, Default)]
pub(crate) struct Footprint {
    arrays: ArraySet,
    accesses: SmallVec<[(ArrayId, ZoneRange, AccessMode); 4]>,
}

impl Footprint {
    pub(crate) fn push(&mut self, array: ArrayId, zones: ZoneRange, access: AccessMode) {
        self.arrays.insert(array);
        self.accesses.push((array, zones, access));
    }

    /// Whether the two points must run in program order.
    pub(crate) fn conflicts_with(&self, other: &Self) -> bool {
        if !self.arrays.intersects(&other.arrays) {
            return false;
        }
        self.accesses.iter().any(|(a, za, ma)| {
            other
                .accesses
                .iter()
                .any(|(b, zb, mb)| a == b && za.overlaps(zb) && ma.conflicts_with(*mb))
        })
    }
}

/// One launch point and the earlier points it waited on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyRecord {
    /// The point's launch id.
    pub launch: LaunchId,
    /// Task kind name (`"inline map"` for inline maps).
    pub task: String,
    /// Color of the point in an index launch.
    pub point: Option<Color>,
    /// In-flight launches this point had to wait for, in program order.
    pub waits_on: Vec<LaunchId>,
}

struct Node<J> {
    footprint: Footprint,
    pending: usize,
    dependents: SmallVec<[LaunchId; 4]>,
    completion: Arc<Completion>,
    job: Option<J>,
}

/// In-flight launch points, in program order.
pub(crate) struct Scheduler<J> {
    next_id: u64,
    nodes: IndexMap<LaunchId, Node<J>>,
    trace: Option<Vec<DependencyRecord>>,
}

impl<J> Scheduler<J> {
    pub(crate) fn new(trace: bool) -> Self {
        Self {
            next_id: 0,
            nodes: IndexMap::new(),
            trace: trace.then(Vec::new),
        }
    }

    /// Allocate the next program-order id.
    pub(crate) fn next_launch_id(&mut self) -> LaunchId {
        let id = LaunchId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a point. Returns the job back if it is ready to run now.
    pub(crate) fn submit(
        &mut self,
        id: LaunchId,
        label: (&str, Option<Color>),
        footprint: Footprint,
        completion: Arc<Completion>,
        job: J,
    ) -> Option<J> {
        let mut waits_on = Vec::new();
        for (&other_id, other) in self.nodes.iter_mut() {
            if other.footprint.conflicts_with(&footprint) {
                other.dependents.push(id);
                waits_on.push(other_id);
            }
        }
        if let Some(trace) = &mut self.trace {
            trace.push(DependencyRecord {
                launch: id,
                task: label.0.to_string(),
                point: label.1,
                waits_on: waits_on.clone(),
            });
        }
        let ready = waits_on.is_empty();
        let (parked, runnable) = if ready {
            completion.advance(TaskState::Ready);
            (None, Some(job))
        } else {
            (Some(job), None)
        };
        self.nodes.insert(
            id,
            Node {
                footprint,
                pending: waits_on.len(),
                dependents: SmallVec::new(),
                completion,
                job: parked,
            },
        );
        runnable
    }

    /// Retire a finished point. Returns the jobs that became ready.
    pub(crate) fn complete(&mut self, id: LaunchId) -> Vec<J> {
        let Some(node) = self.nodes.shift_remove(&id) else {
            return Vec::new();
        };
        let mut ready = Vec::new();
        for dependent in node.dependents {
            let Some(waiting) = self.nodes.get_mut(&dependent) else {
                continue;
            };
            waiting.pending = waiting.pending.saturating_sub(1);
            if waiting.pending == 0 {
                if let Some(job) = waiting.job.take() {
                    waiting.completion.advance(TaskState::Ready);
                    ready.push(job);
                }
            }
        }
        ready
    }

    /// Remove every point that has not been handed to a worker yet.
    ///
    /// Used when the runtime is poisoned: the returned jobs never run.
    pub(crate) fn drain_parked(&mut self) -> Vec<(LaunchId, J)> {
        let parked: Vec<LaunchId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.job.is_some())
            .map(|(&id, _)| id)
            .collect();
        let mut jobs = Vec::with_capacity(parked.len());
        for id in parked {
            if let Some(job) = self.nodes.shift_remove(&id).and_then(|n| n.job) {
                jobs.push((id, job));
            }
        }
        jobs
    }

    /// Completions of every in-flight point.
    pub(crate) fn outstanding(&self) -> Vec<(LaunchId, Arc<Completion>)> {
        self.nodes
            .iter()
            .map(|(&id, n)| (id, Arc::clone(&n.completion)))
            .collect()
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn trace(&self) -> Vec<DependencyRecord> {
        self.trace.clone().unwrap_or_default()
    }
}
