//! The user-facing [`Runtime`] and its shared state.
//!
//! # Architecture
//!
//! ```text
//! Application thread               Scheduler (mutex)            Workers (N)
//!     |                                  |                          |
//!     |--launch(launcher)--------------->| validate                 |
//!     |   returns TaskFuture             | one point per color      |
//!     |                                  | deps = conflicting       |
//!     |                                  |   in-flight points       |
//!     |                                  | ready? --Run(job)------->| map_in
//!     |                                  |                          | callback
//!     |                                  |<--complete(id)-----------| map_out
//!     |                                  | release dependents       | finish
//!     |--future.wait() / fence()         |                          |
//!     |--map_array()--------------------> read-only point --------->| snapshot
//!     |<--reply via bounded(1)-----------------------------------------|
//! ```
//!
//! A failing callback poisons the runtime: its own future reports
//! [`RuntimeError::TaskFailed`], every other outstanding future reports
//! [`RuntimeError::Poisoned`], and later launches are rejected.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{SendError, Sender};
use snap_core::{
    AccessMode, ArrayDef, ArrayError, LaunchError, RuntimeError, RuntimeInstanceId, SnapArray,
    VariantKind, ZoneRange,
};
use snap_task::{
    validate_requirements, Completion, LaunchTarget, TaskFuture, TaskInfo, TaskLauncher,
    TaskRegistry, TaskState,
};

use crate::config::{ConfigError, RuntimeConfig};
use crate::metrics::{Counters, RuntimeMetrics};
use crate::scheduler::{DependencyRecord, Footprint, Scheduler};
use crate::store::ArrayStore;
use crate::worker::{self, Job, MappedRequirement, PointJob, WorkerMsg};

/// Label used for inline maps in dependency traces.
const INLINE_MAP: &str = "inline map";

// ── Inner ─────────────────────────────────────────────────────────

/// State shared between the runtime, its handles, and its workers.
pub(crate) struct Inner {
    instance: RuntimeInstanceId,
    registry: TaskRegistry,
    processor: VariantKind,
    store: ArrayStore,
    scheduler: Mutex<Scheduler<Job>>,
    tx: Sender<WorkerMsg>,
    poison: OnceLock<String>,
    closed: AtomicBool,
    counters: Counters,
    workers: usize,
}

impl Inner {
    fn lock_scheduler(&self) -> MutexGuard<'_, Scheduler<Job>> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn poisoned(&self) -> Option<RuntimeError> {
        self.poison.get().map(|reason| RuntimeError::Poisoned {
            reason: reason.clone(),
        })
    }

    /// Reject launches once closed or poisoned. Call with the scheduler
    /// locked so the answer cannot change before the points are added.
    ///
    /// `nested` launches come from a running callback; the shutdown fence
    /// is still waiting on their parent, so closing does not reject them.
    fn check_open(&self, nested: bool) -> Result<(), LaunchError> {
        if let Some(reason) = self.poison.get() {
            return Err(LaunchError::Poisoned {
                reason: reason.clone(),
            });
        }
        if !nested && self.closed.load(Ordering::Acquire) {
            return Err(LaunchError::ShuttingDown);
        }
        Ok(())
    }

    fn check_array(&self, task: &str, array: &SnapArray) -> Result<(), LaunchError> {
        if array.instance() != self.instance {
            return Err(LaunchError::ForeignArray {
                task: task.to_string(),
                array: array.name().to_string(),
            });
        }
        Ok(())
    }

    fn launch(&self, launcher: TaskLauncher, nested: bool) -> Result<TaskFuture, LaunchError> {
        self.check_open(nested)?;
        let registered = self
            .registry
            .get(launcher.task_id())
            .ok_or(LaunchError::UnregisteredTask {
                task: launcher.task_id(),
            })?;
        let name = registered.name();
        let variant = registered
            .variant(self.processor)
            .ok_or_else(|| LaunchError::NoVariant {
                task: name.to_string(),
                kind: self.processor,
            })?;
        if launcher.redop() != registered.redop() {
            return Err(LaunchError::RedopMismatch {
                task: name.to_string(),
                registered: registered.redop(),
                launched: launcher.redop(),
            });
        }
        let mut storages = Vec::with_capacity(launcher.requirements().len());
        for req in launcher.requirements() {
            self.check_array(name, req.array())?;
            let storage =
                self.store
                    .get(req.array().id())
                    .ok_or_else(|| LaunchError::UnknownArray {
                        task: name.to_string(),
                        array: req.array().id(),
                    })?;
            storages.push(storage);
        }
        validate_requirements(
            name,
            registered.redop(),
            launcher.requirements(),
            launcher.domain(),
        )?;

        // Resolve every point before touching the scheduler so a bad point
        // rejects the whole launch.
        let mut points = Vec::new();
        for point in launcher.points() {
            let mut regions = Vec::with_capacity(storages.len());
            let mut footprint = Footprint::default();
            for (i, (req, storage)) in launcher.requirements().iter().zip(&storages).enumerate() {
                let zones = req
                    .resolve(point)
                    .ok_or_else(|| LaunchError::InvalidSelector {
                        task: name.to_string(),
                        requirement: i,
                        reason: format!("{} does not resolve", req.selector()),
                    })?;
                let reduction = match req.access() {
                    AccessMode::Reduce(op) => Some(self.registry.reduction(op).ok_or_else(
                        || LaunchError::AccessMismatch {
                            task: name.to_string(),
                            requirement: i,
                            reason: format!("reduction operator {op} is not registered"),
                        },
                    )?),
                    _ => None,
                };
                footprint.push(req.array().id(), zones, req.access());
                regions.push(MappedRequirement {
                    array: req.array().clone(),
                    storage: Arc::clone(storage),
                    zones,
                    access: req.access(),
                    reduction,
                });
            }
            points.push((point, regions, footprint));
        }

        let mut handles = Vec::with_capacity(points.len());
        let mut runnable = Vec::new();
        {
            let mut scheduler = self.lock_scheduler();
            self.check_open(nested)?;
            for (point, regions, footprint) in points {
                let id = scheduler.next_launch_id();
                let completion = Completion::new();
                let job = Job::Point(PointJob {
                    info: TaskInfo {
                        task_id: launcher.task_id(),
                        name: name.to_string(),
                        redop: registered.redop(),
                        launch_id: id,
                        point,
                    },
                    callback: Arc::clone(variant.callback()),
                    args: Arc::clone(launcher.args()),
                    regions,
                    completion: Arc::clone(&completion),
                });
                if let Some(job) =
                    scheduler.submit(id, (name, point), footprint, Arc::clone(&completion), job)
                {
                    runnable.push(job);
                }
                handles.push((id, completion));
            }
        }
        Counters::bump(&self.counters.launches, 1);
        Counters::bump(&self.counters.points_launched, handles.len() as u64);
        tracing::debug!(
            task = name,
            points = handles.len(),
            ready = runnable.len(),
            "launched"
        );
        self.dispatch(runnable);
        Ok(TaskFuture::new(handles))
    }

    /// Hand ready jobs to the workers.
    ///
    /// If the channel is gone the job can never run: fail it and retire it
    /// so nothing waits on it forever.
    fn dispatch(&self, jobs: Vec<Job>) {
        let mut queue = jobs;
        while let Some(job) = queue.pop() {
            if let Err(SendError(WorkerMsg::Run(job))) = self.tx.send(WorkerMsg::Run(job)) {
                job.completion().finish(Err(RuntimeError::ShuttingDown));
                queue.extend(self.lock_scheduler().complete(job.launch_id()));
            }
        }
    }

    /// Execute one job on worker `index`. Called from the worker loop.
    pub(crate) fn run(&self, index: usize, job: Job) {
        let id = job.launch_id();
        match job {
            Job::Point(point) => self.run_point(index, &point),
            Job::Map {
                storage,
                reply,
                completion,
                ..
            } => match self.poisoned() {
                Some(err) => {
                    completion.finish(Err(err));
                }
                None => {
                    completion.advance(TaskState::Executing);
                    Counters::bump(&self.counters.inline_maps, 1);
                    let _ = reply.send(storage.snapshot());
                    completion.finish(Ok(()));
                }
            },
        }
        let released = self.lock_scheduler().complete(id);
        self.dispatch(released);
    }

    fn run_point(&self, index: usize, job: &PointJob) {
        if let Some(err) = self.poisoned() {
            Counters::bump(&self.counters.points_discarded, 1);
            job.completion.finish(Err(err));
            return;
        }
        job.completion.advance(TaskState::Executing);
        self.counters.enter();
        let result = worker::execute_point(job, index, &Nested(self));
        self.counters.exit();
        match result {
            Ok(regions) => {
                if let Some(err) = self.poisoned() {
                    Counters::bump(&self.counters.points_discarded, 1);
                    job.completion.finish(Err(err));
                    return;
                }
                worker::copy_out(job, regions);
                Counters::bump(&self.counters.points_completed, 1);
                job.completion.finish(Ok(()));
            }
            Err(reason) => {
                Counters::bump(&self.counters.points_failed, 1);
                tracing::error!(
                    task = %job.info.name,
                    launch = %job.info.launch_id,
                    worker = index,
                    error = %reason,
                    "task failed"
                );
                let failure = RuntimeError::TaskFailed {
                    task: job.info.task_id,
                    name: job.info.name.clone(),
                    reason,
                };
                self.poison_with(&job.completion, failure);
            }
        }
    }

    /// Fail `failed` and enter the poisoned state.
    ///
    /// The poison is visible before `failed` resolves. Only the first
    /// failure discards other work.
    fn poison_with(&self, failed: &Completion, failure: RuntimeError) {
        let reason = failure.to_string();
        let drained = {
            let mut scheduler = self.lock_scheduler();
            match self.poison.set(reason.clone()) {
                Ok(()) => Some((scheduler.drain_parked(), scheduler.outstanding())),
                Err(_) => None,
            }
        };
        failed.finish(Err(failure));
        let Some((parked, outstanding)) = drained else {
            return;
        };
        tracing::error!(
            %reason,
            discarded = parked.len(),
            in_flight = outstanding.len(),
            "runtime poisoned"
        );
        let err = RuntimeError::Poisoned { reason };
        for (_, job) in parked {
            if matches!(job, Job::Point(_)) {
                Counters::bump(&self.counters.points_discarded, 1);
            }
            job.completion().finish(Err(err.clone()));
        }
        for (_, completion) in outstanding {
            completion.finish(Err(err.clone()));
        }
    }

    fn map_array(&self, array: &SnapArray) -> Result<Vec<f64>, RuntimeError> {
        self.check_array(INLINE_MAP, array)?;
        let storage = self
            .store
            .get(array.id())
            .ok_or_else(|| LaunchError::UnknownArray {
                task: INLINE_MAP.to_string(),
                array: array.id(),
            })?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let runnable = {
            let mut scheduler = self.lock_scheduler();
            self.check_open(false)?;
            let id = scheduler.next_launch_id();
            let zones = ZoneRange::new(0, array.shape().zone_count());
            let mut footprint = Footprint::default();
            footprint.push(array.id(), zones, AccessMode::ReadOnly);
            let completion = Completion::new();
            let job = Job::Map {
                id,
                storage,
                reply: reply_tx,
                completion: Arc::clone(&completion),
            };
            scheduler.submit(id, (INLINE_MAP, None), footprint, completion, job)
        };
        self.dispatch(runnable.into_iter().collect());
        reply_rx
            .recv()
            .map_err(|_| self.poisoned().unwrap_or(RuntimeError::ShuttingDown))
    }

    /// Wait for every outstanding point, including children launched by
    /// the points being waited on.
    fn fence(&self) -> Result<(), RuntimeError> {
        let mut seen = HashSet::new();
        let mut first_err = None;
        loop {
            let fresh: Vec<_> = {
                let scheduler = self.lock_scheduler();
                tracing::trace!(in_flight = scheduler.in_flight(), "fence");
                scheduler
                    .outstanding()
                    .into_iter()
                    .filter(|(id, _)| seen.insert(*id))
                    .collect()
            };
            if fresh.is_empty() {
                break;
            }
            for (_, completion) in fresh {
                if let Err(e) = completion.wait() {
                    first_err.get_or_insert(e);
                }
            }
        }
        match (self.poisoned(), first_err) {
            (Some(e), _) | (None, Some(e)) => Err(e),
            (None, None) => Ok(()),
        }
    }
}

/// Launch target handed to running callbacks.
struct Nested<'a>(&'a Inner);

impl LaunchTarget for Nested<'_> {
    fn launch(&self, launcher: TaskLauncher) -> Result<TaskFuture, LaunchError> {
        self.0.launch(launcher, true)
    }
}

// ── RuntimeHandle ─────────────────────────────────────────────────

/// Cloneable launch handle to a [`Runtime`].
///
/// Handles can be moved to other threads. Launches through a handle are
/// rejected with [`LaunchError::ShuttingDown`] once the runtime has begun
/// shutting down.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Arc<Inner>,
}

impl RuntimeHandle {
    /// The owning runtime's instance id.
    pub fn instance(&self) -> RuntimeInstanceId {
        self.inner.instance
    }

    /// Copy of an array's contents, ordered after every earlier launch.
    pub fn map_array(&self, array: &SnapArray) -> Result<Vec<f64>, RuntimeError> {
        self.inner.map_array(array)
    }
}

impl LaunchTarget for RuntimeHandle {
    fn launch(&self, launcher: TaskLauncher) -> Result<TaskFuture, LaunchError> {
        self.inner.launch(launcher, false)
    }
}

// ── ShutdownReport ────────────────────────────────────────────────

/// Outcome of [`Runtime::shutdown`].
#[derive(Debug)]
pub struct ShutdownReport {
    /// Result of the final fence.
    pub outcome: Result<(), RuntimeError>,
    /// Number of worker threads joined.
    pub workers_joined: usize,
    /// Wall-clock time for the whole shutdown, in milliseconds.
    pub total_ms: u64,
}

// ── Runtime ───────────────────────────────────────────────────────

/// Shared-memory task runtime.
///
/// Owns the arrays, the frozen task registry, and a pool of worker
/// threads. Launches return immediately; the runtime derives ordering from
/// the declared region requirements and runs independent work in parallel.
///
/// # Example
///
/// ```
/// use snap_core::{ArrayDef, ArrayShape};
/// use snap_runtime::{Runtime, RuntimeConfig};
/// use snap_task::TaskRegistry;
///
/// let runtime = Runtime::new(RuntimeConfig::default(), TaskRegistry::new()).unwrap();
/// let shape = ArrayShape::new([4, 4, 1], 1).unwrap();
/// let array = runtime.create_array(ArrayDef::new("mat", shape).with_fill(3.0)).unwrap();
/// assert_eq!(runtime.map_array(&array).unwrap(), vec![3.0; 16]);
/// let report = runtime.shutdown();
/// assert!(report.outcome.is_ok());
/// ```
pub struct Runtime {
    inner: Arc<Inner>,
    workers: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Validate the configuration and registry, then spawn the workers.
    ///
    /// The registry is frozen from here on.
    pub fn new(config: RuntimeConfig, registry: TaskRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        registry.validate()?;
        let worker_count = config.resolved_worker_count();
        let (tx, rx) = crossbeam_channel::unbounded();
        let inner = Arc::new(Inner {
            instance: RuntimeInstanceId::next(),
            registry,
            processor: config.processor,
            store: ArrayStore::default(),
            scheduler: Mutex::new(Scheduler::new(config.trace_dependencies)),
            tx,
            poison: OnceLock::new(),
            closed: AtomicBool::new(false),
            counters: Counters::default(),
            workers: worker_count,
        });

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let rx = rx.clone();
            let inner_ref = Arc::clone(&inner);
            let spawned = thread::Builder::new()
                .name(format!("{}-{i}", config.thread_name_prefix))
                .spawn(move || worker::worker_loop(i, rx, inner_ref));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    for _ in &workers {
                        let _ = inner.tx.send(WorkerMsg::Shutdown);
                    }
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(ConfigError::ThreadSpawnFailed {
                        reason: format!("worker {i}: {e}"),
                    });
                }
            }
        }
        tracing::info!(
            instance = %inner.instance,
            workers = worker_count,
            tasks = inner.registry.len(),
            "runtime started"
        );
        Ok(Self { inner, workers })
    }

    /// Allocate a new array filled with `def.fill`.
    pub fn create_array(&self, def: ArrayDef) -> Result<SnapArray, ArrayError> {
        def.validate()?;
        let def = Arc::new(def);
        let id = self.inner.store.create(Arc::clone(&def));
        tracing::debug!(
            array = %id,
            name = %def.name,
            zones = def.shape.zone_count(),
            total = self.inner.store.len(),
            "array created"
        );
        Ok(SnapArray::new(id, self.inner.instance, def))
    }

    /// Schedule a launch. Returns without waiting for execution.
    pub fn launch(&self, launcher: TaskLauncher) -> Result<TaskFuture, LaunchError> {
        self.inner.launch(launcher, false)
    }

    /// Block until everything launched so far has finished.
    ///
    /// Reports the poison if any task has failed, otherwise the first
    /// error among the waited-on launches.
    pub fn fence(&self) -> Result<(), RuntimeError> {
        self.inner.fence()
    }

    /// Copy of an array's contents, ordered after every earlier launch
    /// that writes it. Blocks.
    pub fn map_array(&self, array: &SnapArray) -> Result<Vec<f64>, RuntimeError> {
        self.inner.map_array(array)
    }

    /// Counters since startup.
    pub fn metrics(&self) -> RuntimeMetrics {
        self.inner.counters.snapshot(self.inner.workers)
    }

    /// Recorded dependencies, in launch order. Empty unless
    /// [`RuntimeConfig::trace_dependencies`] was set.
    pub fn dependency_trace(&self) -> Vec<DependencyRecord> {
        self.inner.lock_scheduler().trace()
    }

    /// A cloneable launch handle.
    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// This runtime's instance id.
    pub fn instance(&self) -> RuntimeInstanceId {
        self.inner.instance
    }

    /// The frozen registry.
    pub fn registry(&self) -> &TaskRegistry {
        &self.inner.registry
    }

    /// Whether a task has failed.
    pub fn is_poisoned(&self) -> bool {
        self.inner.poison.get().is_some()
    }

    /// Stop accepting launches, wait for in-flight work, and join the
    /// workers.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.stop()
    }

    fn stop(&mut self) -> ShutdownReport {
        let start = Instant::now();
        {
            let _scheduler = self.inner.lock_scheduler();
            self.inner.closed.store(true, Ordering::Release);
        }
        let outcome = self.inner.fence();
        for _ in &self.workers {
            let _ = self.inner.tx.send(WorkerMsg::Shutdown);
        }
        let mut workers_joined = 0;
        for handle in self.workers.drain(..) {
            if handle.join().is_ok() {
                workers_joined += 1;
            }
        }
        let metrics = self.metrics();
        tracing::info!(
            instance = %self.inner.instance,
            workers_joined,
            completed = metrics.points_completed,
            failed = metrics.points_failed,
            "runtime stopped"
        );
        ShutdownReport {
            outcome,
            workers_joined,
            total_ms: start.elapsed().as_millis() as u64,
        }
    }
}

impl LaunchTarget for Runtime {
    fn launch(&self, launcher: TaskLauncher) -> Result<TaskFuture, LaunchError> {
        self.inner.launch(launcher, false)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop();
        }
    }
}
