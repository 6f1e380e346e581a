//! Reusable task fixtures.
//!
//! Standard task kinds for runtime and initializer testing:
//!
//! - [`ConstFill`]: writes a constant over an array (write-discard).
//! - [`SumContribution`] / [`MaxContribution`]: reduce a constant into
//!   every element.
//! - [`ReadProbe`]: copies an array's contents out for assertions.
//! - [`LoggedTask`]: records start/end in an [`EventLog`] around a sleep.
//! - [`Rendezvous`]: succeeds only if `n` instances run at the same time.
//! - [`FailingTask`] / [`PanickingTask`]: fail deterministically.
//! - [`ParentTask`]: launches child tasks from inside its callback.
//!
//! Ids live in the 1000 range, clear of the problem initializers.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use snap_core::{
    AccessMode, Color, Redop, RegionRequirement, RegistryError, SnapArray, TaskError, TaskId,
};
use snap_task::{
    LaunchDomain, PhysicalRegion, SnapTask, TaskContext, TaskInfo, TaskLauncher, TaskRegistry,
    MAX_REDUCTION_ID, SUM_REDUCTION_ID,
};

use crate::{EventLog, Phase};

pub const CONST_FILL_TASK_ID: TaskId = TaskId(1001);
pub const SUM_CONTRIBUTION_TASK_ID: TaskId = TaskId(1002);
pub const MAX_CONTRIBUTION_TASK_ID: TaskId = TaskId(1003);
pub const READ_PROBE_TASK_ID: TaskId = TaskId(1004);
pub const LOGGED_TASK_ID: TaskId = TaskId(1005);
pub const RENDEZVOUS_TASK_ID: TaskId = TaskId(1006);
pub const FAILING_TASK_ID: TaskId = TaskId(1007);
pub const PANICKING_TASK_ID: TaskId = TaskId(1008);
pub const PARENT_TASK_ID: TaskId = TaskId(1009);

/// Register every fixture kind.
pub fn register_fixtures(registry: &mut TaskRegistry) -> Result<(), RegistryError> {
    ConstFill::preregister_cpu_variants(registry)?;
    SumContribution::preregister_cpu_variants(registry)?;
    MaxContribution::preregister_cpu_variants(registry)?;
    ReadProbe::preregister_cpu_variants(registry)?;
    LoggedTask::preregister_cpu_variants(registry)?;
    Rendezvous::preregister_cpu_variants(registry)?;
    FailingTask::preregister_cpu_variants(registry)?;
    PanickingTask::preregister_cpu_variants(registry)?;
    ParentTask::preregister_cpu_variants(registry)?;
    Ok(())
}

fn expect_regions(regions: &[PhysicalRegion], expected: usize) -> Result<(), TaskError> {
    if regions.len() == expected {
        Ok(())
    } else {
        Err(TaskError::RegionCount {
            expected,
            actual: regions.len(),
        })
    }
}

/// Writes `value` to every element of an array (write-discard).
pub struct ConstFill {
    pub requirements: Vec<RegionRequirement>,
    pub domain: LaunchDomain,
    pub value: f64,
}

impl ConstFill {
    /// One task over the whole array.
    pub fn whole(array: &SnapArray, value: f64) -> Self {
        Self {
            requirements: vec![array.requirement(AccessMode::WriteDiscard)],
            domain: LaunchDomain::Single,
            value,
        }
    }

    /// One point per subregion.
    pub fn per_piece(array: &SnapArray, value: f64) -> Self {
        Self {
            requirements: vec![array.projected_requirement(AccessMode::WriteDiscard)],
            domain: LaunchDomain::Index(array.colors()),
            value,
        }
    }

    /// One task over a single subregion.
    pub fn piece(array: &SnapArray, color: Color, value: f64) -> Self {
        Self {
            requirements: vec![array.subregion_requirement(color, AccessMode::WriteDiscard)],
            domain: LaunchDomain::Single,
            value,
        }
    }
}

impl SnapTask for ConstFill {
    const TASK_ID: TaskId = CONST_FILL_TASK_ID;
    const REDOP: Redop = Redop::None;
    const NAME: &'static str = "ConstFill";
    type Args = f64;

    fn requirements(&self) -> &[RegionRequirement] {
        &self.requirements
    }

    fn into_args(self) -> f64 {
        self.value
    }

    fn launch_domain(&self) -> LaunchDomain {
        self.domain.clone()
    }

    fn cpu_implementation(
        task: &TaskInfo,
        value: &f64,
        regions: &mut [PhysicalRegion],
        _ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError> {
        expect_regions(regions, 1)?;
        let mut guard = regions[0].full_write_guard(&task.name)?;
        let len = guard.len();
        guard.fill_run(0, std::iter::repeat(*value).take(len));
        Ok(())
    }
}

/// Adds `value` into every element through the sum operator.
pub struct SumContribution {
    pub requirements: Vec<RegionRequirement>,
    pub value: f64,
}

impl SumContribution {
    pub fn new(array: &SnapArray, value: f64) -> Self {
        Self {
            requirements: vec![array.requirement(AccessMode::Reduce(SUM_REDUCTION_ID))],
            value,
        }
    }
}

impl SnapTask for SumContribution {
    const TASK_ID: TaskId = SUM_CONTRIBUTION_TASK_ID;
    const REDOP: Redop = Redop::Reduce(SUM_REDUCTION_ID);
    const NAME: &'static str = "SumContribution";
    type Args = f64;

    fn requirements(&self) -> &[RegionRequirement] {
        &self.requirements
    }

    fn into_args(self) -> f64 {
        self.value
    }

    fn cpu_implementation(
        _task: &TaskInfo,
        value: &f64,
        regions: &mut [PhysicalRegion],
        _ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError> {
        contribute(regions, *value)
    }
}

/// Folds `value` into every element through the max operator.
pub struct MaxContribution {
    pub requirements: Vec<RegionRequirement>,
    pub value: f64,
}

impl MaxContribution {
    pub fn new(array: &SnapArray, value: f64) -> Self {
        Self {
            requirements: vec![array.requirement(AccessMode::Reduce(MAX_REDUCTION_ID))],
            value,
        }
    }
}

impl SnapTask for MaxContribution {
    const TASK_ID: TaskId = MAX_CONTRIBUTION_TASK_ID;
    const REDOP: Redop = Redop::Reduce(MAX_REDUCTION_ID);
    const NAME: &'static str = "MaxContribution";
    type Args = f64;

    fn requirements(&self) -> &[RegionRequirement] {
        &self.requirements
    }

    fn into_args(self) -> f64 {
        self.value
    }

    fn cpu_implementation(
        _task: &TaskInfo,
        value: &f64,
        regions: &mut [PhysicalRegion],
        _ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError> {
        contribute(regions, *value)
    }
}

fn contribute(regions: &mut [PhysicalRegion], value: f64) -> Result<(), TaskError> {
    expect_regions(regions, 1)?;
    let region = &mut regions[0];
    for i in 0..region.len() {
        region.reduce(i, value)?;
    }
    Ok(())
}

/// Shared slot a [`ReadProbe`] copies into.
#[derive(Clone, Default)]
pub struct ProbeSink(Arc<Mutex<Option<Vec<f64>>>>);

impl ProbeSink {
    /// The captured contents, if the probe has run.
    pub fn take(&self) -> Option<Vec<f64>> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Reads an array and copies its contents into a [`ProbeSink`].
pub struct ReadProbe {
    pub requirements: Vec<RegionRequirement>,
    pub sink: ProbeSink,
    pub log: Option<(EventLog, String)>,
}

impl ReadProbe {
    pub fn new(array: &SnapArray) -> (Self, ProbeSink) {
        let sink = ProbeSink::default();
        let probe = Self {
            requirements: vec![array.requirement(AccessMode::ReadOnly)],
            sink: sink.clone(),
            log: None,
        };
        (probe, sink)
    }

    /// Also record start/end under `label`.
    pub fn logged(mut self, log: &EventLog, label: impl Into<String>) -> Self {
        self.log = Some((log.clone(), label.into()));
        self
    }
}

impl SnapTask for ReadProbe {
    const TASK_ID: TaskId = READ_PROBE_TASK_ID;
    const REDOP: Redop = Redop::None;
    const NAME: &'static str = "ReadProbe";
    type Args = (ProbeSink, Option<(EventLog, String)>);

    fn requirements(&self) -> &[RegionRequirement] {
        &self.requirements
    }

    fn into_args(self) -> Self::Args {
        (self.sink, self.log)
    }

    fn cpu_implementation(
        _task: &TaskInfo,
        (sink, log): &Self::Args,
        regions: &mut [PhysicalRegion],
        _ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError> {
        if let Some((log, label)) = log {
            log.record(label, Phase::Start);
        }
        expect_regions(regions, 1)?;
        let data = regions[0].read()?.to_vec();
        *sink.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(data);
        if let Some((log, label)) = log {
            log.record(label, Phase::End);
        }
        Ok(())
    }
}

/// Records start and end in an [`EventLog`] around a sleep.
///
/// Requirements are supplied by the caller and never touched, so the task
/// only exercises scheduling.
pub struct LoggedTask {
    pub requirements: Vec<RegionRequirement>,
    pub log: EventLog,
    pub label: String,
    pub delay: Duration,
}

impl LoggedTask {
    pub fn new(
        log: &EventLog,
        label: impl Into<String>,
        requirements: Vec<RegionRequirement>,
    ) -> Self {
        Self {
            requirements,
            log: log.clone(),
            label: label.into(),
            delay: Duration::from_millis(20),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl SnapTask for LoggedTask {
    const TASK_ID: TaskId = LOGGED_TASK_ID;
    const REDOP: Redop = Redop::None;
    const NAME: &'static str = "LoggedTask";
    type Args = (EventLog, String, Duration);

    fn requirements(&self) -> &[RegionRequirement] {
        &self.requirements
    }

    fn into_args(self) -> Self::Args {
        (self.log, self.label, self.delay)
    }

    fn cpu_implementation(
        _task: &TaskInfo,
        (log, label, delay): &Self::Args,
        _regions: &mut [PhysicalRegion],
        _ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError> {
        log.record(label, Phase::Start);
        std::thread::sleep(*delay);
        log.record(label, Phase::End);
        Ok(())
    }
}

/// Meeting point shared by the instances of a [`Rendezvous`] group.
pub struct RendezvousPoint {
    arrived: Mutex<usize>,
    all_here: Condvar,
    expected: usize,
    timeout: Duration,
}

impl RendezvousPoint {
    pub fn new(expected: usize, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            arrived: Mutex::new(0),
            all_here: Condvar::new(),
            expected,
            timeout,
        })
    }

    fn arrive(&self) -> bool {
        let mut arrived = self.arrived.lock().unwrap_or_else(PoisonError::into_inner);
        *arrived += 1;
        self.all_here.notify_all();
        let (arrived, result) = self
            .all_here
            .wait_timeout_while(arrived, self.timeout, |n| *n < self.expected)
            .unwrap_or_else(PoisonError::into_inner);
        drop(arrived);
        !result.timed_out()
    }
}

/// Succeeds only if every member of its group is running at once.
///
/// Proves two launches were scheduled concurrently: each instance waits
/// for the others and fails after the point's timeout.
pub struct Rendezvous {
    pub requirements: Vec<RegionRequirement>,
    pub point: Arc<RendezvousPoint>,
}

impl Rendezvous {
    pub fn new(point: &Arc<RendezvousPoint>, requirements: Vec<RegionRequirement>) -> Self {
        Self {
            requirements,
            point: Arc::clone(point),
        }
    }
}

impl SnapTask for Rendezvous {
    const TASK_ID: TaskId = RENDEZVOUS_TASK_ID;
    const REDOP: Redop = Redop::None;
    const NAME: &'static str = "Rendezvous";
    type Args = Arc<RendezvousPoint>;

    fn requirements(&self) -> &[RegionRequirement] {
        &self.requirements
    }

    fn into_args(self) -> Self::Args {
        self.point
    }

    fn cpu_implementation(
        _task: &TaskInfo,
        point: &Self::Args,
        _regions: &mut [PhysicalRegion],
        _ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError> {
        if point.arrive() {
            Ok(())
        } else {
            Err(TaskError::ExecutionFailed {
                reason: format!("only some of {} instances ran together", point.expected),
            })
        }
    }
}

/// Always fails with [`TaskError::ExecutionFailed`].
pub struct FailingTask {
    pub requirements: Vec<RegionRequirement>,
}

impl FailingTask {
    pub fn new(requirements: Vec<RegionRequirement>) -> Self {
        Self { requirements }
    }
}

impl SnapTask for FailingTask {
    const TASK_ID: TaskId = FAILING_TASK_ID;
    const REDOP: Redop = Redop::None;
    const NAME: &'static str = "FailingTask";
    type Args = ();

    fn requirements(&self) -> &[RegionRequirement] {
        &self.requirements
    }

    fn into_args(self) {}

    fn cpu_implementation(
        _task: &TaskInfo,
        _args: &(),
        _regions: &mut [PhysicalRegion],
        _ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError> {
        Err(TaskError::ExecutionFailed {
            reason: "deliberate failure".into(),
        })
    }
}

/// Always panics.
pub struct PanickingTask;

impl SnapTask for PanickingTask {
    const TASK_ID: TaskId = PANICKING_TASK_ID;
    const REDOP: Redop = Redop::None;
    const NAME: &'static str = "PanickingTask";
    type Args = ();

    fn requirements(&self) -> &[RegionRequirement] {
        &[]
    }

    fn into_args(self) {}

    fn cpu_implementation(
        _task: &TaskInfo,
        _args: &(),
        _regions: &mut [PhysicalRegion],
        _ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError> {
        panic!("deliberate panic")
    }
}

/// Sleeps, then launches each child through the task context.
///
/// Holds no regions itself and never waits on the children.
pub struct ParentTask {
    pub children: Vec<TaskLauncher>,
    pub delay: Duration,
}

impl ParentTask {
    pub fn new(children: Vec<TaskLauncher>) -> Self {
        Self {
            children,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl SnapTask for ParentTask {
    const TASK_ID: TaskId = PARENT_TASK_ID;
    const REDOP: Redop = Redop::None;
    const NAME: &'static str = "ParentTask";
    type Args = (Vec<TaskLauncher>, Duration);

    fn requirements(&self) -> &[RegionRequirement] {
        &[]
    }

    fn into_args(self) -> Self::Args {
        (self.children, self.delay)
    }

    fn cpu_implementation(
        _task: &TaskInfo,
        (children, delay): &Self::Args,
        _regions: &mut [PhysicalRegion],
        ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError> {
        std::thread::sleep(*delay);
        for child in children {
            ctx.runtime()
                .launch(child.clone())
                .map_err(|e| TaskError::ExecutionFailed {
                    reason: format!("child '{}' rejected: {e}", child.name()),
                })?;
        }
        Ok(())
    }
}
