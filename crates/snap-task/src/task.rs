//! The [`SnapTask`] trait: the contract every task kind satisfies.

use snap_core::{LaunchError, Redop, RegionRequirement, RegistryError, TaskError, TaskId};

use crate::context::{TaskContext, TaskInfo};
use crate::future::TaskFuture;
use crate::launcher::{LaunchDomain, LaunchTarget, TaskLauncher};
use crate::physical::PhysicalRegion;
use crate::registry::TaskRegistry;

/// A task kind.
///
/// A value of the implementing type is one pending launch: it carries the
/// region requirements computed at construction and the arguments its
/// callback receives. The kind itself (id, redop, callback) is fixed at
/// compile time.
///
/// # Contract
///
/// - [`TASK_ID`](Self::TASK_ID) is unique across every kind registered
///   into one [`TaskRegistry`].
/// - The callback touches only the regions it is handed, and only in the
///   modes its requirements declared.
/// - A kind with `REDOP == Redop::Reduce(op)` writes only through `op`.
///   Its contributions must commute.
/// - Callbacks never block on other tasks.
///
/// # Example
///
/// ```
/// use snap_core::{AccessMode, Redop, RegionRequirement, SnapArray, TaskError, TaskId};
/// use snap_task::{PhysicalRegion, SnapTask, TaskContext, TaskInfo};
///
/// struct Zero {
///     reqs: Vec<RegionRequirement>,
/// }
///
/// impl Zero {
///     fn new(array: &SnapArray) -> Self {
///         Self { reqs: vec![array.requirement(AccessMode::WriteDiscard)] }
///     }
/// }
///
/// impl SnapTask for Zero {
///     const TASK_ID: TaskId = TaskId(900);
///     const REDOP: Redop = Redop::None;
///     const NAME: &'static str = "Zero";
///     type Args = ();
///
///     fn requirements(&self) -> &[RegionRequirement] {
///         &self.reqs
///     }
///
///     fn into_args(self) {}
///
///     fn cpu_implementation(
///         task: &TaskInfo,
///         _args: &(),
///         regions: &mut [PhysicalRegion],
///         _ctx: &TaskContext<'_>,
///     ) -> Result<(), TaskError> {
///         let mut guard = regions[0].full_write_guard(&task.name)?;
///         let len = guard.len();
///         guard.fill_run(0, std::iter::repeat(0.0).take(len));
///         Ok(())
///     }
/// }
/// ```
pub trait SnapTask: Sized + Send + 'static {
    /// Unique task kind id.
    const TASK_ID: TaskId;
    /// Reduction operator the kind writes through.
    const REDOP: Redop;
    /// Task kind name, for diagnostics.
    const NAME: &'static str;
    /// Arguments handed to every point of a launch.
    type Args: Send + Sync + 'static;

    /// Region requirements in declaration order. The callback receives one
    /// region per requirement, in this order.
    fn requirements(&self) -> &[RegionRequirement];

    /// Consume the task value and produce its callback arguments.
    fn into_args(self) -> Self::Args;

    /// The CPU body of the task.
    fn cpu_implementation(
        task: &TaskInfo,
        args: &Self::Args,
        regions: &mut [PhysicalRegion],
        ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError>;

    /// Points this launch expands to. Single by default.
    fn launch_domain(&self) -> LaunchDomain {
        LaunchDomain::Single
    }

    /// Register this kind's CPU variant.
    ///
    /// Must run before the registry is handed to the runtime. Idempotent.
    fn preregister_cpu_variants(registry: &mut TaskRegistry) -> Result<(), RegistryError> {
        registry.register_cpu_variant::<Self>()
    }

    /// Package this task as a launcher.
    fn launcher(self) -> TaskLauncher {
        let requirements = self.requirements().to_vec();
        let domain = self.launch_domain();
        let launcher = TaskLauncher::new(Self::TASK_ID, Self::NAME, Self::REDOP)
            .with_requirements(requirements)
            .with_args(self.into_args());
        match domain {
            LaunchDomain::Single => launcher,
            LaunchDomain::Index(colors) => launcher.over(colors),
        }
    }

    /// Launch this task on `target`.
    ///
    /// Returns immediately; the future resolves once the callback has run
    /// and its writes are visible to later launches.
    fn dispatch(self, target: &dyn LaunchTarget) -> Result<TaskFuture, LaunchError> {
        target.launch(self.launcher())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snap_core::{
        AccessMode, ArrayDef, ArrayId, ArrayShape, Color, Partition, RuntimeInstanceId, SnapArray,
    };
    use std::sync::{Arc, Mutex};

    struct Stamp {
        reqs: Vec<RegionRequirement>,
        colors: Vec<Color>,
        value: f64,
    }

    impl SnapTask for Stamp {
        const TASK_ID: TaskId = TaskId(77);
        const REDOP: Redop = Redop::None;
        const NAME: &'static str = "Stamp";
        type Args = f64;

        fn requirements(&self) -> &[RegionRequirement] {
            &self.reqs
        }

        fn into_args(self) -> f64 {
            self.value
        }

        fn launch_domain(&self) -> LaunchDomain {
            LaunchDomain::Index(self.colors.clone())
        }

        fn cpu_implementation(
            _task: &TaskInfo,
            _args: &f64,
            _regions: &mut [PhysicalRegion],
            _ctx: &TaskContext<'_>,
        ) -> Result<(), TaskError> {
            Ok(())
        }
    }

    struct Capture(Mutex<Option<TaskLauncher>>);

    impl LaunchTarget for Capture {
        fn launch(&self, launcher: TaskLauncher) -> Result<TaskFuture, LaunchError> {
            *self.0.lock().unwrap() = Some(launcher);
            Ok(TaskFuture::ready())
        }
    }

    fn stamp() -> Stamp {
        let shape = ArrayShape::new([4, 1, 1], 1).unwrap();
        let def = ArrayDef::new("mat", shape).with_partition(Partition::blocked(4, 2).unwrap());
        let array = SnapArray::new(ArrayId(0), RuntimeInstanceId::next(), Arc::new(def));
        Stamp {
            reqs: vec![array.projected_requirement(AccessMode::WriteDiscard)],
            colors: array.colors(),
            value: 2.5,
        }
    }

    #[test]
    fn launcher_carries_identity_requirements_and_args() {
        let launcher = stamp().launcher();
        assert_eq!(launcher.task_id(), TaskId(77));
        assert_eq!(launcher.name(), "Stamp");
        assert_eq!(launcher.redop(), Redop::None);
        assert_eq!(launcher.requirements().len(), 1);
        assert_eq!(launcher.args().downcast_ref::<f64>(), Some(&2.5));
        assert_eq!(
            launcher.domain(),
            &LaunchDomain::Index(vec![Color(0), Color(1)])
        );
    }

    #[test]
    fn dispatch_hands_launcher_to_target() {
        let target = Capture(Mutex::new(None));
        let fut = stamp().dispatch(&target).unwrap();
        assert!(fut.is_ready());
        let seen = target.0.lock().unwrap().take().unwrap();
        assert_eq!(seen.points().len(), 2);
    }

    #[test]
    fn preregistration_is_idempotent() {
        let mut reg = TaskRegistry::new();
        Stamp::preregister_cpu_variants(&mut reg).unwrap();
        Stamp::preregister_cpu_variants(&mut reg).unwrap();
        assert_eq!(reg.task_ids().collect::<Vec<_>>(), vec![TaskId(77)]);
    }
}
