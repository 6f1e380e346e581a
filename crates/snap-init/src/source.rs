//! Fixed external source initializer.

use std::iter;

use snap_core::{AccessMode, Redop, RegionRequirement, SnapArray, TaskError, TaskId};
use snap_task::{LaunchDomain, PhysicalRegion, SnapTask, TaskContext, TaskInfo};

use crate::problem::{ProblemError, Snap};
use crate::INIT_SOURCE_TASK_ID;

/// Writes the fixed source intensity of every (zone, group, angle).
///
/// Zones inside the source box get the configured strength in every
/// component; all others get zero. Launched like
/// [`InitMaterial`](crate::InitMaterial): one write-discard point per
/// piece.
pub struct InitSource {
    snap: Snap,
    requirements: Vec<RegionRequirement>,
    domain: LaunchDomain,
}

impl InitSource {
    /// Bind the initializer to `qi`, which must have the problem's source
    /// shape (`num_groups * num_angles` components per zone).
    pub fn new(snap: &Snap, qi: &SnapArray) -> Result<Self, ProblemError> {
        snap.check_shape(qi, snap.source_shape()?)?;
        Ok(Self {
            snap: snap.clone(),
            requirements: vec![qi.projected_requirement(AccessMode::WriteDiscard)],
            domain: LaunchDomain::Index(qi.colors()),
        })
    }
}

impl SnapTask for InitSource {
    const TASK_ID: TaskId = INIT_SOURCE_TASK_ID;
    const REDOP: Redop = Redop::None;
    const NAME: &'static str = "InitSource";
    type Args = Snap;

    fn requirements(&self) -> &[RegionRequirement] {
        &self.requirements
    }

    fn launch_domain(&self) -> LaunchDomain {
        self.domain.clone()
    }

    fn into_args(self) -> Snap {
        self.snap
    }

    fn cpu_implementation(
        task: &TaskInfo,
        snap: &Snap,
        regions: &mut [PhysicalRegion],
        _ctx: &TaskContext<'_>,
    ) -> Result<(), TaskError> {
        if regions.len() != 1 {
            return Err(TaskError::RegionCount {
                expected: 1,
                actual: regions.len(),
            });
        }
        let region = &mut regions[0];
        let components = region.components();
        if components != snap.source_components() {
            return Err(TaskError::ShapeMismatch {
                array: region.array().name().to_string(),
                reason: format!(
                    "expected {} components ({} groups x {} angles), found {components}",
                    snap.source_components(),
                    snap.num_groups(),
                    snap.num_angles()
                ),
            });
        }
        let zone_count = region.zone_range().len();
        let values: Vec<f64> = region
            .zones()
            .flat_map(|(_, _, coords)| iter::repeat(snap.source_at(coords)).take(components))
            .collect();
        let mut guard = region.full_write_guard(&task.name)?;
        guard.fill_run(0, values);
        tracing::trace!(
            point = ?task.point,
            zones = zone_count,
            "source piece initialized"
        );
        Ok(())
    }
}
