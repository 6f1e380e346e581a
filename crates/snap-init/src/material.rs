//! Material-id field initializer.

use snap_core::{AccessMode, Redop, RegionRequirement, SnapArray, TaskError, TaskId};
use snap_task::{LaunchDomain, PhysicalRegion, SnapTask, TaskContext, TaskInfo};

use crate::problem::{ProblemError, Snap};
use crate::INIT_MATERIAL_TASK_ID;

/// Writes the material id of every zone from the problem's material
/// layout.
///
/// Launched over the field's partition, one point per piece, each with
/// write-discard access to its own piece. The pieces are disjoint, so the
/// points run concurrently and every zone is written exactly once.
pub struct InitMaterial {
    snap: Snap,
    requirements: Vec<RegionRequirement>,
    domain: LaunchDomain,
}

impl InitMaterial {
    /// Bind the initializer to `mat`, which must have the problem's
    /// material shape.
    pub fn new(snap: &Snap, mat: &SnapArray) -> Result<Self, ProblemError> {
        snap.check_shape(mat, snap.material_shape()?)?;
        Ok(Self {
            snap: snap.clone(),
            requirements: vec![mat.projected_requirement(AccessMode::WriteDiscard)],
            domain: LaunchDomain::Index(mat.colors()),
        })
    }
}

impl SnapTask for InitMaterial {
    const TASK_ID: TaskId = INIT_MATERIAL_TASK_ID;
    const REDOP: Redop = Redop::None;
    const NAME: &'static str = "InitMaterial";
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
        if region.components() != 1 {
            return Err(TaskError::ShapeMismatch {
                array: region.array().name().to_string(),
                reason: format!("expected 1 component, found {}", region.components()),
            });
        }
        let ids: Vec<f64> = region
            .zones()
            .map(|(_, _, coords)| snap.material_at(coords))
            .collect();
        let mut guard = region.full_write_guard(&task.name)?;
        guard.fill_run(0, ids);
        Ok(())
    }
}
