//! Physical regions: the materialized view of one region requirement.
//!
//! The runtime builds a [`PhysicalRegion`] for each requirement right
//! before a callback runs and takes it back afterwards. The region only
//! holds the declared zones and only permits the declared operation, so a
//! callback cannot reach data it did not ask for.

use snap_core::{AccessMode, SnapArray, TaskError, ZoneRange};

use crate::guard::FullWriteGuard;
use crate::reduction::ReductionOp;

/// Locally-addressable buffer for one region requirement.
///
/// Elements are stored zone-major: element `z * components + c` holds
/// component `c` of the `z`-th zone of [`zone_range`](Self::zone_range).
#[derive(Debug)]
pub struct PhysicalRegion {
    array: SnapArray,
    access: AccessMode,
    zones: ZoneRange,
    reduction: Option<ReductionOp>,
    data: Vec<f64>,
}

impl PhysicalRegion {
    /// Build a region over `zones` of `array`.
    ///
    /// Typically called by the runtime. `data` must hold exactly
    /// `zones.len() * components` elements, and reduce-mode access needs the
    /// matching operator.
    pub fn new(
        array: SnapArray,
        access: AccessMode,
        zones: ZoneRange,
        reduction: Option<ReductionOp>,
        data: Vec<f64>,
    ) -> Result<Self, TaskError> {
        let expected = zones.len() * array.shape().components();
        if data.len() != expected {
            return Err(TaskError::ShapeMismatch {
                array: array.name().to_string(),
                reason: format!("buffer holds {} elements, zones need {expected}", data.len()),
            });
        }
        if zones.end > array.shape().zone_count() {
            return Err(TaskError::ShapeMismatch {
                array: array.name().to_string(),
                reason: format!(
                    "zones {zones} exceed array of {} zones",
                    array.shape().zone_count()
                ),
            });
        }
        if let AccessMode::Reduce(id) = access {
            match reduction {
                Some(op) if op.id() == id => {}
                _ => {
                    return Err(TaskError::ShapeMismatch {
                        array: array.name().to_string(),
                        reason: format!("reduce({id}) region built without its operator"),
                    })
                }
            }
        }
        Ok(Self {
            array,
            access,
            zones,
            reduction,
            data,
        })
    }

    /// The array behind this region.
    pub fn array(&self) -> &SnapArray {
        &self.array
    }

    /// The permission the region was mapped with.
    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Global zone indices covered by the region.
    pub fn zone_range(&self) -> ZoneRange {
        self.zones
    }

    /// Values per zone.
    pub fn components(&self) -> usize {
        self.array.shape().components()
    }

    /// Number of elements in the region.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the region holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate `(local zone, global zone, [x, y, z])` for every zone.
    pub fn zones(&self) -> impl Iterator<Item = (usize, usize, [usize; 3])> + '_ {
        let shape = *self.array.shape();
        self.zones
            .iter()
            .enumerate()
            .map(move |(local, zone)| (local, zone, shape.zone_coords(zone)))
    }

    /// Local element index of `component` in the `local`-th zone.
    pub fn offset(&self, local_zone: usize, component: usize) -> usize {
        local_zone * self.components() + component
    }

    fn denied(&self, operation: &'static str) -> TaskError {
        TaskError::AccessDenied {
            array: self.array.name().to_string(),
            access: self.access,
            operation,
        }
    }

    /// Existing contents. Only for read-only and read-write regions.
    pub fn read(&self) -> Result<&[f64], TaskError> {
        if self.access.reads_existing() {
            Ok(&self.data)
        } else {
            Err(self.denied("read"))
        }
    }

    /// Mutable contents. Only for read-write and write-discard regions.
    pub fn write(&mut self) -> Result<&mut [f64], TaskError> {
        match self.access {
            AccessMode::ReadWrite | AccessMode::WriteDiscard => Ok(&mut self.data),
            _ => Err(self.denied("write")),
        }
    }

    /// A coverage-tracking writer over the whole region.
    pub fn full_write_guard(&mut self, task: &str) -> Result<FullWriteGuard<'_>, TaskError> {
        match self.access {
            AccessMode::ReadWrite | AccessMode::WriteDiscard => {
                Ok(FullWriteGuard::new(&mut self.data, task, self.array.name()))
            }
            _ => Err(self.denied("write")),
        }
    }

    /// Fold `value` into the element at `index`. Only for reduce regions.
    pub fn reduce(&mut self, index: usize, value: f64) -> Result<(), TaskError> {
        let op = match (self.access, self.reduction) {
            (AccessMode::Reduce(_), Some(op)) => op,
            _ => return Err(self.denied("reduce")),
        };
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(index)
            .ok_or_else(|| TaskError::IndexOutOfRange {
                array: self.array.name().to_string(),
                index,
                len,
            })?;
        *slot = op.apply(*slot, value);
        Ok(())
    }

    /// Release the buffer back to the runtime.
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }
}
