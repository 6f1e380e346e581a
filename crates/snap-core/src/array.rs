//! Array shapes, partitions, and the [`SnapArray`] handle.
//!
//! An array is a field over the mesh: `extents[0] * extents[1] * extents[2]`
//! zones with `components` values per zone, stored zone-major. Zones are
//! linearized with x fastest and z slowest. A [`Partition`] splits the
//! linear zone range into disjoint, jointly exhaustive subregions that
//! tasks name by [`Color`].

use std::fmt;
use std::sync::Arc;

use crate::access::AccessMode;
use crate::error::ArrayError;
use crate::id::{ArrayId, Color, RuntimeInstanceId};
use crate::region::{RegionRequirement, RegionSelector};

/// Half-open range `[start, end)` of linear zone indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ZoneRange {
    /// First zone in the range.
    pub start: usize,
    /// One past the last zone in the range.
    pub end: usize,
}

impl ZoneRange {
    /// Construct a range. An inverted range is normalized to empty.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Number of zones in the range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range holds no zones.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `zone` lies inside the range.
    pub fn contains(&self, zone: usize) -> bool {
        zone >= self.start && zone < self.end
    }

    /// Whether the two ranges share at least one zone.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The shared zones, or `None` when the ranges are disjoint.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if self.overlaps(other) {
            Some(Self::new(
                self.start.max(other.start),
                self.end.min(other.end),
            ))
        } else {
            None
        }
    }

    /// Iterate the zone indices in ascending order.
    pub fn iter(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for ZoneRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Extents of the zone grid plus the number of values stored per zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArrayShape {
    extents: [usize; 3],
    components: usize,
}

impl ArrayShape {
    /// Create a shape. Every extent and the component count must be at
    /// least 1; use an extent of 1 for unused dimensions.
    pub fn new(extents: [usize; 3], components: usize) -> Result<Self, ArrayError> {
        if extents.contains(&0) {
            return Err(ArrayError::EmptyShape { extents, components });
        }
        if components == 0 {
            return Err(ArrayError::EmptyShape { extents, components });
        }
        let zones = extents
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .and_then(|z| z.checked_mul(components));
        if zones.is_none() {
            return Err(ArrayError::ShapeOverflow { extents, components });
        }
        Ok(Self {
            extents,
            components,
        })
    }

    /// Zone-grid extents `[nx, ny, nz]`.
    pub fn extents(&self) -> [usize; 3] {
        self.extents
    }

    /// Values stored per zone.
    pub fn components(&self) -> usize {
        self.components
    }

    /// Total number of zones.
    pub fn zone_count(&self) -> usize {
        self.extents[0] * self.extents[1] * self.extents[2]
    }

    /// Total number of stored values (`zone_count * components`).
    pub fn len(&self) -> usize {
        self.zone_count() * self.components
    }

    /// Shapes are never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid coordinates `[x, y, z]` of a linear zone index.
    pub fn zone_coords(&self, zone: usize) -> [usize; 3] {
        let [nx, ny, _] = self.extents;
        [zone % nx, (zone / nx) % ny, zone / (nx * ny)]
    }

    /// Linear zone index of grid coordinates.
    pub fn zone_index(&self, coords: [usize; 3]) -> usize {
        let [nx, ny, _] = self.extents;
        coords[0] + nx * (coords[1] + ny * coords[2])
    }

    /// Element range in storage covered by a zone range.
    pub fn element_range(&self, zones: ZoneRange) -> std::ops::Range<usize> {
        zones.start * self.components..zones.end * self.components
    }
}

/// Disjoint, jointly exhaustive split of an array's zones.
///
/// Subregion `Color(i)` is `ranges[i]`. Ranges are contiguous in the
/// linearized zone order, ascending, and together cover `[0, zone_count)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    zone_count: usize,
    ranges: Vec<ZoneRange>,
}

impl Partition {
    /// A single subregion covering every zone.
    pub fn whole(zone_count: usize) -> Self {
        Self {
            zone_count,
            ranges: vec![ZoneRange::new(0, zone_count)],
        }
    }

    /// Split `zone_count` zones into `pieces` near-equal contiguous blocks.
    ///
    /// The first `zone_count % pieces` blocks hold one extra zone.
    pub fn blocked(zone_count: usize, pieces: usize) -> Result<Self, ArrayError> {
        if pieces == 0 || pieces > zone_count {
            return Err(ArrayError::InvalidPartition {
                reason: format!("cannot split {zone_count} zones into {pieces} pieces"),
            });
        }
        let base = zone_count / pieces;
        let extra = zone_count % pieces;
        let mut ranges = Vec::with_capacity(pieces);
        let mut start = 0;
        for i in 0..pieces {
            let len = base + usize::from(i < extra);
            ranges.push(ZoneRange::new(start, start + len));
            start += len;
        }
        Ok(Self { zone_count, ranges })
    }

    /// Build a partition from explicit ranges.
    ///
    /// Ranges must be non-empty and, once sorted, tile `[0, zone_count)`
    /// with no gaps or overlaps. Colors follow the ascending order.
    pub fn from_ranges(zone_count: usize, mut ranges: Vec<ZoneRange>) -> Result<Self, ArrayError> {
        if ranges.is_empty() {
            return Err(ArrayError::InvalidPartition {
                reason: "partition has no subregions".to_string(),
            });
        }
        ranges.sort_by_key(|r| r.start);
        let mut expected = 0;
        for r in &ranges {
            if r.is_empty() {
                return Err(ArrayError::InvalidPartition {
                    reason: format!("subregion {r} is empty"),
                });
            }
            if r.start < expected {
                return Err(ArrayError::InvalidPartition {
                    reason: format!("subregion {r} overlaps its predecessor"),
                });
            }
            if r.start > expected {
                return Err(ArrayError::InvalidPartition {
                    reason: format!("zones [{expected}, {}) are not covered", r.start),
                });
            }
            expected = r.end;
        }
        if expected != zone_count {
            return Err(ArrayError::InvalidPartition {
                reason: format!("partition covers {expected} of {zone_count} zones"),
            });
        }
        Ok(Self { zone_count, ranges })
    }

    /// Number of zones the partition covers.
    pub fn zone_count(&self) -> usize {
        self.zone_count
    }

    /// Number of subregions.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Partitions always hold at least one subregion.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Zone range of a subregion.
    pub fn subregion(&self, color: Color) -> Option<ZoneRange> {
        self.ranges.get(color.0 as usize).copied()
    }

    /// All subregion colors in ascending order.
    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        (0..self.ranges.len()).map(|i| Color(i as u32))
    }

    /// Subregion ranges in color order.
    pub fn ranges(&self) -> &[ZoneRange] {
        &self.ranges
    }

    /// The color of the subregion holding `zone`.
    pub fn color_of(&self, zone: usize) -> Option<Color> {
        let idx = self.ranges.partition_point(|r| r.end <= zone);
        match self.ranges.get(idx) {
            Some(r) if r.contains(zone) => Some(Color(idx as u32)),
            _ => None,
        }
    }
}

/// Definition of an array to be created by a runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayDef {
    /// Human-readable name for diagnostics and logging.
    pub name: String,
    /// Zone grid and per-zone component count.
    pub shape: ArrayShape,
    /// Subregion split used by subregion and projected requirements.
    pub partition: Partition,
    /// Value every element holds before any task writes it.
    pub fill: f64,
}

impl ArrayDef {
    /// An array with a single-piece partition, filled with zero.
    pub fn new(name: impl Into<String>, shape: ArrayShape) -> Self {
        Self {
            name: name.into(),
            partition: Partition::whole(shape.zone_count()),
            shape,
            fill: 0.0,
        }
    }

    /// Replace the partition.
    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    /// Replace the pre-initialization fill value.
    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill = fill;
        self
    }

    /// Check that the partition covers exactly this shape's zones.
    pub fn validate(&self) -> Result<(), ArrayError> {
        if self.partition.zone_count() != self.shape.zone_count() {
            return Err(ArrayError::PartitionMismatch {
                partition_zones: self.partition.zone_count(),
                shape_zones: self.shape.zone_count(),
            });
        }
        Ok(())
    }
}

/// Logical handle to an array owned by a runtime.
///
/// Cheap to clone. Carries the metadata tasks need to declare region
/// requirements; the data itself stays in the runtime and is only
/// reachable through the physical regions handed to task callbacks.
#[derive(Clone, Debug)]
pub struct SnapArray {
    id: ArrayId,
    instance: RuntimeInstanceId,
    def: Arc<ArrayDef>,
}

impl SnapArray {
    /// Construct a handle. Called by the runtime when an array is
    /// created; application code obtains handles from `create_array`.
    pub fn new(id: ArrayId, instance: RuntimeInstanceId, def: Arc<ArrayDef>) -> Self {
        Self { id, instance, def }
    }

    /// Array id within its runtime.
    pub fn id(&self) -> ArrayId {
        self.id
    }

    /// The runtime instance that owns this array.
    pub fn instance(&self) -> RuntimeInstanceId {
        self.instance
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Zone grid and component count.
    pub fn shape(&self) -> &ArrayShape {
        &self.def.shape
    }

    /// Subregion split.
    pub fn partition(&self) -> &Partition {
        &self.def.partition
    }

    /// Full definition.
    pub fn def(&self) -> &ArrayDef {
        &self.def
    }

    /// Subregion colors, for index launches over this array.
    pub fn colors(&self) -> Vec<Color> {
        self.def.partition.colors().collect()
    }

    /// Requirement on every zone of the array.
    pub fn requirement(&self, access: AccessMode) -> RegionRequirement {
        RegionRequirement::new(self.clone(), RegionSelector::All, access)
    }

    /// Requirement on one subregion of the partition.
    pub fn subregion_requirement(&self, color: Color, access: AccessMode) -> RegionRequirement {
        RegionRequirement::new(self.clone(), RegionSelector::Subregion(color), access)
    }

    /// Requirement bound per point of an index launch: point `c` receives
    /// subregion `c`.
    pub fn projected_requirement(&self, access: AccessMode) -> RegionRequirement {
        RegionRequirement::new(self.clone(), RegionSelector::Projected, access)
    }
}

impl PartialEq for SnapArray {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.instance == other.instance
    }
}

impl Eq for SnapArray {}
