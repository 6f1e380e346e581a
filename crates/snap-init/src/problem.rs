//! Problem configuration, geometry layouts, and the validated [`Snap`]
//! context the initializers are built from.
//!
//! The mesh is a regular `nx * ny * nz` grid of zones, linearized with x
//! fastest. Two layout policies place features on it:
//!
//! - the central box spans `[n/4, max(n/4 + 1, 3n/4))` on each axis;
//! - the corner box spans `[0, max(1, n/2))` on each axis.
//!
//! Both boxes are non-empty for every extent `n >= 1`.

use std::error::Error;
use std::fmt;
use std::ops::Range;

use snap_core::{ArrayDef, ArrayError, ArrayShape, Partition, SnapArray};

/// Value every field holds before its initializer runs.
pub const UNSET: f64 = f64::NAN;

/// Material id outside any feature box.
pub const BACKGROUND_MATERIAL: f64 = 1.0;

/// Material id inside the feature box.
pub const FEATURE_MATERIAL: f64 = 2.0;

// ── Layouts ────────────────────────────────────────────────────────

/// Geometry → material assignment policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialLayout {
    /// Material 1 everywhere.
    Homogeneous,
    /// Material 2 inside the central box, 1 elsewhere.
    Center,
    /// Material 2 inside the low corner box, 1 elsewhere.
    Corner,
}

/// Where the fixed external source is non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceLayout {
    /// Every zone.
    Everywhere,
    /// The central box.
    Center,
    /// The low corner box.
    Corner,
}

/// Axis-aligned box of zones, half-open on each axis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneBox {
    axes: [Range<usize>; 3],
}

impl ZoneBox {
    /// The whole mesh.
    pub fn everywhere(extents: [usize; 3]) -> Self {
        Self {
            axes: extents.map(|n| 0..n),
        }
    }

    /// The central box of a mesh.
    pub fn center(extents: [usize; 3]) -> Self {
        Self {
            axes: extents.map(|n| {
                let lo = n / 4;
                // floor(3n/4) without overflowing for huge n.
                let hi = n - lo - usize::from(n % 4 != 0);
                lo..(lo + 1).max(hi)
            }),
        }
    }

    /// The low corner box of a mesh.
    pub fn corner(extents: [usize; 3]) -> Self {
        Self {
            axes: extents.map(|n| 0..(n / 2).max(1)),
        }
    }

    /// Whether the zone at `coords` lies inside.
    pub fn contains(&self, coords: [usize; 3]) -> bool {
        self.axes
            .iter()
            .zip(coords)
            .all(|(range, c)| range.contains(&c))
    }

    /// Per-axis ranges.
    pub fn axes(&self) -> &[Range<usize>; 3] {
        &self.axes
    }

    /// Number of zones inside.
    pub fn zone_count(&self) -> usize {
        self.axes.iter().map(|r| r.len()).product()
    }
}

// ── SnapConfig ─────────────────────────────────────────────────────

/// Problem setup consumed by [`Snap::new`].
#[derive(Clone, Debug, PartialEq)]
pub struct SnapConfig {
    /// Zones along x, y, z. Each must be at least 1.
    pub extents: [usize; 3],
    /// Energy groups. Default: 2.
    pub num_groups: usize,
    /// Discrete angles. Default: 4.
    pub num_angles: usize,
    /// Default: [`MaterialLayout::Center`].
    pub material_layout: MaterialLayout,
    /// Default: [`SourceLayout::Center`].
    pub source_layout: SourceLayout,
    /// Intensity inside the source box. Must be finite. Default: 1.0.
    pub source_strength: f64,
    /// Subregions per field; each gets its own initializer point.
    /// Default: 4.
    pub pieces: usize,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            extents: [8, 8, 8],
            num_groups: 2,
            num_angles: 4,
            material_layout: MaterialLayout::Center,
            source_layout: SourceLayout::Center,
            source_strength: 1.0,
            pieces: 4,
        }
    }
}

impl SnapConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ProblemError> {
        for (axis, &n) in self.extents.iter().enumerate() {
            if n == 0 {
                return Err(ProblemError::EmptyExtent { axis });
            }
        }
        if self.num_groups == 0 {
            return Err(ProblemError::NoGroups);
        }
        if self.num_angles == 0 {
            return Err(ProblemError::NoAngles);
        }
        if !self.source_strength.is_finite() {
            return Err(ProblemError::NonFiniteStrength {
                value: self.source_strength,
            });
        }
        let components = self
            .num_groups
            .checked_mul(self.num_angles)
            .ok_or(ProblemError::TooManyComponents {
                num_groups: self.num_groups,
                num_angles: self.num_angles,
            })?;
        let zones = ArrayShape::new(self.extents, components)?.zone_count();
        if self.pieces == 0 || self.pieces > zones {
            return Err(ProblemError::InvalidPieces {
                pieces: self.pieces,
                zones,
            });
        }
        Ok(())
    }
}

// ── ProblemError ───────────────────────────────────────────────────

/// Errors in the problem setup or in arrays handed to the initializers.
#[derive(Clone, Debug, PartialEq)]
pub enum ProblemError {
    /// A mesh extent is zero.
    EmptyExtent {
        /// 0 = x, 1 = y, 2 = z.
        axis: usize,
    },
    /// `num_groups` is zero.
    NoGroups,
    /// `num_angles` is zero.
    NoAngles,
    /// `source_strength` is NaN or infinite.
    NonFiniteStrength {
        /// The configured value.
        value: f64,
    },
    /// `pieces` is zero or exceeds the zone count.
    InvalidPieces {
        /// The configured value.
        pieces: usize,
        /// Zones in the mesh.
        zones: usize,
    },
    /// `num_groups * num_angles` does not fit in `usize`.
    TooManyComponents {
        /// The configured group count.
        num_groups: usize,
        /// The configured angle count.
        num_angles: usize,
    },
    /// An array's shape does not match the problem.
    ShapeMismatch {
        /// The offending array.
        array: String,
        /// Shape the problem needs, as `[nx, ny, nz] x components`.
        expected: String,
        /// Shape the array has.
        actual: String,
    },
    /// Building an array definition failed.
    Array(ArrayError),
}

impl fmt::Display for ProblemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyExtent { axis } => {
                let name = ["x", "y", "z"].get(*axis).copied().unwrap_or("?");
                write!(f, "mesh extent along {name} must be at least 1")
            }
            Self::NoGroups => write!(f, "num_groups must be at least 1"),
            Self::NoAngles => write!(f, "num_angles must be at least 1"),
            Self::NonFiniteStrength { value } => {
                write!(f, "source_strength {value} is not finite")
            }
            Self::InvalidPieces { pieces, zones } => {
                write!(f, "cannot split {zones} zones into {pieces} pieces")
            }
            Self::TooManyComponents {
                num_groups,
                num_angles,
            } => write!(
                f,
                "{num_groups} groups x {num_angles} angles overflows the component count"
            ),
            Self::ShapeMismatch {
                array,
                expected,
                actual,
            } => write!(f, "array '{array}' is {actual}, problem needs {expected}"),
            Self::Array(e) => write!(f, "array: {e}"),
        }
    }
}

impl Error for ProblemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Array(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArrayError> for ProblemError {
    fn from(e: ArrayError) -> Self {
        Self::Array(e)
    }
}

fn describe(shape: &ArrayShape) -> String {
    format!("{:?} x {}", shape.extents(), shape.components())
}

// ── Snap ───────────────────────────────────────────────────────────

/// Validated problem context.
///
/// Cheap to clone; the initializers carry a copy as their arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Snap {
    config: SnapConfig,
    material_box: Option<ZoneBox>,
    source_box: ZoneBox,
}

impl Snap {
    /// Validate `config` and precompute the layout boxes.
    pub fn new(config: SnapConfig) -> Result<Self, ProblemError> {
        config.validate()?;
        let e = config.extents;
        let material_box = match config.material_layout {
            MaterialLayout::Homogeneous => None,
            MaterialLayout::Center => Some(ZoneBox::center(e)),
            MaterialLayout::Corner => Some(ZoneBox::corner(e)),
        };
        let source_box = match config.source_layout {
            SourceLayout::Everywhere => ZoneBox::everywhere(e),
            SourceLayout::Center => ZoneBox::center(e),
            SourceLayout::Corner => ZoneBox::corner(e),
        };
        Ok(Self {
            config,
            material_box,
            source_box,
        })
    }

    /// The configuration this context was built from.
    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    /// Mesh extents.
    pub fn extents(&self) -> [usize; 3] {
        self.config.extents
    }

    /// Total zones.
    pub fn zone_count(&self) -> usize {
        self.config.extents.iter().product()
    }

    /// Energy groups.
    pub fn num_groups(&self) -> usize {
        self.config.num_groups
    }

    /// Discrete angles.
    pub fn num_angles(&self) -> usize {
        self.config.num_angles
    }

    /// Components per zone of the source field: one per (group, angle),
    /// index `g * num_angles + a`.
    pub fn source_components(&self) -> usize {
        self.config.num_groups * self.config.num_angles
    }

    /// Material id for the zone at `coords`.
    pub fn material_at(&self, coords: [usize; 3]) -> f64 {
        match &self.material_box {
            Some(b) if b.contains(coords) => FEATURE_MATERIAL,
            _ => BACKGROUND_MATERIAL,
        }
    }

    /// Source intensity for the zone at `coords`, the same for every group
    /// and angle.
    pub fn source_at(&self, coords: [usize; 3]) -> f64 {
        if self.source_box.contains(coords) {
            self.config.source_strength
        } else {
            0.0
        }
    }

    /// Zones where the source is non-zero.
    pub fn source_box(&self) -> &ZoneBox {
        &self.source_box
    }

    /// Shape of the material field (one component per zone).
    pub fn material_shape(&self) -> Result<ArrayShape, ProblemError> {
        Ok(ArrayShape::new(self.config.extents, 1)?)
    }

    /// Shape of the source field.
    pub fn source_shape(&self) -> Result<ArrayShape, ProblemError> {
        Ok(ArrayShape::new(self.config.extents, self.source_components())?)
    }

    /// The blocked partition every field uses.
    pub fn partition(&self) -> Result<Partition, ProblemError> {
        Ok(Partition::blocked(self.zone_count(), self.config.pieces)?)
    }

    /// Definition of the material field, pre-filled with [`UNSET`].
    pub fn material_def(&self) -> Result<ArrayDef, ProblemError> {
        Ok(ArrayDef::new("mat", self.material_shape()?)
            .with_partition(self.partition()?)
            .with_fill(UNSET))
    }

    /// Definition of the source field, pre-filled with [`UNSET`].
    pub fn source_def(&self) -> Result<ArrayDef, ProblemError> {
        Ok(ArrayDef::new("qi", self.source_shape()?)
            .with_partition(self.partition()?)
            .with_fill(UNSET))
    }

    /// Check that `array` has `expected`'s extents and components.
    pub(crate) fn check_shape(
        &self,
        array: &SnapArray,
        expected: ArrayShape,
    ) -> Result<(), ProblemError> {
        let actual = *array.shape();
        if actual != expected {
            return Err(ProblemError::ShapeMismatch {
                array: array.name().to_string(),
                expected: describe(&expected),
                actual: describe(&actual),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_config_is_valid() {
        let snap = Snap::new(SnapConfig::default()).unwrap();
        assert_eq!(snap.zone_count(), 512);
        assert_eq!(snap.source_components(), 8);
    }

    #[test]
    fn zero_extent_rejected() {
        let cfg = SnapConfig {
            extents: [4, 0, 4],
            ..SnapConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ProblemError::EmptyExtent { axis: 1 }));
        assert!(cfg.validate().unwrap_err().to_string().contains(" y "));
    }

    #[test]
    fn pieces_must_fit_the_mesh() {
        let cfg = SnapConfig {
            extents: [2, 1, 1],
            pieces: 3,
            ..SnapConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ProblemError::InvalidPieces {
                pieces: 3,
                zones: 2
            })
        );
    }

    #[test]
    fn overflowing_mesh_is_an_error() {
        let cfg = SnapConfig {
            extents: [usize::MAX, 2, 1],
            ..SnapConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ProblemError::Array(ArrayError::ShapeOverflow { .. }))
        ));
        // Zones fit but zones x components does not.
        let cfg = SnapConfig {
            extents: [usize::MAX / 4, 1, 1],
            num_groups: 4,
            num_angles: 2,
            ..SnapConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ProblemError::Array(ArrayError::ShapeOverflow { .. }))
        ));
    }

    #[test]
    fn overflowing_component_count_is_an_error() {
        let err = Snap::new(SnapConfig {
            num_groups: usize::MAX,
            num_angles: 2,
            ..SnapConfig::default()
        })
        .unwrap_err();
        assert_eq!(
            err,
            ProblemError::TooManyComponents {
                num_groups: usize::MAX,
                num_angles: 2
            }
        );
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn center_box_of_huge_axis_stays_in_bounds() {
        let n = usize::MAX - 1;
        let b = ZoneBox::center([n, 1, 1]);
        assert_eq!(b.axes()[0].start, n / 4);
        assert!(b.axes()[0].end <= n);
        assert_eq!(ZoneBox::center([7, 1, 1]).axes()[0], 1..5);
    }

    #[test]
    fn non_finite_strength_rejected() {
        let cfg = SnapConfig {
            source_strength: f64::INFINITY,
            ..SnapConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ProblemError::NonFiniteStrength { .. })
        ));
    }

    #[test]
    fn center_box_of_eight_is_middle_half() {
        let b = ZoneBox::center([8, 8, 8]);
        assert_eq!(b.axes()[0], 2..6);
        assert!(b.contains([2, 5, 3]));
        assert!(!b.contains([1, 5, 3]));
        assert!(!b.contains([2, 6, 3]));
    }

    #[test]
    fn single_zone_mesh_boxes_cover_it() {
        let e = [1, 1, 1];
        assert!(ZoneBox::center(e).contains([0, 0, 0]));
        assert!(ZoneBox::corner(e).contains([0, 0, 0]));
    }

    #[test]
    fn homogeneous_layout_is_all_background() {
        let snap = Snap::new(SnapConfig {
            material_layout: MaterialLayout::Homogeneous,
            ..SnapConfig::default()
        })
        .unwrap();
        assert_eq!(snap.material_at([4, 4, 4]), BACKGROUND_MATERIAL);
        assert_eq!(snap.material_at([0, 0, 0]), BACKGROUND_MATERIAL);
    }

    #[test]
    fn corner_layouts_place_features_low() {
        let snap = Snap::new(SnapConfig {
            material_layout: MaterialLayout::Corner,
            source_layout: SourceLayout::Corner,
            source_strength: 2.5,
            ..SnapConfig::default()
        })
        .unwrap();
        assert_eq!(snap.material_at([0, 0, 0]), FEATURE_MATERIAL);
        assert_eq!(snap.material_at([7, 7, 7]), BACKGROUND_MATERIAL);
        assert_eq!(snap.source_at([3, 3, 3]), 2.5);
        assert_eq!(snap.source_at([4, 0, 0]), 0.0);
        assert_eq!(snap.source_box().zone_count(), 64);
    }

    #[test]
    fn field_defs_share_the_partition() {
        let snap = Snap::new(SnapConfig::default()).unwrap();
        let mat = snap.material_def().unwrap();
        let qi = snap.source_def().unwrap();
        assert_eq!(mat.partition, qi.partition);
        assert_eq!(mat.partition.len(), 4);
        assert_eq!(qi.shape.components(), 8);
        assert!(mat.fill.is_nan());
        assert!(mat.validate().is_ok());
    }

    proptest! {
        #[test]
        fn layout_boxes_are_nonempty_and_in_bounds(
            nx in 1usize..40, ny in 1usize..40, nz in 1usize..40,
        ) {
            let e = [nx, ny, nz];
            for b in [ZoneBox::center(e), ZoneBox::corner(e), ZoneBox::everywhere(e)] {
                prop_assert!(b.zone_count() >= 1);
                for (range, n) in b.axes().iter().zip(e) {
                    prop_assert!(range.end <= n);
                }
            }
        }
    }
}
