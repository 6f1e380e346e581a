//! Region requirements: the `(array, selector, access)` declarations a task
//! makes about the data it will touch.

use std::fmt;

use crate::access::AccessMode;
use crate::array::{SnapArray, ZoneRange};
use crate::id::Color;

/// Which zones of an array a requirement covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionSelector {
    /// Every zone of the array.
    All,
    /// One subregion of the array's partition.
    Subregion(Color),
    /// The subregion matching the launch point's color. Only meaningful
    /// in index launches; a single launch rejects it.
    Projected,
}

impl fmt::Display for RegionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Subregion(c) => write!(f, "subregion {c}"),
            Self::Projected => write!(f, "projected"),
        }
    }
}

/// A declared access to an array.
///
/// Requirements are the only way a task reaches array data. The runtime
/// derives task ordering from them, so a requirement must cover every
/// zone the task touches and, for good parallelism, nothing more.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionRequirement {
    array: SnapArray,
    selector: RegionSelector,
    access: AccessMode,
}

impl RegionRequirement {
    /// Declare `access` on the zones of `array` picked by `selector`.
    pub fn new(array: SnapArray, selector: RegionSelector, access: AccessMode) -> Self {
        Self {
            array,
            selector,
            access,
        }
    }

    /// The array this requirement targets.
    pub fn array(&self) -> &SnapArray {
        &self.array
    }

    /// The zone selector.
    pub fn selector(&self) -> RegionSelector {
        self.selector
    }

    /// The requested permission.
    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Resolve the selector to a concrete zone range.
    ///
    /// `point` is the launch point's color for index launches. Returns
    /// `None` when the color is outside the partition, or when a projected
    /// selector is resolved without a point.
    pub fn resolve(&self, point: Option<Color>) -> Option<ZoneRange> {
        let partition = self.array.partition();
        match self.selector {
            RegionSelector::All => Some(ZoneRange::new(0, self.array.shape().zone_count())),
            RegionSelector::Subregion(color) => partition.subregion(color),
            RegionSelector::Projected => point.and_then(|c| partition.subregion(c)),
        }
    }
}

impl fmt::Display for RegionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' ({}) {}",
            self.array.name(),
            self.selector,
            self.access
        )
    }
}
