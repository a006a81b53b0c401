//! Configuration values consumed by [`crate::Segmentator`].

use std::fmt;

use crate::{
    error::{Result, SegmentationError},
    raster::{Connectivity, Point},
};

/// Stopping thresholds for the greedy merge loop.
///
/// Every limit follows the same convention: a negative value disables it.
///
/// # Examples
/// ```
/// use segmerge_core::MergeLimits;
///
/// let limits = MergeLimits::unlimited().with_max_segments(4);
/// assert_eq!(limits.segment_floor(), Some(4));
/// assert_eq!(limits.edge_cost_limit(), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MergeLimits {
    /// Stop when the cheapest remaining edge costs more than this.
    pub max_edge_cost: f64,
    /// Stop when merging the cheapest edge would push the summed region
    /// error past this.
    pub max_aggregate_error: f64,
    /// Stop once this many live segments remain.
    pub max_segments: i64,
}

impl MergeLimits {
    /// Limits that never stop the loop early.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_edge_cost: -1.0,
            max_aggregate_error: -1.0,
            max_segments: -1,
        }
    }

    /// Replaces the edge cost ceiling.
    #[must_use]
    pub const fn with_max_edge_cost(mut self, cost: f64) -> Self {
        self.max_edge_cost = cost;
        self
    }

    /// Replaces the aggregate error ceiling.
    #[must_use]
    pub const fn with_max_aggregate_error(mut self, error: f64) -> Self {
        self.max_aggregate_error = error;
        self
    }

    /// Replaces the segment floor.
    #[must_use]
    pub const fn with_max_segments(mut self, segments: i64) -> Self {
        self.max_segments = segments;
        self
    }

    /// Active edge cost ceiling.
    #[must_use]
    pub fn edge_cost_limit(&self) -> Option<f64> {
        (self.max_edge_cost >= 0.0).then_some(self.max_edge_cost)
    }

    /// Active aggregate error ceiling.
    #[must_use]
    pub fn aggregate_error_limit(&self) -> Option<f64> {
        (self.max_aggregate_error >= 0.0).then_some(self.max_aggregate_error)
    }

    /// Active segment floor.
    #[must_use]
    pub fn segment_floor(&self) -> Option<usize> {
        usize::try_from(self.max_segments).ok()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_edge_cost.is_nan() {
            return Err(SegmentationError::InvalidConfig {
                reason: "max_edge_cost must not be NaN".into(),
            });
        }
        if self.max_aggregate_error.is_nan() {
            return Err(SegmentationError::InvalidConfig {
                reason: "max_aggregate_error must not be NaN".into(),
            });
        }
        Ok(())
    }
}

impl Default for MergeLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// How locked points restrict merging.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum LockingPolicy {
    /// The region owning a locked point never merges.
    #[default]
    BlockRegion,
    /// Only the edges crossing a locked point's pixel border never merge.
    BlockEdge,
}

/// When the label map is rewritten to follow merges.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum MappingMode {
    /// Rewrite the absorbed region's pixels after every merge.
    Eager,
    /// Leave the map stale until [`crate::Segmentator::update_mapping`].
    #[default]
    Deferred,
}

/// Why the merge loop returned.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum StopReason {
    /// No mergeable edge remains.
    Exhausted,
    /// The live segment count reached the floor.
    SegmentLimit,
    /// The cheapest edge exceeds the cost ceiling.
    CostLimit,
    /// Merging the cheapest edge would exceed the error ceiling.
    ErrorLimit,
}

impl StopReason {
    /// Stable label used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::SegmentLimit => "segment-limit",
            Self::CostLimit => "cost-limit",
            Self::ErrorLimit => "error-limit",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete configuration of one segmentation run.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentationConfig {
    /// Stopping thresholds used by [`crate::Segmentator::merge_to_limit`].
    pub limits: MergeLimits,
    /// Interpretation of `locked_points`.
    pub locking_policy: LockingPolicy,
    /// Pixels whose region or border must survive.
    pub locked_points: Vec<Point>,
    /// Pixel adjacency used to derive region edges.
    pub connectivity: Connectivity,
    /// Label map refresh strategy.
    pub mapping_mode: MappingMode,
}

impl SegmentationConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        self.limits.validate()
    }
}
