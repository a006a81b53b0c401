//! Builder for [`Segmentator`] runs.

use crate::{
    cost::{CostFunction, CostKind},
    error::Result,
    label_map::LabelMap,
    raster::{Channel, Connectivity, ImageBuffer, Point},
};

use super::{
    Segmentator,
    config::{LockingPolicy, MappingMode, MergeLimits, SegmentationConfig},
};

/// Configures and constructs [`Segmentator`] instances.
///
/// # Examples
/// ```
/// use segmerge_core::{ImageBuffer, LabelMap, SegmentatorBuilder, WardCost};
///
/// let image = ImageBuffer::new(4, 1, 1, vec![0_u8, 1, 2, 3])?;
/// let labels = LabelMap::from_image(&image);
/// let mut segmentator = SegmentatorBuilder::new()
///     .with_max_segments(2)
///     .build(&image, labels, WardCost)?;
/// segmentator.merge_to_limit()?;
/// assert_eq!(segmentator.live_segments(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct SegmentatorBuilder {
    config: SegmentationConfig,
}

impl SegmentatorBuilder {
    /// Creates a builder with unlimited merging, region locking, 4-connectivity
    /// and deferred label mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration value.
    #[must_use]
    pub fn from_config(config: SegmentationConfig) -> Self {
        Self { config }
    }

    /// Replaces every stopping threshold.
    #[must_use]
    pub fn with_limits(mut self, limits: MergeLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Sets the edge cost ceiling; negative disables it.
    ///
    /// # Examples
    /// ```
    /// use segmerge_core::SegmentatorBuilder;
    ///
    /// let builder = SegmentatorBuilder::new().with_max_edge_cost(12.5);
    /// assert_eq!(builder.config().limits.edge_cost_limit(), Some(12.5));
    /// ```
    #[must_use]
    pub fn with_max_edge_cost(mut self, cost: f64) -> Self {
        self.config.limits.max_edge_cost = cost;
        self
    }

    /// Sets the aggregate error ceiling; negative disables it.
    #[must_use]
    pub fn with_max_aggregate_error(mut self, error: f64) -> Self {
        self.config.limits.max_aggregate_error = error;
        self
    }

    /// Sets the segment floor; negative disables it.
    #[must_use]
    pub fn with_max_segments(mut self, segments: i64) -> Self {
        self.config.limits.max_segments = segments;
        self
    }

    /// Chooses how locked points restrict merging.
    #[must_use]
    pub fn with_locking_policy(mut self, policy: LockingPolicy) -> Self {
        self.config.locking_policy = policy;
        self
    }

    /// Adds locked points.
    #[must_use]
    pub fn with_locked_points(mut self, points: impl IntoIterator<Item = Point>) -> Self {
        self.config.locked_points.extend(points);
        self
    }

    /// Chooses the pixel adjacency used to derive region edges.
    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.config.connectivity = connectivity;
        self
    }

    /// Chooses when the label map follows merges.
    #[must_use]
    pub fn with_mapping_mode(mut self, mode: MappingMode) -> Self {
        self.config.mapping_mode = mode;
        self
    }

    /// The configuration assembled so far.
    #[must_use]
    #[rustfmt::skip]
    pub fn config(&self) -> &SegmentationConfig { &self.config }

    /// Validates the configuration and builds the region graph and edge heap
    /// for `image`, whose initial segmentation is `labels`.
    ///
    /// # Errors
    /// Returns [`crate::SegmentationError::InvalidConfig`] for NaN limits,
    /// [`crate::SegmentationError::Raster`] when `image` and `labels` differ in
    /// shape, and [`crate::SegmentationError::NonFiniteCost`] when `cost`
    /// rates an initial edge as NaN or infinite.
    pub fn build<C: Channel, F: CostFunction>(
        self,
        image: &ImageBuffer<C>,
        labels: LabelMap,
        cost: F,
    ) -> Result<Segmentator<F>> {
        self.config.validate()?;
        Segmentator::construct(self.config, image, labels, cost)
    }

    /// Like [`Self::build`], selecting a built-in cost function by kind.
    ///
    /// # Errors
    /// See [`Self::build`].
    pub fn build_with_kind<C: Channel>(
        self,
        image: &ImageBuffer<C>,
        labels: LabelMap,
        kind: CostKind,
    ) -> Result<Segmentator<Box<dyn CostFunction>>> {
        self.build(image, labels, kind.build())
    }
}
