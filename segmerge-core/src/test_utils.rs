//! Shared test utilities for `segmerge-core`.

use proptest::test_runner::Config as ProptestConfig;
use segmerge_test_support::profile::ProptestRunProfile;

use crate::{
    cost::CostFunction,
    graph::RegionStats,
    label_map::LabelMap,
    raster::ImageBuffer,
};

/// Builds a proptest configuration from the shared run profile.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// Cost equal to the distance between the two regions' first-channel means.
///
/// On a strip whose pixel values equal their column index this reduces to the
/// index distance between regions.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct MeanGap;

impl CostFunction for MeanGap {
    fn name(&self) -> &str {
        "mean-gap"
    }

    fn error(&self, _region: &RegionStats) -> f64 {
        0.0
    }

    fn distance(&self, left: &RegionStats, right: &RegionStats) -> f64 {
        (left.mean(0) - right.mean(0)).abs()
    }
}

/// A single-channel `width` x 1 strip whose pixel values are `0, 1, 2, ...`.
pub(crate) fn index_strip(width: usize) -> (ImageBuffer<f32>, LabelMap) {
    let values: Vec<f32> = (0..width).map(|x| x as f32).collect();
    let image = ImageBuffer::new(width, 1, 1, values).expect("strip shape is valid");
    let labels = LabelMap::from_image(&image);
    (image, labels)
}

/// A single-channel grid from row-major values.
pub(crate) fn grid(width: usize, height: usize, values: &[f32]) -> ImageBuffer<f32> {
    ImageBuffer::new(width, height, 1, values.to_vec()).expect("grid shape is valid")
}
