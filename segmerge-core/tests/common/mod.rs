//! Fixtures shared by the integration test binaries.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use segmerge_core::{CostFunction, ImageBuffer, LabelMap, RegionStats};

/// Cost equal to the gap between first-channel means.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanGap;

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

/// A `width` x 1 strip whose pixel values equal their column, one segment
/// per pixel.
#[must_use]
pub fn index_strip(width: u8) -> (ImageBuffer<u8>, LabelMap) {
    let image = ImageBuffer::new(usize::from(width), 1, 1, (0..width).collect())
        .expect("strip shape is valid");
    let labels = LabelMap::from_image(&image);
    (image, labels)
}

/// `count` flat vertical stripes, each `stripe_width` pixels wide.
#[must_use]
pub fn stripes(count: usize, stripe_width: usize, height: usize) -> ImageBuffer<u8> {
    let width = count * stripe_width;
    let data = (0..width * height)
        .map(|index| {
            let stripe = (index % width) / stripe_width;
            u8::try_from(stripe * 20).expect("stripe value fits in u8")
        })
        .collect();
    ImageBuffer::new(width, height, 1, data).expect("stripe shape is valid")
}
