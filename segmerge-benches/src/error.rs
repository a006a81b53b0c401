//! Benchmark setup error type.
//!
//! Lets setup functions propagate failures with `?` instead of `.expect()`.

use crate::source::SyntheticError;
use segmerge_core::{HeapError, RasterError, SegmentationError};

/// Errors that may occur during benchmark setup.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// Synthetic image generation failed.
    #[error("synthetic image generation failed: {0}")]
    Synthetic(#[from] SyntheticError),
    /// The generated pixel buffer was rejected.
    #[error("pixel buffer rejected: {0}")]
    Raster(#[from] RasterError),
    /// Building or driving the segmentator failed.
    #[error("segmentation failed: {0}")]
    Segmentation(#[from] SegmentationError),
    /// The edge heap rejected an operation.
    #[error("edge heap failed: {0}")]
    Heap(#[from] HeapError),
}
