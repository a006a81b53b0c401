//! Segmerge core library.
//!
//! Greedy region-merging image segmentation: a label raster is turned into
//! a region adjacency graph whose edges sit in a bounded-degree min-heap,
//! and the cheapest adjacent pair is merged until a stopping threshold is
//! met.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod cost;
mod error;
mod graph;
mod heap;
mod label_map;
mod raster;
mod record;
mod segmentator;

#[cfg(test)]
mod test_utils;

pub use crate::{
    cost::{CostFunction, CostKind, GaussianCost, UnknownCostKind, WardCost},
    error::{
        GraphError, GraphErrorCode, HeapError, HeapErrorCode, RasterError, RasterErrorCode,
        Result, SegmentationError, SegmentationErrorCode,
    },
    graph::{Edge, GraphInvariantViolation, Rect, Region, RegionGraph, RegionId, RegionStats},
    heap::{EdgeHeap, EdgeId, HEAP_ARITY, HeapEntry, HeapInvariantViolation},
    label_map::{LabelMap, Rgb, SegmentStats},
    raster::{Channel, Connectivity, ImageBuffer, Point},
    record::SegmentRecord,
    segmentator::{
        LockingPolicy, MappingMode, MergeLimits, MergeRecord, MergeSummary, SegmentationConfig,
        Segmentator, SegmentatorBuilder, StopReason,
    },
};
