//! Benchmark parameter types.

use std::fmt;

use segmerge_core::CostKind;

/// Parameters for a segmentation benchmark run.
#[derive(Clone, Copy, Debug)]
pub struct MergeBenchParams {
    /// Image side length in pixels.
    pub side: usize,
    /// Cost function driving the merge order.
    pub cost: CostKind,
}

impl fmt::Display for MergeBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{},{}", self.side, self.side, self.cost)
    }
}

/// Parameters for an edge heap benchmark run.
#[derive(Clone, Copy, Debug)]
pub struct HeapBenchParams {
    /// Number of edges pushed before draining.
    pub edge_count: usize,
}

impl fmt::Display for HeapBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={}", self.edge_count)
    }
}
