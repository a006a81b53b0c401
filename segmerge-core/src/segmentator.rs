//! Greedy merge orchestration.
//!
//! A [`Segmentator`] owns the region graph, the edge heap and the label map
//! of one segmentation run. Construction turns an initial label raster into
//! regions and edges; [`Segmentator::merge_to_limit`] then contracts the
//! cheapest mergeable edge until a stopping threshold is met.
//!
//! The heap holds exactly the edges that may be merged. Edges blocked by the
//! locking policy, or touching a locked region, stay linked in the graph so
//! adjacency remains exact, but are never queued.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use crate::{
    cost::CostFunction,
    error::{GraphError, RasterError, Result, SegmentationError},
    graph::{RegionGraph, RegionId, RegionStats},
    heap::{EdgeHeap, EdgeId},
    label_map::LabelMap,
    raster::{Channel, Connectivity, ImageBuffer, Point, offset_point},
};

mod builder;
mod config;
mod locking;

pub use self::{
    builder::SegmentatorBuilder,
    config::{LockingPolicy, MappingMode, MergeLimits, SegmentationConfig, StopReason},
};

/// One performed merge.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergeRecord {
    /// Region that kept its identity.
    pub survivor: RegionId,
    /// Region folded into `survivor`.
    pub absorbed: RegionId,
    /// Cost of the edge that joined them.
    pub cost: f64,
}

/// Outcome of one call to the merge loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MergeSummary {
    /// Merges performed by this call.
    pub merges: usize,
    /// Threshold that ended the loop.
    pub stop: StopReason,
    /// Live segments after the loop.
    pub live_segments: usize,
}

/// Costs and error of a merge, evaluated before any state changes.
struct Contraction {
    merged_error: f64,
    costs: BTreeMap<RegionId, f64>,
}

/// Owner of one greedy region-merging run.
///
/// # Examples
/// ```
/// use segmerge_core::{ImageBuffer, LabelMap, SegmentatorBuilder, StopReason, WardCost};
///
/// let image = ImageBuffer::new(3, 1, 1, vec![10_u8, 11, 200])?;
/// let labels = LabelMap::from_image(&image);
/// let mut segmentator = SegmentatorBuilder::new()
///     .with_max_edge_cost(5.0)
///     .build(&image, labels, WardCost)?;
/// let summary = segmentator.merge_to_limit()?;
/// assert_eq!(summary.merges, 1);
/// assert_eq!(summary.stop, StopReason::CostLimit);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct Segmentator<F> {
    config: SegmentationConfig,
    cost: F,
    graph: RegionGraph,
    heap: EdgeHeap,
    labels: LabelMap,
    errors: Vec<f64>,
    aggregate_error: f64,
    history: Vec<MergeRecord>,
    rejected_locks: Vec<Point>,
    mapping_stale: bool,
}

impl<F: CostFunction> Segmentator<F> {
    #[instrument(
        name = "segmerge.build",
        err,
        skip_all,
        fields(
            width = image.width(),
            height = image.height(),
            channels = image.channels(),
            cost = cost.name(),
        ),
    )]
    pub(crate) fn construct<C: Channel>(
        config: SegmentationConfig,
        image: &ImageBuffer<C>,
        labels: LabelMap,
        cost: F,
    ) -> Result<Self> {
        if (labels.width(), labels.height()) != (image.width(), image.height()) {
            return Err(RasterError::ShapeMismatch {
                expected_width: image.width(),
                expected_height: image.height(),
                actual_width: labels.width(),
                actual_height: labels.height(),
            }
            .into());
        }

        let mut graph = RegionGraph::new(labels.id_bound(), image.channels());
        for (index, (&id, pixel)) in labels.labels().iter().zip(image.pixels()).enumerate() {
            let point = Point::new(index % image.width(), index / image.width());
            graph.region_mut(id)?.update(point, pixel)?;
        }
        graph.retire_empty();
        link_adjacent(&mut graph, &labels, config.connectivity)?;
        seed_costs(&mut graph, &cost)?;
        let rejected_locks = locking::apply(&mut graph, &labels, &config)?;

        let mut heap = EdgeHeap::with_capacity(graph.edge_slots());
        for (id, edge) in graph.active_edges() {
            if locking::mergeable(&graph, edge) {
                heap.push(id, edge.cost(), edge.sequence())?;
            }
        }

        let errors: Vec<f64> = graph
            .ids()
            .map(|id| match graph.live_region(id) {
                Ok(region) => cost.error(region.stats()),
                Err(_) => 0.0,
            })
            .collect();
        let aggregate_error = errors.iter().sum();

        info!(
            regions = graph.live_count(),
            edges = graph.edge_slots(),
            queued = heap.len(),
            rejected_locks = rejected_locks.len(),
            "segmentator ready"
        );
        Ok(Self {
            config,
            cost,
            graph,
            heap,
            labels,
            errors,
            aggregate_error,
            history: Vec::new(),
            rejected_locks,
            mapping_stale: false,
        })
    }

    /// Runs the merge loop against the configured limits.
    ///
    /// # Errors
    /// Returns [`SegmentationError::NonFiniteCost`] when the cost function
    /// rates a re-costed edge as NaN or infinite; any other error indicates a
    /// corrupted graph or heap.
    pub fn merge_to_limit(&mut self) -> Result<MergeSummary> {
        let limits = self.config.limits;
        self.merge_with_limits(limits)
    }

    /// Runs the merge loop against explicit limits, leaving the configured
    /// ones untouched.
    ///
    /// # Errors
    /// Returns [`SegmentationError::InvalidConfig`] for NaN limits and
    /// otherwise the errors of [`Self::merge_to_limit`].
    #[instrument(
        name = "segmerge.merge_to_limit",
        err,
        skip(self),
        fields(live = self.graph.live_count(), queued = self.heap.len()),
    )]
    pub fn merge_with_limits(&mut self, limits: MergeLimits) -> Result<MergeSummary> {
        limits.validate()?;
        let mut merges = 0;
        let stop = loop {
            if let Some(reason) = self.check_stop(&limits)? {
                break reason;
            }
            let Some(top) = self.heap.top() else {
                break StopReason::Exhausted;
            };
            let edge = *self.graph.edge(top.edge())?;
            if !locking::mergeable(&self.graph, &edge) {
                debug!(edge = %top.edge(), "discarding locked edge");
                self.heap.remove(top.edge())?;
                continue;
            }
            let (survivor, absorbed) = self.orient(edge.left(), edge.right())?;
            self.contract(survivor, absorbed, top.cost())?;
            merges += 1;
        };
        info!(
            merges,
            stop = %stop,
            live_segments = self.graph.live_count(),
            aggregate_error = self.aggregate_error,
            "merge loop finished"
        );
        Ok(MergeSummary {
            merges,
            stop,
            live_segments: self.graph.live_count(),
        })
    }

    /// Merges `absorbed` into `survivor` outside the heap order.
    ///
    /// # Errors
    /// Returns [`SegmentationError::NotAdjacent`] when the regions share no
    /// edge, [`SegmentationError::Locked`] when the locking policy forbids
    /// the merge, and [`SegmentationError::Graph`] when either region is
    /// unknown, dead, or both handles are equal.
    pub fn merge(&mut self, survivor: RegionId, absorbed: RegionId) -> Result<MergeRecord> {
        if survivor == absorbed {
            return Err(GraphError::SelfReference { region: survivor }.into());
        }
        self.graph.live_region(survivor)?;
        self.graph.live_region(absorbed)?;
        let joining = self.graph.edge_between(survivor, absorbed).ok_or(
            SegmentationError::NotAdjacent {
                left: survivor,
                right: absorbed,
            },
        )?;
        let edge = *self.graph.edge(joining)?;
        if !locking::mergeable(&self.graph, &edge) {
            return Err(SegmentationError::Locked {
                left: survivor,
                right: absorbed,
            });
        }
        self.contract(survivor, absorbed, edge.cost())
    }

    /// Reports which threshold, if any, stops the loop before the next merge.
    ///
    /// The segment floor is checked first, so a run that reached it reports
    /// [`StopReason::SegmentLimit`] even when no mergeable edge remains.
    ///
    /// # Errors
    /// Fails only when the heap names an edge the graph no longer knows.
    pub fn check_stop(&self, limits: &MergeLimits) -> Result<Option<StopReason>> {
        if limits
            .segment_floor()
            .is_some_and(|floor| self.graph.live_count() <= floor)
        {
            return Ok(Some(StopReason::SegmentLimit));
        }
        let Some(top) = self.heap.top() else {
            return Ok(Some(StopReason::Exhausted));
        };
        if limits.edge_cost_limit().is_some_and(|max| top.cost() > max) {
            return Ok(Some(StopReason::CostLimit));
        }
        if let Some(max) = limits.aggregate_error_limit() {
            let edge = self.graph.edge(top.edge())?;
            if self.projected_error(edge.left(), edge.right())? > max {
                return Ok(Some(StopReason::ErrorLimit));
            }
        }
        Ok(None)
    }

    /// Rewrites the label map so every pixel names its live region.
    ///
    /// Returns the number of pixels whose identifier changed.
    #[instrument(name = "segmerge.update_mapping", skip(self), fields(stale = self.mapping_stale))]
    pub fn update_mapping(&mut self) -> usize {
        let graph = &self.graph;
        let mut memo: Vec<Option<RegionId>> = vec![None; graph.len()];
        let mut rewritten = 0;
        self.labels.remap(|id| {
            let target = match memo.get(id.index()).copied().flatten() {
                Some(target) => target,
                None => {
                    let target = graph.resolve(id);
                    if let Some(slot) = memo.get_mut(id.index()) {
                        *slot = Some(target);
                    }
                    target
                }
            };
            if target != id {
                rewritten += 1;
            }
            target
        });
        self.mapping_stale = false;
        debug!(rewritten, "label map refreshed");
        rewritten
    }

    /// Refreshes the label map and hands it over.
    #[must_use]
    pub fn into_label_map(mut self) -> LabelMap {
        self.update_mapping();
        self.labels
    }

    /// Run configuration.
    #[must_use]
    #[rustfmt::skip]
    pub fn config(&self) -> &SegmentationConfig { &self.config }

    /// Cost function in use.
    #[must_use]
    #[rustfmt::skip]
    pub fn cost(&self) -> &F { &self.cost }

    /// Region graph.
    #[must_use]
    #[rustfmt::skip]
    pub fn graph(&self) -> &RegionGraph { &self.graph }

    /// Queue of mergeable edges.
    #[must_use]
    #[rustfmt::skip]
    pub fn heap(&self) -> &EdgeHeap { &self.heap }

    /// Label map. In [`MappingMode::Deferred`] it may name absorbed regions
    /// until [`Self::update_mapping`] runs; see [`Self::is_mapping_stale`].
    #[must_use]
    #[rustfmt::skip]
    pub fn label_map(&self) -> &LabelMap { &self.labels }

    /// Whether merges happened since the label map was last refreshed.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_mapping_stale(&self) -> bool { self.mapping_stale }

    /// Number of live regions.
    #[must_use]
    pub fn live_segments(&self) -> usize {
        self.graph.live_count()
    }

    /// Sum of the cost function's error over live regions.
    #[must_use]
    #[rustfmt::skip]
    pub fn aggregate_error(&self) -> f64 { self.aggregate_error }

    /// Every merge performed so far, oldest first.
    #[must_use]
    #[rustfmt::skip]
    pub fn history(&self) -> &[MergeRecord] { &self.history }

    /// Locked points that addressed no pixel.
    #[must_use]
    #[rustfmt::skip]
    pub fn rejected_locks(&self) -> &[Point] { &self.rejected_locks }

    /// Larger area absorbs smaller; the lower identifier wins ties.
    fn orient(&self, left: RegionId, right: RegionId) -> Result<(RegionId, RegionId)> {
        let left_area = self.graph.live_region(left)?.area();
        let right_area = self.graph.live_region(right)?.area();
        let left_wins = left_area > right_area || (left_area == right_area && left < right);
        Ok(if left_wins { (left, right) } else { (right, left) })
    }

    fn projected_error(&self, left: RegionId, right: RegionId) -> Result<f64> {
        let left_stats = self.graph.live_region(left)?.stats();
        let right_stats = self.graph.live_region(right)?.stats();
        let merged = self.cost.error(&left_stats.merged(right_stats));
        Ok(self.aggregate_error - self.region_error(left) - self.region_error(right) + merged)
    }

    fn region_error(&self, id: RegionId) -> f64 {
        self.errors.get(id.index()).copied().unwrap_or(0.0)
    }

    /// Rates every edge the survivor will own once `absorbed` is folded in,
    /// without touching the graph or the heap.
    fn plan(&self, survivor: RegionId, absorbed: RegionId) -> Result<Contraction> {
        let keep = self.graph.live_region(survivor)?;
        let gone = self.graph.live_region(absorbed)?;
        let merged = keep.stats().merged(gone.stats());
        let mut costs = BTreeMap::new();
        for (neighbour, _) in keep.links().chain(gone.links()) {
            if neighbour == survivor || neighbour == absorbed || costs.contains_key(&neighbour) {
                continue;
            }
            let other = self.graph.region(neighbour)?.stats();
            let value = checked_distance(&self.cost, &merged, other, survivor, neighbour)?;
            costs.insert(neighbour, value);
        }
        Ok(Contraction {
            merged_error: self.cost.error(&merged),
            costs,
        })
    }

    /// Folds `absorbed` into `survivor`, rewiring `absorbed`'s adjacency onto
    /// the survivor and re-costing every edge of the survivor.
    ///
    /// Cost evaluation happens up front, so a rejected cost leaves the run
    /// untouched; later failures only arise from a corrupted graph or heap.
    fn contract(
        &mut self,
        survivor: RegionId,
        absorbed: RegionId,
        cost: f64,
    ) -> Result<MergeRecord> {
        let plan = self.plan(survivor, absorbed)?;

        let joining = self.graph.unlink(survivor, absorbed)?;
        self.dequeue(joining)?;

        let links: Vec<(RegionId, EdgeId)> = self.graph.region(absorbed)?.links().collect();
        for (neighbour, edge) in links {
            let blocked = self.graph.edge(edge)?.is_blocked();
            self.dequeue(edge)?;
            self.graph.unlink(absorbed, neighbour)?;
            let kept = match self.graph.edge_between(survivor, neighbour) {
                Some(existing) => existing,
                None => self.graph.add_edge(survivor, neighbour, 0.0)?,
            };
            if blocked {
                self.graph.block_edge(kept)?;
                self.dequeue(kept)?;
            }
        }

        let absorbed_bounds = self.graph.region(absorbed)?.bounds();
        self.graph.absorb(survivor, absorbed)?;
        self.recost(survivor, &plan.costs)?;

        self.aggregate_error +=
            plan.merged_error - self.region_error(survivor) - self.region_error(absorbed);
        if let Some(slot) = self.errors.get_mut(survivor.index()) {
            *slot = plan.merged_error;
        }
        if let Some(slot) = self.errors.get_mut(absorbed.index()) {
            *slot = 0.0;
        }

        match (self.config.mapping_mode, absorbed_bounds) {
            (MappingMode::Eager, Some(bounds)) => {
                self.labels.relabel_within(bounds, absorbed, survivor);
            }
            (MappingMode::Eager, None) => {}
            (MappingMode::Deferred, _) => self.mapping_stale = true,
        }

        let record = MergeRecord {
            survivor,
            absorbed,
            cost,
        };
        self.history.push(record);
        debug!(
            %survivor,
            %absorbed,
            cost,
            live = self.graph.live_count(),
            "merged regions"
        );
        Ok(record)
    }

    /// Stores the planned cost on every edge of `region`, queueing new
    /// mergeable edges and re-sifting queued ones.
    fn recost(&mut self, region: RegionId, costs: &BTreeMap<RegionId, f64>) -> Result<()> {
        for (&neighbour, &value) in costs {
            let edge = self.graph.edge_between(region, neighbour).ok_or(
                GraphError::MissingLink {
                    region,
                    neighbour,
                },
            )?;
            self.graph.set_cost(edge, value)?;
            let record = *self.graph.edge(edge)?;
            if !locking::mergeable(&self.graph, &record) {
                continue;
            }
            if self.heap.contains(edge) {
                self.heap.update(edge, value)?;
            } else {
                self.heap.push(edge, value, record.sequence())?;
            }
        }
        Ok(())
    }

    fn dequeue(&mut self, edge: EdgeId) -> Result<()> {
        if self.heap.contains(edge) {
            self.heap.remove(edge)?;
        }
        Ok(())
    }
}

/// Creates one edge per adjacent pair of distinct labels, in scan order.
fn link_adjacent(
    graph: &mut RegionGraph,
    labels: &LabelMap,
    connectivity: Connectivity,
) -> Result<()> {
    let (width, height) = (labels.width(), labels.height());
    for (index, &id) in labels.labels().iter().enumerate() {
        let point = Point::new(index % width, index / width);
        for &offset in connectivity.forward_offsets() {
            let Some(neighbour) = offset_point(point, offset, width, height) else {
                continue;
            };
            let other = labels.at(neighbour)?;
            if other != id && graph.edge_between(id, other).is_none() {
                graph.add_edge(id, other, 0.0)?;
            }
        }
    }
    Ok(())
}

fn pair_cost<F: CostFunction>(
    graph: &RegionGraph,
    cost: &F,
    left: RegionId,
    right: RegionId,
) -> Result<f64> {
    checked_distance(
        cost,
        graph.region(left)?.stats(),
        graph.region(right)?.stats(),
        left,
        right,
    )
}

fn checked_distance<F: CostFunction>(
    cost: &F,
    left_stats: &RegionStats,
    right_stats: &RegionStats,
    left: RegionId,
    right: RegionId,
) -> Result<f64> {
    let value = cost.distance(left_stats, right_stats);
    if !value.is_finite() {
        return Err(SegmentationError::NonFiniteCost {
            cost: cost.name().to_owned(),
            left,
            right,
        });
    }
    Ok(value)
}

/// Rates every initial edge. The graph is only read here, so the work fans
/// out over the rayon pool when that feature is enabled.
fn seed_costs<F: CostFunction>(graph: &mut RegionGraph, cost: &F) -> Result<()> {
    let pairs: Vec<(EdgeId, RegionId, RegionId)> = graph
        .active_edges()
        .map(|(id, edge)| (id, edge.left(), edge.right()))
        .collect();
    let costs = evaluate_pairs(graph, cost, &pairs)?;
    for (&(edge, _, _), value) in pairs.iter().zip(costs) {
        graph.set_cost(edge, value)?;
    }
    Ok(())
}

#[cfg(feature = "rayon")]
fn evaluate_pairs<F: CostFunction>(
    graph: &RegionGraph,
    cost: &F,
    pairs: &[(EdgeId, RegionId, RegionId)],
) -> Result<Vec<f64>> {
    use rayon::prelude::*;

    pairs
        .par_iter()
        .map(|&(_, left, right)| pair_cost(graph, cost, left, right))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn evaluate_pairs<F: CostFunction>(
    graph: &RegionGraph,
    cost: &F,
    pairs: &[(EdgeId, RegionId, RegionId)],
) -> Result<Vec<f64>> {
    pairs
        .iter()
        .map(|&(_, left, right)| pair_cost(graph, cost, left, right))
        .collect()
}
