//! Translation of locked pixels into region and edge blocks.

use tracing::warn;

use crate::{
    error::Result,
    graph::{Edge, RegionGraph},
    label_map::LabelMap,
    raster::{Point, offset_point},
};

use super::config::{LockingPolicy, SegmentationConfig};

/// Applies `config.locked_points` to `graph` and returns the points that do
/// not address a pixel of `labels`.
pub(super) fn apply(
    graph: &mut RegionGraph,
    labels: &LabelMap,
    config: &SegmentationConfig,
) -> Result<Vec<Point>> {
    let mut rejected = Vec::new();
    for &point in &config.locked_points {
        let Ok(region) = labels.at(point) else {
            warn!(
                %point,
                width = labels.width(),
                height = labels.height(),
                "locked point lies outside the raster; ignoring it"
            );
            rejected.push(point);
            continue;
        };
        match config.locking_policy {
            LockingPolicy::BlockRegion => graph.lock_region(region)?,
            LockingPolicy::BlockEdge => {
                for &offset in config.connectivity.offsets() {
                    let Some(neighbour) =
                        offset_point(point, offset, labels.width(), labels.height())
                    else {
                        continue;
                    };
                    let other = labels.at(neighbour)?;
                    if let Some(edge) = graph.edge_between(region, other) {
                        graph.block_edge(edge)?;
                    }
                }
            }
        }
    }
    Ok(rejected)
}

/// Whether `edge` may be merged under the active locks.
pub(super) fn mergeable(graph: &RegionGraph, edge: &Edge) -> bool {
    let locked = |id| graph.region(id).is_ok_and(|region| region.is_locked());
    !edge.is_blocked() && !locked(edge.left()) && !locked(edge.right())
}
