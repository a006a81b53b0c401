//! Unit tests for the region graph and its accumulators.

use approx::assert_relative_eq;
use rstest::{fixture, rstest};

use crate::{error::GraphError, heap::EdgeId, raster::Point};

use super::{GraphInvariantViolation, Rect, RegionGraph, RegionId, RegionStats};

fn r(index: usize) -> RegionId {
    RegionId::new(index)
}

/// Four single-pixel regions in a row, valued 0..4, linked 0-1-2-3.
#[fixture]
fn chain() -> RegionGraph {
    let mut graph = RegionGraph::new(4, 1);
    for index in 0..4 {
        graph
            .region_mut(r(index))
            .expect("region exists")
            .update(Point::new(index, 0), &[index as f32])
            .expect("channel count matches");
    }
    for index in 0..3 {
        graph
            .add_edge(r(index), r(index + 1), 1.0)
            .expect("fresh adjacency");
    }
    graph
}

#[rstest]
fn new_regions_are_live_and_empty() {
    let graph = RegionGraph::new(3, 2);
    assert_eq!(graph.live_count(), 3);
    for id in graph.ids() {
        let region = graph.region(id).expect("region exists");
        assert!(region.exists());
        assert_eq!(region.area(), 0);
        assert_eq!(region.stats().channels(), 2);
        assert_eq!(region.absorbed_by(), None);
        assert!(region.bounds().is_none());
    }
}

#[rstest]
fn update_accumulates_area_and_bounds() {
    let mut graph = RegionGraph::new(1, 2);
    let region = graph.region_mut(r(0)).expect("region exists");
    region.update(Point::new(3, 1), &[1_u8, 2]).expect("two channels");
    region.update(Point::new(1, 4), &[3_u8, 4]).expect("two channels");
    assert_eq!(region.area(), 2);
    assert_eq!(region.stats().sums(), &[4.0, 6.0]);
    assert_eq!(
        region.bounds(),
        Some(Rect {
            min: Point::new(1, 1),
            max: Point::new(3, 4)
        })
    );
}

#[rstest]
fn update_rejects_wrong_channel_count() {
    let mut graph = RegionGraph::new(1, 3);
    let err = graph
        .region_mut(r(0))
        .expect("region exists")
        .update(Point::new(0, 0), &[1.0_f64])
        .expect_err("one channel supplied for three");
    assert_eq!(
        err,
        GraphError::ChannelMismatch {
            expected: 3,
            actual: 1
        }
    );
}

#[rstest]
fn links_are_sorted_by_neighbour(mut chain: RegionGraph) {
    chain.add_edge(r(3), r(1), 2.0).expect("fresh adjacency");
    chain.add_edge(r(0), r(1), 0.0).expect_err("duplicate adjacency");
    let neighbours: Vec<RegionId> = chain
        .region(r(1))
        .expect("region exists")
        .links()
        .map(|(neighbour, _)| neighbour)
        .collect();
    assert_eq!(neighbours, vec![r(0), r(2), r(3)]);
    chain.check_invariants().expect("graph stays consistent");
}

#[rstest]
fn ordered_insert_rejects_self_and_duplicates(mut chain: RegionGraph) {
    assert_eq!(
        chain.ordered_insert(r(2), r(2), EdgeId::new(99)),
        Err(GraphError::SelfReference { region: r(2) })
    );
    assert_eq!(
        chain.ordered_insert(r(1), r(2), EdgeId::new(99)),
        Err(GraphError::DuplicateLink {
            region: r(1),
            neighbour: r(2)
        })
    );
}

#[rstest]
fn absorb_folds_statistics_and_marks_dead(mut chain: RegionGraph) {
    chain.absorb(r(1), r(2)).expect("both regions are live");
    let survivor = chain.region(r(1)).expect("region exists");
    assert_eq!(survivor.area(), 2);
    assert_relative_eq!(survivor.stats().mean(0), 1.5);
    assert_eq!(
        survivor.bounds(),
        Some(Rect {
            min: Point::new(1, 0),
            max: Point::new(2, 0)
        })
    );

    let absorbed = chain.region(r(2)).expect("region exists");
    assert!(!absorbed.exists());
    assert_eq!(absorbed.absorbed_by(), Some(r(1)));
    assert_eq!(chain.live_count(), 3);
    assert_eq!(chain.live_area(), 4);
}

#[rstest]
fn absorb_rejects_self_and_dead_regions(mut chain: RegionGraph) {
    assert_eq!(
        chain.absorb(r(0), r(0)),
        Err(GraphError::SelfReference { region: r(0) })
    );
    chain.absorb(r(0), r(1)).expect("first absorb succeeds");
    assert_eq!(
        chain.absorb(r(2), r(1)),
        Err(GraphError::DeadRegion {
            region: r(1),
            absorbed_by: Some(r(0))
        })
    );
    assert!(matches!(
        chain.absorb(r(1), r(2)),
        Err(GraphError::DeadRegion { .. })
    ));
    assert!(matches!(
        chain.absorb(r(0), r(9)),
        Err(GraphError::UnknownRegion { .. })
    ));
}

#[rstest]
fn final_absorbent_follows_chain(mut chain: RegionGraph) {
    assert_eq!(chain.final_absorbent(r(3)), None);

    chain.absorb(r(2), r(3)).expect("live regions");
    chain.absorb(r(1), r(2)).expect("live regions");
    chain.absorb(r(0), r(1)).expect("live regions");

    for index in 1..4 {
        let first = chain.final_absorbent(r(index));
        assert_eq!(first, Some(r(0)));
        assert_eq!(chain.final_absorbent(r(index)), first);
    }
    assert_eq!(chain.final_absorbent(r(0)), None);
    assert_eq!(chain.resolve(r(3)), r(0));
    assert_eq!(chain.resolve(r(0)), r(0));
}

#[rstest]
fn unlink_retires_edge(mut chain: RegionGraph) {
    let edge = chain.edge_between(r(1), r(2)).expect("adjacent");
    assert_eq!(chain.unlink(r(2), r(1)), Ok(edge));
    assert!(chain.edge_between(r(1), r(2)).is_none());
    assert!(chain.edge_between(r(2), r(1)).is_none());
    assert!(matches!(
        chain.edge(edge),
        Err(GraphError::UnknownEdge { .. })
    ));
    assert_eq!(
        chain.unlink(r(1), r(2)),
        Err(GraphError::MissingLink {
            region: r(1),
            neighbour: r(2)
        })
    );
}

#[rstest]
fn nearest_neighbour_prefers_cheapest_then_oldest(mut chain: RegionGraph) {
    let left = chain.edge_between(r(1), r(0)).expect("adjacent");
    let right = chain.edge_between(r(1), r(2)).expect("adjacent");
    assert_eq!(chain.nearest_neighbour(r(1)), Some(r(0)));

    chain.set_cost(left, 5.0).expect("edge is active");
    assert_eq!(chain.nearest_neighbour(r(1)), Some(r(2)));

    chain.set_cost(right, 5.0).expect("edge is active");
    assert_eq!(chain.nearest_neighbour(r(1)), Some(r(0)));

    let isolated = RegionGraph::new(1, 1);
    assert_eq!(isolated.nearest_neighbour(r(0)), None);
}

#[rstest]
fn invariant_check_flags_dead_links(mut chain: RegionGraph) {
    chain.absorb(r(0), r(1)).expect("live regions");
    let violation = chain
        .check_invariants()
        .expect_err("absorbed region kept its links");
    assert!(matches!(
        violation,
        GraphInvariantViolation::DeadWithLinks { .. } | GraphInvariantViolation::DeadNeighbour { .. }
    ));
}

#[rstest]
fn stats_covariance_matches_direct_computation() {
    let pixels: [[f64; 2]; 4] = [[1.0, 2.0], [3.0, 2.0], [5.0, 6.0], [7.0, 10.0]];
    let stats = RegionStats::from_pixels(2, pixels.iter().map(|pixel| &pixel[..]))
        .expect("two channels per pixel");
    let covariance = stats.covariance();

    assert_relative_eq!(stats.mean(0), 4.0);
    assert_relative_eq!(stats.mean(1), 5.0);
    assert_relative_eq!(covariance[(0, 0)], 5.0);
    assert_relative_eq!(covariance[(1, 1)], 11.0);
    assert_relative_eq!(covariance[(0, 1)], 7.0);
    assert_relative_eq!(covariance[(1, 0)], 7.0);
    assert_relative_eq!(stats.squared_error(), 4.0 * (5.0 + 11.0));
}

#[rstest]
fn merged_stats_equal_absorbed_stats() {
    let left = RegionStats::from_pixels(1, [&[1.0_f32][..], &[3.0][..]]).expect("one channel");
    let right = RegionStats::from_pixels(1, [&[8.0_f32][..]]).expect("one channel");
    let merged = left.merged(&right);
    let mut absorbed = left.clone();
    absorbed.absorb(&right).expect("channel counts match");
    assert_eq!(merged, absorbed);
    assert_eq!(merged.area(), 3);
    assert_relative_eq!(merged.mean(0), 4.0);
}

#[rstest]
fn retire_empty_skips_populated_regions(chain: RegionGraph) {
    let mut graph = RegionGraph::new(3, 1);
    graph
        .region_mut(r(1))
        .expect("region exists")
        .update(Point::new(0, 0), &[4_u8])
        .expect("one channel");
    assert_eq!(graph.retire_empty(), 2);
    assert_eq!(graph.live_ids().collect::<Vec<_>>(), vec![r(1)]);
    assert_eq!(graph.final_absorbent(r(0)), None);
    graph.check_invariants().expect("graph stays consistent");

    let mut chain = chain;
    assert_eq!(chain.retire_empty(), 0);
    assert_eq!(chain.live_count(), 4);
}
