//! End-to-end segmentation scenarios driven through the public API.

mod common;

use std::collections::BTreeSet;

use approx::assert_relative_eq;
use rstest::rstest;
use segmerge_core::{
    CostKind, ImageBuffer, LabelMap, LockingPolicy, Point, RegionId, SegmentatorBuilder,
    StopReason, WardCost,
};

use crate::common::{MeanGap, index_strip, stripes};

fn ids(map: &LabelMap) -> Vec<usize> {
    map.labels().iter().map(|id| id.index()).collect()
}

#[rstest]
fn four_pixel_strip_pairs_left_to_right() {
    let (image, labels) = index_strip(4);
    let mut segmentator = SegmentatorBuilder::new()
        .with_max_segments(2)
        .build(&image, labels, MeanGap)
        .expect("strip builds");
    let summary = segmentator.merge_to_limit().expect("merge loop succeeds");
    assert_eq!(summary.stop, StopReason::SegmentLimit);
    assert_eq!(summary.live_segments, 2);
    assert_eq!(ids(&segmentator.into_label_map()), vec![0, 0, 2, 2]);
}

#[rstest]
#[case::unlimited(-1, 2)]
#[case::one(1, 2)]
#[case::two(2, 2)]
#[case::three(3, 3)]
fn block_region_never_merges_segment_zero(#[case] max_segments: i64, #[case] live: usize) {
    let (image, labels) = index_strip(4);
    let mut segmentator = SegmentatorBuilder::new()
        .with_max_segments(max_segments)
        .with_locking_policy(LockingPolicy::BlockRegion)
        .with_locked_points([Point::new(0, 0)])
        .build(&image, labels, MeanGap)
        .expect("strip builds");
    segmentator.merge_to_limit().expect("merge loop succeeds");
    assert_eq!(segmentator.live_segments(), live);

    let map = segmentator.into_label_map();
    assert_eq!(map.get(0, 0), Some(RegionId::new(0)));
    assert!(map.labels()[1..].iter().all(|&id| id != RegionId::new(0)));
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(6)]
fn flat_blobs_collapse_to_one_segment(#[case] blobs: usize) {
    let image = stripes(blobs, 3, 4);
    let labels = LabelMap::from_image(&image);
    assert_eq!(labels.number_of_segments(), blobs);

    let mut segmentator = SegmentatorBuilder::new()
        .with_max_segments(1)
        .build(&image, labels, WardCost)
        .expect("stripes build");
    let summary = segmentator.merge_to_limit().expect("merge loop succeeds");
    assert_eq!(summary.merges, blobs - 1);
    assert_eq!(segmentator.live_segments(), 1);

    let records = segmentator.segment_records().expect("records are consistent");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].area, (blobs * 3 * 4) as u64);
    assert!(records[0].neighbours.is_empty());
}

#[rstest]
fn gaussian_cost_separates_colour_groups() {
    #[rustfmt::skip]
    let data: Vec<u8> = vec![
        10, 10, 10,   11, 10, 10,   10, 11, 10,
        100, 100, 100, 101, 100, 100, 100, 101, 100,
    ];
    let image = ImageBuffer::new(6, 1, 3, data).expect("valid shape");
    let labels = LabelMap::identity(6, 1);
    let kind: CostKind = "gaussian".parse().expect("known cost");
    let mut segmentator = SegmentatorBuilder::new()
        .with_max_segments(2)
        .build_with_kind(&image, labels, kind)
        .expect("builds");
    segmentator.merge_to_limit().expect("merge loop succeeds");

    let map = segmentator.into_label_map();
    let left: BTreeSet<RegionId> = map.labels()[..3].iter().copied().collect();
    let right: BTreeSet<RegionId> = map.labels()[3..].iter().copied().collect();
    assert_eq!(left.len(), 1);
    assert_eq!(right.len(), 1);
    assert_ne!(left, right);
}

#[rstest]
fn segment_records_describe_live_segments() {
    let (image, labels) = index_strip(4);
    let mut segmentator = SegmentatorBuilder::new()
        .with_max_segments(2)
        .build(&image, labels, MeanGap)
        .expect("strip builds");
    segmentator.merge_to_limit().expect("merge loop succeeds");
    let records = segmentator.segment_records().expect("records are consistent");

    let summary: Vec<(usize, u64, Point)> = records
        .iter()
        .map(|record| (record.id.index(), record.area, record.left_top_point))
        .collect();
    assert_eq!(
        summary,
        vec![(0, 2, Point::new(0, 0)), (2, 2, Point::new(2, 0))]
    );
    assert_relative_eq!(records[0].mean[0], 0.5);
    assert_relative_eq!(records[1].mean[0], 2.5);
    assert_relative_eq!(records[0].covariance[0][0], 0.25);
    assert_eq!(records[0].neighbours, BTreeSet::from([RegionId::new(2)]));
    assert_eq!(records[1].neighbours, BTreeSet::from([RegionId::new(0)]));
}

#[rstest]
fn merging_can_resume_with_tighter_limits() {
    let image = stripes(4, 2, 2);
    let labels = LabelMap::from_image(&image);
    let mut segmentator = SegmentatorBuilder::new()
        .with_max_segments(3)
        .build(&image, labels, WardCost)
        .expect("stripes build");
    assert_eq!(segmentator.merge_to_limit().expect("first pass").merges, 1);
    assert_eq!(segmentator.merge_to_limit().expect("no-op pass").merges, 0);

    let limits = segmentator.config().limits.with_max_segments(1);
    let summary = segmentator.merge_with_limits(limits).expect("second pass");
    assert_eq!(summary.merges, 2);
    assert_eq!(segmentator.history().len(), 3);
}
