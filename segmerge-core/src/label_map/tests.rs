//! Unit tests for label map construction and derived statistics.

use std::collections::BTreeSet;

use rstest::rstest;

use crate::{
    error::RasterError,
    graph::{Rect, RegionId},
    raster::{ImageBuffer, Point},
    test_utils::grid,
};

use super::LabelMap;

fn r(index: usize) -> RegionId {
    RegionId::new(index)
}

fn ids(map: &LabelMap) -> Vec<usize> {
    map.labels().iter().map(|id| id.index()).collect()
}

#[rstest]
fn identity_numbers_pixels_row_major() {
    let map = LabelMap::identity(3, 2);
    assert_eq!(ids(&map), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(map.id_bound(), 6);
}

#[rstest]
fn from_raw_validates_length() {
    let err = LabelMap::from_raw(2, 2, vec![r(0); 3]).expect_err("three labels for four pixels");
    assert!(matches!(err, RasterError::LengthMismatch { expected: 4, actual: 3, .. }));
}

#[rstest]
#[case::at_pixel_count(RegionId::new(4))]
#[case::largest(RegionId::new(usize::MAX))]
fn from_raw_rejects_identifiers_beyond_pixel_count(#[case] label: RegionId) {
    let err = LabelMap::from_raw(2, 2, vec![r(0), r(1), label, r(3)])
        .expect_err("identifier outside the arena");
    assert_eq!(err, RasterError::LabelOutOfRange { label, pixels: 4 });
}

#[rstest]
fn from_raw_accepts_sparse_identifiers() {
    let map = LabelMap::from_raw(2, 2, vec![r(3), r(3), r(1), r(1)]).expect("ids below four");
    assert_eq!(map.id_bound(), 4);
    assert_eq!(map.number_of_segments(), 2);
}

#[rstest]
fn flood_fill_joins_diagonal_neighbours() {
    #[rustfmt::skip]
    let image = grid(3, 3, &[
        1.0, 0.0, 0.0,
        0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,
    ]);
    let map = LabelMap::from_image(&image);
    assert_eq!(map.number_of_segments(), 2);
    assert_eq!(ids(&map), vec![0, 1, 1, 1, 0, 1, 1, 1, 0]);
}

#[rstest]
fn flood_fill_separates_disjoint_blobs_of_one_colour() {
    #[rustfmt::skip]
    let image = grid(5, 1, &[2.0, 2.0, 5.0, 2.0, 2.0]);
    let map = LabelMap::from_image(&image);
    assert_eq!(ids(&map), vec![0, 0, 1, 2, 2]);
}

#[rstest]
fn flood_fill_compares_every_channel() {
    let image = ImageBuffer::new(3, 1, 2, vec![1_u8, 1, 1, 2, 1, 1]).expect("valid shape");
    let map = LabelMap::from_image(&image);
    assert_eq!(ids(&map), vec![0, 1, 2]);
}

#[rstest]
fn flood_fill_handles_large_uniform_image_without_recursion() {
    let image = grid(256, 256, &vec![0.0; 256 * 256]);
    let map = LabelMap::from_image(&image);
    assert_eq!(map.number_of_segments(), 1);
}

#[rstest]
fn empty_image_yields_empty_map() {
    let image = ImageBuffer::<u8>::new(0, 0, 1, Vec::new()).expect("empty is valid");
    let map = LabelMap::from_image(&image);
    assert_eq!(map.number_of_segments(), 0);
    assert_eq!(map.id_bound(), 0);
    assert!(map.segment_stats().is_empty());
}

#[rstest]
fn segment_stats_collects_geometry_and_neighbours() {
    #[rustfmt::skip]
    let map = LabelMap::from_raw(4, 3, [
        0, 0, 1, 1,
        0, 2, 2, 1,
        3, 3, 2, 1,
    ].into_iter().map(RegionId::new).collect()).expect("valid shape");

    let stats = map.segment_stats();
    assert_eq!(stats.len(), 4);

    let zero = &stats[&r(0)];
    assert_eq!(zero.area, 3);
    assert_eq!(zero.left_top, Point::new(0, 0));
    assert_eq!(
        zero.bounds,
        Rect {
            min: Point::new(0, 0),
            max: Point::new(1, 1)
        }
    );
    assert_eq!(zero.neighbours, BTreeSet::from([r(1), r(2), r(3)]));

    let two = &stats[&r(2)];
    assert_eq!(two.area, 3);
    assert_eq!(two.left_top, Point::new(1, 1));
    assert_eq!(two.neighbours, BTreeSet::from([r(0), r(1), r(3)]));

    let three = &stats[&r(3)];
    assert_eq!(three.left_top, Point::new(0, 2));
    assert_eq!(three.neighbours, BTreeSet::from([r(0), r(2)]));

    for (&id, segment) in &stats {
        for neighbour in &segment.neighbours {
            assert!(stats[neighbour].neighbours.contains(&id));
        }
    }
}

#[rstest]
#[case(0, 0, false)]
#[case(1, 0, true)]
#[case(1, 1, true)]
#[case(2, 2, false)]
#[case(9, 9, false)]
fn border_detection_uses_axis_neighbours(#[case] x: usize, #[case] y: usize, #[case] expected: bool) {
    #[rustfmt::skip]
    let map = LabelMap::from_raw(3, 3, [
        0, 0, 1,
        0, 2, 1,
        1, 1, 1,
    ].into_iter().map(RegionId::new).collect()).expect("valid shape");
    assert_eq!(map.is_border(x, y), expected);
}

#[rstest]
fn relabel_within_only_touches_rectangle() {
    let mut map = LabelMap::from_raw(4, 1, vec![r(1), r(1), r(2), r(1)]).expect("valid shape");
    let rewritten = map.relabel_within(
        Rect {
            min: Point::new(0, 0),
            max: Point::new(1, 0),
        },
        r(1),
        r(7),
    );
    assert_eq!(rewritten, 2);
    assert_eq!(ids(&map), vec![7, 7, 2, 1]);
}

#[rstest]
fn remap_rewrites_every_pixel() {
    let mut map = LabelMap::identity(2, 2);
    map.remap(|id| RegionId::new(id.index() / 2));
    assert_eq!(ids(&map), vec![0, 0, 1, 1]);
}

#[rstest]
#[case::checked(true)]
#[case::unchecked(false)]
fn colour_map_is_deterministic_and_complete(#[case] check_neighbours: bool) {
    let map = LabelMap::identity(4, 4);
    let first = map.color_map(check_neighbours, 7);
    let second = map.color_map(check_neighbours, 7);
    assert_eq!(first, second);
    assert_eq!(first.len(), 16);
}

#[rstest]
fn checked_colour_map_separates_neighbours() {
    let map = LabelMap::identity(8, 8);
    let colours = map.color_map(true, 1);
    for (id, segment) in map.segment_stats() {
        for neighbour in segment.neighbours {
            assert_ne!(colours[&id], colours[&neighbour]);
        }
    }
}
