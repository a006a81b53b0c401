//! Pixel-to-segment raster.
//!
//! A [`LabelMap`] assigns every pixel a [`RegionId`]. It is built either as
//! an identity mapping (one segment per pixel) or by flood-filling a
//! pre-labelled raster, and later rewritten as regions merge. Per-segment
//! statistics are derived on demand in one full scan.

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, SeedableRng, rngs::SmallRng};
use tracing::instrument;

use crate::{
    error::RasterError,
    graph::{Rect, RegionId},
    raster::{Channel, Connectivity, ImageBuffer, Point, offset_point},
};

/// Attempts made to find a colour distinct from every coloured neighbour.
const COLOUR_RETRIES: usize = 64;

/// An RGB colour used to visualise a segment.
pub type Rgb = [u8; 3];

/// Aggregate geometry of one segment.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentStats {
    /// Bounding rectangle.
    pub bounds: Rect,
    /// Pixel count.
    pub area: u64,
    /// Lexicographically smallest `(x, y)` pixel of the segment.
    pub left_top: Point,
    /// Distinct 8-adjacent segments.
    pub neighbours: BTreeSet<RegionId>,
}

impl SegmentStats {
    fn seeded(point: Point) -> Self {
        Self {
            bounds: Rect::at(point),
            area: 0,
            left_top: point,
            neighbours: BTreeSet::new(),
        }
    }

    fn include(&mut self, point: Point) {
        self.bounds = self.bounds.including(point);
        self.area += 1;
        self.left_top = self.left_top.min(point);
    }
}

/// Row-major raster of segment identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelMap {
    width: usize,
    height: usize,
    labels: Vec<RegionId>,
}

impl LabelMap {
    /// One segment per pixel, numbered in row-major order.
    ///
    /// # Examples
    /// ```
    /// use segmerge_core::{LabelMap, RegionId};
    ///
    /// let map = LabelMap::identity(3, 2);
    /// assert_eq!(map.get(2, 1), Some(RegionId::new(5)));
    /// assert_eq!(map.number_of_segments(), 6);
    /// ```
    #[must_use]
    pub fn identity(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            labels: (0..width * height).map(RegionId::new).collect(),
        }
    }

    /// Wraps an existing raster of identifiers.
    ///
    /// Identifiers may skip values but must be smaller than the pixel count,
    /// which keeps the region arena no larger than the image.
    ///
    /// # Errors
    /// Returns [`RasterError::LengthMismatch`] when `labels` does not hold
    /// exactly `width * height` entries and [`RasterError::LabelOutOfRange`]
    /// for an identifier at or above that count.
    pub fn from_raw(
        width: usize,
        height: usize,
        labels: Vec<RegionId>,
    ) -> Result<Self, RasterError> {
        let expected = width.saturating_mul(height);
        if labels.len() != expected {
            return Err(RasterError::LengthMismatch {
                width,
                height,
                channels: 1,
                expected,
                actual: labels.len(),
            });
        }
        if let Some(&label) = labels.iter().find(|id| id.index() >= expected) {
            return Err(RasterError::LabelOutOfRange {
                label,
                pixels: expected,
            });
        }
        Ok(Self {
            width,
            height,
            labels,
        })
    }

    /// Labels each 8-connected blob of identical pixel values as one segment.
    ///
    /// Identifiers are contiguous from zero in order of each blob's first
    /// pixel in a row-major scan.
    ///
    /// # Examples
    /// ```
    /// use segmerge_core::{ImageBuffer, LabelMap};
    ///
    /// let image = ImageBuffer::new(3, 1, 1, vec![7_u8, 7, 9])?;
    /// let map = LabelMap::from_image(&image);
    /// assert_eq!(map.number_of_segments(), 2);
    /// # Ok::<(), segmerge_core::RasterError>(())
    /// ```
    #[must_use]
    #[instrument(
        name = "segmerge.label_image",
        skip(image),
        fields(width = image.width(), height = image.height())
    )]
    pub fn from_image<C: Channel>(image: &ImageBuffer<C>) -> Self {
        let (width, height) = (image.width(), image.height());
        let mut labels: Vec<Option<RegionId>> = vec![None; width * height];
        let mut next = 0;
        let mut stack = Vec::new();

        for seed in 0..labels.len() {
            if labels[seed].is_some() {
                continue;
            }
            let id = RegionId::new(next);
            next += 1;
            let seed_point = Point::new(seed % width, seed / width);
            let Some(colour) = image.pixel(seed_point.x, seed_point.y) else {
                continue;
            };
            labels[seed] = Some(id);
            stack.push(seed_point);
            while let Some(point) = stack.pop() {
                for &offset in Connectivity::Eight.offsets() {
                    let Some(neighbour) = offset_point(point, offset, width, height) else {
                        continue;
                    };
                    let index = neighbour.y * width + neighbour.x;
                    if labels[index].is_none() && image.pixel(neighbour.x, neighbour.y) == Some(colour)
                    {
                        labels[index] = Some(id);
                        stack.push(neighbour);
                    }
                }
            }
        }

        Self {
            width,
            height,
            labels: labels
                .into_iter()
                .map(|label| label.unwrap_or(RegionId::new(0)))
                .collect(),
        }
    }

    /// Raster width.
    #[must_use]
    #[rustfmt::skip]
    pub fn width(&self) -> usize { self.width }

    /// Raster height.
    #[must_use]
    #[rustfmt::skip]
    pub fn height(&self) -> usize { self.height }

    /// Identifiers in row-major order.
    #[must_use]
    #[rustfmt::skip]
    pub fn labels(&self) -> &[RegionId] { &self.labels }

    /// Identifier at `(x, y)`, or `None` outside the raster.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<RegionId> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.labels.get(y * self.width + x).copied()
    }

    /// Identifier at `point`.
    ///
    /// # Errors
    /// Returns [`RasterError::OutOfBounds`] when `point` is outside the raster.
    pub fn at(&self, point: Point) -> Result<RegionId, RasterError> {
        self.get(point.x, point.y).ok_or(RasterError::OutOfBounds {
            point,
            width: self.width,
            height: self.height,
        })
    }

    /// One past the largest identifier in use, i.e. the arena size needed to
    /// give every identifier its own region. Never exceeds the pixel count.
    #[must_use]
    pub fn id_bound(&self) -> usize {
        self.labels
            .iter()
            .map(|id| id.index().saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Number of distinct identifiers present.
    #[must_use]
    pub fn number_of_segments(&self) -> usize {
        self.labels.iter().collect::<BTreeSet<_>>().len()
    }

    /// Returns `true` when any 4-neighbour of `(x, y)` carries a different
    /// identifier. Pixels outside the raster are never borders.
    #[must_use]
    pub fn is_border(&self, x: usize, y: usize) -> bool {
        let Some(id) = self.get(x, y) else {
            return false;
        };
        Connectivity::Four.offsets().iter().any(|&offset| {
            offset_point(Point::new(x, y), offset, self.width, self.height)
                .and_then(|neighbour| self.get(neighbour.x, neighbour.y))
                .is_some_and(|other| other != id)
        })
    }

    /// Rewrites every identifier through `resolve`.
    pub fn remap(&mut self, mut resolve: impl FnMut(RegionId) -> RegionId) {
        for label in &mut self.labels {
            *label = resolve(*label);
        }
    }

    /// Relabels pixels carrying `from` inside `area` as `to`, returning the
    /// number of pixels rewritten.
    pub fn relabel_within(&mut self, area: Rect, from: RegionId, to: RegionId) -> usize {
        let mut rewritten = 0;
        let max_x = area.max.x.min(self.width.saturating_sub(1));
        let max_y = area.max.y.min(self.height.saturating_sub(1));
        for y in area.min.y..=max_y {
            let row = y * self.width;
            for label in self
                .labels
                .get_mut(row + area.min.x..=row + max_x)
                .into_iter()
                .flatten()
            {
                if *label == from {
                    *label = to;
                    rewritten += 1;
                }
            }
        }
        rewritten
    }

    /// Computes per-segment geometry and 8-adjacency in one scan.
    #[must_use]
    #[instrument(name = "segmerge.segment_stats", skip(self), fields(width = self.width, height = self.height))]
    pub fn segment_stats(&self) -> BTreeMap<RegionId, SegmentStats> {
        let mut stats: BTreeMap<RegionId, SegmentStats> = BTreeMap::new();
        for (index, &id) in self.labels.iter().enumerate() {
            let point = Point::new(index % self.width, index / self.width);
            stats
                .entry(id)
                .or_insert_with(|| SegmentStats::seeded(point))
                .include(point);

            for &offset in Connectivity::Eight.forward_offsets() {
                let Some(neighbour) = offset_point(point, offset, self.width, self.height) else {
                    continue;
                };
                let other = self.labels[neighbour.y * self.width + neighbour.x];
                if other == id {
                    continue;
                }
                stats
                    .entry(id)
                    .or_insert_with(|| SegmentStats::seeded(point))
                    .neighbours
                    .insert(other);
                stats
                    .entry(other)
                    .or_insert_with(|| SegmentStats::seeded(neighbour))
                    .neighbours
                    .insert(id);
            }
        }
        stats
    }

    /// Assigns a visualisation colour to every segment.
    ///
    /// Colours are drawn from a generator seeded with `seed`. With
    /// `check_neighbours`, a segment re-draws (up to a fixed retry budget)
    /// while its colour matches one already given to an adjacent segment.
    #[must_use]
    pub fn color_map(&self, check_neighbours: bool, seed: u64) -> BTreeMap<RegionId, Rgb> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let stats = self.segment_stats();
        let mut colours: BTreeMap<RegionId, Rgb> = BTreeMap::new();
        for (&id, segment) in &stats {
            let mut colour: Rgb = rng.r#gen();
            if check_neighbours {
                for _ in 0..COLOUR_RETRIES {
                    let collides = segment
                        .neighbours
                        .iter()
                        .any(|neighbour| colours.get(neighbour) == Some(&colour));
                    if !collides {
                        break;
                    }
                    colour = rng.r#gen();
                }
            }
            colours.insert(id, colour);
        }
        colours
    }
}

#[cfg(test)]
mod tests;
