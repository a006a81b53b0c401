//! Per-region statistical accumulators.
//!
//! A region accumulates the per-channel sum and the upper triangle of the
//! channel cross-product matrix. Both are additive, so folding one region
//! into another is a plain element-wise sum and the mean, variance and
//! covariance of any union of regions can be recovered exactly.

use nalgebra::{DMatrix, DVector};

use crate::{
    error::GraphError,
    raster::{Channel, Point},
};

/// Axis-aligned bounding rectangle, inclusive on both ends.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    /// Top-left corner.
    pub min: Point,
    /// Bottom-right corner.
    pub max: Point,
}

impl Rect {
    /// A one-pixel rectangle.
    #[must_use]
    pub const fn at(point: Point) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Grows the rectangle to cover `point`.
    #[must_use]
    pub fn including(self, point: Point) -> Self {
        Self {
            min: Point::new(self.min.x.min(point.x), self.min.y.min(point.y)),
            max: Point::new(self.max.x.max(point.x), self.max.y.max(point.y)),
        }
    }

    /// Smallest rectangle covering both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        self.including(other.min).including(other.max)
    }

    /// Returns `true` when `point` lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        (self.min.x..=self.max.x).contains(&point.x) && (self.min.y..=self.max.y).contains(&point.y)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.max.x - self.min.x + 1
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.max.y - self.min.y + 1
    }
}

/// Additive pixel statistics of one region.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionStats {
    channels: usize,
    area: u64,
    sums: Vec<f64>,
    moments: Vec<f64>,
}

impl RegionStats {
    /// Empty statistics for `channels` channels.
    #[must_use]
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            area: 0,
            sums: vec![0.0; channels],
            moments: vec![0.0; channels * (channels + 1) / 2],
        }
    }

    /// Builds statistics from a list of pixels.
    ///
    /// # Errors
    /// Returns [`GraphError::ChannelMismatch`] when a pixel's length differs
    /// from `channels`.
    pub fn from_pixels<'a, C: Channel + 'a>(
        channels: usize,
        pixels: impl IntoIterator<Item = &'a [C]>,
    ) -> Result<Self, GraphError> {
        let mut stats = Self::new(channels);
        for pixel in pixels {
            stats.update(pixel)?;
        }
        Ok(stats)
    }

    /// Adds one pixel.
    ///
    /// # Errors
    /// Returns [`GraphError::ChannelMismatch`] when `pixel.len()` differs
    /// from the tracked channel count.
    pub fn update<C: Channel>(&mut self, pixel: &[C]) -> Result<(), GraphError> {
        if pixel.len() != self.channels {
            return Err(GraphError::ChannelMismatch {
                expected: self.channels,
                actual: pixel.len(),
            });
        }
        let mut moment = 0;
        for (row, sample) in pixel.iter().enumerate() {
            let value = sample.to_f64();
            self.sums[row] += value;
            for other in &pixel[row..] {
                self.moments[moment] += value * other.to_f64();
                moment += 1;
            }
        }
        self.area += 1;
        Ok(())
    }

    /// Adds every accumulator of `other` into `self`.
    ///
    /// # Errors
    /// Returns [`GraphError::ChannelMismatch`] when the channel counts differ.
    pub fn absorb(&mut self, other: &Self) -> Result<(), GraphError> {
        if other.channels != self.channels {
            return Err(GraphError::ChannelMismatch {
                expected: self.channels,
                actual: other.channels,
            });
        }
        for (sum, extra) in self.sums.iter_mut().zip(&other.sums) {
            *sum += extra;
        }
        for (moment, extra) in self.moments.iter_mut().zip(&other.moments) {
            *moment += extra;
        }
        self.area += other.area;
        Ok(())
    }

    /// Statistics of the union of `self` and `other`, leaving both untouched.
    ///
    /// Channel counts are assumed to match; the shorter accumulator wins
    /// otherwise.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            channels: self.channels.min(other.channels),
            area: self.area + other.area,
            sums: self.sums.iter().zip(&other.sums).map(|(a, b)| a + b).collect(),
            moments: self
                .moments
                .iter()
                .zip(&other.moments)
                .map(|(a, b)| a + b)
                .collect(),
        }
    }

    /// Number of channels accumulated.
    #[must_use]
    #[rustfmt::skip]
    pub fn channels(&self) -> usize { self.channels }

    /// Pixel count.
    #[must_use]
    #[rustfmt::skip]
    pub fn area(&self) -> u64 { self.area }

    /// Per-channel sums.
    #[must_use]
    #[rustfmt::skip]
    pub fn sums(&self) -> &[f64] { &self.sums }

    /// Mean of `channel`, or `0.0` for an empty region or unknown channel.
    #[must_use]
    pub fn mean(&self, channel: usize) -> f64 {
        if self.area == 0 {
            return 0.0;
        }
        self.sums.get(channel).map_or(0.0, |sum| sum / self.area as f64)
    }

    /// Mean of every channel.
    #[must_use]
    pub fn means(&self) -> Vec<f64> {
        (0..self.channels).map(|channel| self.mean(channel)).collect()
    }

    /// Raw second moment `Σ x_row · x_col`.
    #[must_use]
    pub fn moment(&self, row: usize, col: usize) -> f64 {
        let (row, col) = if row <= col { (row, col) } else { (col, row) };
        if col >= self.channels {
            return 0.0;
        }
        let offset = triangle_offset(self.channels, row) + (col - row);
        self.moments.get(offset).copied().unwrap_or(0.0)
    }

    /// Population covariance matrix (`channels` x `channels`).
    #[must_use]
    pub fn covariance(&self) -> DMatrix<f64> {
        let n = self.channels;
        if self.area == 0 {
            return DMatrix::zeros(n, n);
        }
        let area = self.area as f64;
        let means = DVector::from_vec(self.means());
        DMatrix::from_fn(n, n, |row, col| {
            self.moment(row, col) / area - means[row] * means[col]
        })
    }

    /// Sum of squared deviations from the mean, over all channels.
    #[must_use]
    pub fn squared_error(&self) -> f64 {
        if self.area == 0 {
            return 0.0;
        }
        let area = self.area as f64;
        let error: f64 = (0..self.channels)
            .map(|channel| self.moment(channel, channel) - self.sums[channel].powi(2) / area)
            .sum();
        error.max(0.0)
    }
}

/// Index of the first upper-triangle entry of `row` in a row-major packing.
const fn triangle_offset(channels: usize, row: usize) -> usize {
    row * channels - row * row.saturating_sub(1) / 2
}
