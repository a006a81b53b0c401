//! Pixel buffer contract shared with image-decoding collaborators.
//!
//! The engine never decodes files. Callers hand it an [`ImageBuffer`]: a
//! row-major, channel-interleaved grid of samples whose element type
//! implements [`Channel`].

use std::fmt;

use crate::error::RasterError;

/// A pixel coordinate, `x` growing rightwards and `y` downwards.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    /// Column index.
    pub x: usize,
    /// Row index.
    pub y: usize,
}

impl Point {
    /// Creates a point from its column and row.
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Pixel neighbourhood used when scanning for adjacent regions.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Connectivity {
    /// Axis-aligned neighbours only.
    #[default]
    Four,
    /// Axis-aligned and diagonal neighbours.
    Eight,
}

const FORWARD_FOUR: [(isize, isize); 2] = [(1, 0), (0, 1)];
const FORWARD_EIGHT: [(isize, isize); 4] = [(1, 0), (-1, 1), (0, 1), (1, 1)];
const ALL_FOUR: [(isize, isize); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
const ALL_EIGHT: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

impl Connectivity {
    /// Offsets that visit every unordered neighbour pair exactly once when
    /// applied to each pixel of a row-major scan.
    pub(crate) const fn forward_offsets(self) -> &'static [(isize, isize)] {
        match self {
            Self::Four => &FORWARD_FOUR,
            Self::Eight => &FORWARD_EIGHT,
        }
    }

    /// All neighbour offsets.
    pub(crate) const fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Self::Four => &ALL_FOUR,
            Self::Eight => &ALL_EIGHT,
        }
    }
}

/// Steps `point` by `offset`, returning `None` when the result leaves the
/// `width` x `height` grid.
pub(crate) fn offset_point(
    point: Point,
    (dx, dy): (isize, isize),
    width: usize,
    height: usize,
) -> Option<Point> {
    let x = point.x.checked_add_signed(dx)?;
    let y = point.y.checked_add_signed(dy)?;
    (x < width && y < height).then_some(Point::new(x, y))
}

/// A numeric sample type accepted by the engine.
///
/// Integer (fixed-point) and floating representations are both widened to
/// `f64` before they reach the region accumulators.
pub trait Channel: Copy + PartialEq + fmt::Debug + Send + Sync {
    /// Widens the sample to the accumulator precision.
    fn to_f64(self) -> f64;
}

macro_rules! impl_channel {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Channel for $ty {
                #[inline]
                fn to_f64(self) -> f64 {
                    f64::from(self)
                }
            }
        )+
    };
}

impl_channel!(u8, u16, u32, f32, f64);

/// A rectangular, row-major, channel-interleaved pixel buffer.
///
/// # Examples
/// ```
/// use segmerge_core::ImageBuffer;
///
/// let image = ImageBuffer::new(2, 1, 3, vec![0_u8, 0, 0, 255, 255, 255])?;
/// assert_eq!(image.pixel(1, 0), Some(&[255_u8, 255, 255][..]));
/// # Ok::<(), segmerge_core::RasterError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuffer<C> {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<C>,
}

impl<C: Channel> ImageBuffer<C> {
    /// Wraps `data` after validating it against the declared shape.
    ///
    /// # Errors
    /// Returns [`RasterError::ZeroChannels`] when `channels == 0` and
    /// [`RasterError::LengthMismatch`] when `data` does not hold exactly
    /// `width * height * channels` samples.
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<C>,
    ) -> Result<Self, RasterError> {
        if channels == 0 {
            return Err(RasterError::ZeroChannels);
        }
        let expected = width.saturating_mul(height).saturating_mul(channels);
        if data.len() != expected {
            return Err(RasterError::LengthMismatch {
                width,
                height,
                channels,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Image width in pixels.
    #[must_use]
    #[rustfmt::skip]
    pub fn width(&self) -> usize { self.width }

    /// Image height in pixels.
    #[must_use]
    #[rustfmt::skip]
    pub fn height(&self) -> usize { self.height }

    /// Samples per pixel.
    #[must_use]
    #[rustfmt::skip]
    pub fn channels(&self) -> usize { self.channels }

    /// Number of pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Raw interleaved samples.
    #[must_use]
    #[rustfmt::skip]
    pub fn as_slice(&self) -> &[C] { &self.data }

    /// Returns the samples of pixel `(x, y)`, or `None` outside the image.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[C]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y * self.width + x) * self.channels;
        self.data.get(start..start + self.channels)
    }

    /// Iterates over pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = &[C]> {
        self.data.chunks_exact(self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn rejects_zero_channels() {
        let err = ImageBuffer::<u8>::new(1, 1, 0, Vec::new()).expect_err("zero channels");
        assert_eq!(err, RasterError::ZeroChannels);
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = ImageBuffer::new(2, 2, 1, vec![0_u8; 3]).expect_err("short buffer");
        assert!(matches!(
            err,
            RasterError::LengthMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn accepts_empty_image() {
        let image = ImageBuffer::<f32>::new(0, 0, 3, Vec::new()).expect("empty image is valid");
        assert_eq!(image.pixel_count(), 0);
        assert_eq!(image.pixels().count(), 0);
    }

    #[rstest]
    #[case(Point::new(0, 0), (-1, 0), None)]
    #[case(Point::new(0, 0), (1, 1), Some(Point::new(1, 1)))]
    #[case(Point::new(2, 1), (1, 0), None)]
    #[case(Point::new(2, 1), (-1, -1), Some(Point::new(1, 0)))]
    fn offset_point_respects_bounds(
        #[case] point: Point,
        #[case] offset: (isize, isize),
        #[case] expected: Option<Point>,
    ) {
        assert_eq!(offset_point(point, offset, 3, 2), expected);
    }

    #[test]
    fn forward_offsets_cover_each_pair_once() {
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let all = connectivity.offsets();
            let forward = connectivity.forward_offsets();
            assert_eq!(forward.len() * 2, all.len());
            for &(dx, dy) in forward {
                assert!(all.contains(&(dx, dy)));
                assert!(all.contains(&(-dx, -dy)));
                assert!(!forward.contains(&(-dx, -dy)));
            }
        }
    }
}
