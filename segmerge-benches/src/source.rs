//! Synthetic images for benchmarking.
//!
//! A [`SyntheticImage`] is a grid of flat square tiles, each with its own
//! random base colour, perturbed per pixel by bounded noise. Generation is
//! seeded so every benchmark run sees the same pixels.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use segmerge_core::{ImageBuffer, LabelMap, RasterError};

/// Errors that may occur during synthetic image generation.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyntheticError {
    /// The requested image has no pixels.
    #[error("image side must be greater than zero")]
    ZeroSide,
    /// Tiles must be at least one pixel wide.
    #[error("tile side must be greater than zero")]
    ZeroTile,
    /// Pixels need at least one channel.
    #[error("channel count must be greater than zero")]
    ZeroChannels,
}

/// Configuration for synthetic image generation.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Width and height of the square image.
    pub side: usize,
    /// Width and height of each flat tile.
    pub tile: usize,
    /// Channels per pixel.
    pub channels: usize,
    /// Largest per-channel deviation from the tile colour, capped at 127.
    pub noise: u8,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

/// A seeded tiled image with noise.
///
/// # Examples
///
/// ```
/// use segmerge_benches::source::{SyntheticConfig, SyntheticImage};
///
/// let config = SyntheticConfig { side: 8, tile: 4, channels: 3, noise: 2, seed: 7 };
/// let image = SyntheticImage::generate(&config).expect("valid config");
/// assert_eq!(image.buffer().pixel_count(), 64);
/// ```
#[derive(Clone, Debug)]
pub struct SyntheticImage {
    buffer: ImageBuffer<u8>,
}

impl SyntheticImage {
    /// Generates the image eagerly from `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`SyntheticError`] when a dimension is zero.
    pub fn generate(config: &SyntheticConfig) -> Result<Self, SyntheticError> {
        if config.side == 0 {
            return Err(SyntheticError::ZeroSide);
        }
        if config.tile == 0 {
            return Err(SyntheticError::ZeroTile);
        }
        if config.channels == 0 {
            return Err(SyntheticError::ZeroChannels);
        }

        let noise = config.noise.min(u8::MAX / 2);
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let tiles_per_row = config.side.div_ceil(config.tile);
        let palette: Vec<u8> = (0..tiles_per_row * tiles_per_row * config.channels)
            .map(|_| rng.gen_range(noise..=u8::MAX - noise))
            .collect();

        let mut data = Vec::with_capacity(config.side * config.side * config.channels);
        for y in 0..config.side {
            for x in 0..config.side {
                let tile = (y / config.tile) * tiles_per_row + x / config.tile;
                for channel in 0..config.channels {
                    let base = palette.get(tile * config.channels + channel).copied().unwrap_or(0);
                    let jitter = rng.gen_range(0..=noise * 2);
                    data.push(base.saturating_sub(noise).saturating_add(jitter));
                }
            }
        }

        let buffer = ImageBuffer::new(config.side, config.side, config.channels, data)
            .map_err(|error| match error {
                RasterError::ZeroChannels => SyntheticError::ZeroChannels,
                _ => SyntheticError::ZeroSide,
            })?;
        Ok(Self { buffer })
    }

    /// The generated pixels.
    #[must_use]
    pub const fn buffer(&self) -> &ImageBuffer<u8> {
        &self.buffer
    }

    /// One segment per pixel.
    #[must_use]
    pub fn identity_labels(&self) -> LabelMap {
        LabelMap::identity(self.buffer.width(), self.buffer.height())
    }
}
