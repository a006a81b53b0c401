//! Pluggable merge-cost functions.
//!
//! The orchestrator only sees [`CostFunction`]: a pair of pure functions of
//! region statistics. One ranks candidate merges, the other estimates how
//! much a single region deviates from a flat model and feeds the aggregate
//! error stopping rule.

use std::{fmt, str::FromStr};

use nalgebra::DMatrix;
use thiserror::Error;

use crate::graph::RegionStats;

/// Merge-cost capability consumed by [`crate::Segmentator`].
///
/// Both functions must be total and pure: the same statistics always yield
/// the same finite value.
pub trait CostFunction: Send + Sync {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Region-intrinsic error estimate.
    fn error(&self, region: &RegionStats) -> f64;

    /// Symmetric cost of merging `left` and `right`; lower merges first.
    fn distance(&self, left: &RegionStats, right: &RegionStats) -> f64;
}

impl<F: CostFunction + ?Sized> CostFunction for Box<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn error(&self, region: &RegionStats) -> f64 {
        (**self).error(region)
    }

    fn distance(&self, left: &RegionStats, right: &RegionStats) -> f64 {
        (**self).distance(left, right)
    }
}

impl<F: CostFunction + ?Sized> CostFunction for &F {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn error(&self, region: &RegionStats) -> f64 {
        (**self).error(region)
    }

    fn distance(&self, left: &RegionStats, right: &RegionStats) -> f64 {
        (**self).distance(left, right)
    }
}

/// Ward linkage: the increase in total squared error caused by a merge.
///
/// `distance = a·b / (a + b) · ‖μa − μb‖²`, so two small regions merge more
/// cheaply than a small region and a large one at the same mean gap.
///
/// # Examples
/// ```
/// use segmerge_core::{CostFunction, RegionStats, WardCost};
///
/// let dark = RegionStats::from_pixels(1, [&[0.0_f32][..]])?;
/// let light = RegionStats::from_pixels(1, [&[2.0_f32][..]])?;
/// assert_eq!(WardCost.distance(&dark, &light), 2.0);
/// # Ok::<(), segmerge_core::GraphError>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct WardCost;

impl CostFunction for WardCost {
    fn name(&self) -> &str {
        "ward"
    }

    fn error(&self, region: &RegionStats) -> f64 {
        region.squared_error()
    }

    fn distance(&self, left: &RegionStats, right: &RegionStats) -> f64 {
        let (a, b) = (left.area() as f64, right.area() as f64);
        if a == 0.0 || b == 0.0 {
            return 0.0;
        }
        let gap: f64 = (0..left.channels().min(right.channels()))
            .map(|channel| (left.mean(channel) - right.mean(channel)).powi(2))
            .sum();
        a * b / (a + b) * gap
    }
}

/// Gaussian likelihood-ratio cost.
///
/// Each region is modelled as a multivariate normal. The error of a region is
/// `n · ln det Σ` and the merge cost is the increase of that quantity:
/// `n·ln det Σab − a·ln det Σa − b·ln det Σb`. `epsilon` is added to every
/// covariance diagonal so flat regions keep a finite determinant.
#[derive(Clone, Copy, Debug)]
pub struct GaussianCost {
    epsilon: f64,
}

impl GaussianCost {
    /// Default diagonal regulariser.
    pub const DEFAULT_EPSILON: f64 = 1.0;

    /// Builds the cost with a custom regulariser; non-positive or non-finite
    /// values fall back to [`Self::DEFAULT_EPSILON`].
    #[must_use]
    pub fn new(epsilon: f64) -> Self {
        let epsilon = if epsilon.is_finite() && epsilon > 0.0 {
            epsilon
        } else {
            Self::DEFAULT_EPSILON
        };
        Self { epsilon }
    }

    /// The diagonal regulariser in use.
    #[must_use]
    #[rustfmt::skip]
    pub fn epsilon(&self) -> f64 { self.epsilon }

    fn log_det(&self, region: &RegionStats) -> f64 {
        let channels = region.channels();
        let covariance =
            region.covariance() + DMatrix::identity(channels, channels) * self.epsilon;
        match covariance.clone().cholesky() {
            Some(factor) => {
                2.0 * factor
                    .l()
                    .diagonal()
                    .iter()
                    .map(|value| value.ln())
                    .sum::<f64>()
            }
            None => covariance.determinant().abs().max(f64::MIN_POSITIVE).ln(),
        }
    }
}

impl Default for GaussianCost {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EPSILON)
    }
}

impl CostFunction for GaussianCost {
    fn name(&self) -> &str {
        "gaussian"
    }

    fn error(&self, region: &RegionStats) -> f64 {
        region.area() as f64 * self.log_det(region)
    }

    fn distance(&self, left: &RegionStats, right: &RegionStats) -> f64 {
        let merged = left.merged(right);
        (self.error(&merged) - self.error(left) - self.error(right)).max(0.0)
    }
}

/// Raised when a cost function name is not recognised.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown cost function `{name}`; expected `ward` or `gaussian`")]
pub struct UnknownCostKind {
    /// Name supplied by the caller.
    pub name: String,
}

/// Built-in cost functions selectable by name.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CostKind {
    /// [`WardCost`].
    #[default]
    Ward,
    /// [`GaussianCost`] with the default regulariser.
    Gaussian,
}

impl CostKind {
    /// Instantiates the selected cost function.
    #[must_use]
    pub fn build(self) -> Box<dyn CostFunction> {
        match self {
            Self::Ward => Box::new(WardCost),
            Self::Gaussian => Box::new(GaussianCost::default()),
        }
    }

    /// Canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ward => "ward",
            Self::Gaussian => "gaussian",
        }
    }
}

impl fmt::Display for CostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostKind {
    type Err = UnknownCostKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ward" => Ok(Self::Ward),
            "gaussian" => Ok(Self::Gaussian),
            other => Err(UnknownCostKind {
                name: other.to_owned(),
            }),
        }
    }
}
