//! Per-segment summaries handed to serialisation collaborators.

use std::collections::BTreeSet;

use nalgebra::{DMatrix, SymmetricEigen};
use tracing::instrument;

use crate::{
    cost::CostFunction,
    error::Result,
    graph::{Rect, RegionId, RegionStats},
    raster::Point,
    segmentator::Segmentator,
};

/// Statistics and geometry of one live segment.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SegmentRecord {
    /// Segment identifier as it appears in the refreshed label map.
    pub id: RegionId,
    /// Pixel count.
    pub area: u64,
    /// Mean of every channel.
    pub mean: Vec<f64>,
    /// Population covariance, one row per channel.
    pub covariance: Vec<Vec<f64>>,
    /// Covariance eigenvalues, largest first.
    pub eigenvalues: Vec<f64>,
    /// Unit eigenvectors matching `eigenvalues`, one per entry.
    pub eigenvectors: Vec<Vec<f64>>,
    /// Identifiers of 8-adjacent segments.
    pub neighbours: BTreeSet<RegionId>,
    /// Lexicographically smallest pixel of the segment.
    pub left_top_point: Point,
    /// Bounding rectangle.
    pub bounds: Rect,
}

impl SegmentRecord {
    fn from_stats(id: RegionId, stats: &RegionStats) -> Self {
        let covariance = stats.covariance();
        let (eigenvalues, eigenvectors) = sorted_eigen(&covariance);
        Self {
            id,
            area: stats.area(),
            mean: stats.means(),
            covariance: covariance
                .row_iter()
                .map(|row| row.iter().copied().collect())
                .collect(),
            eigenvalues,
            eigenvectors,
            neighbours: BTreeSet::new(),
            left_top_point: Point::default(),
            bounds: Rect::at(Point::default()),
        }
    }
}

fn sorted_eigen(covariance: &DMatrix<f64>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let eigen = SymmetricEigen::new(covariance.clone());
    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let values = order.iter().map(|&index| eigen.eigenvalues[index]).collect();
    let vectors = order
        .iter()
        .map(|&index| eigen.eigenvectors.column(index).iter().copied().collect())
        .collect();
    (values, vectors)
}

impl<F: CostFunction> Segmentator<F> {
    /// Refreshes the label map and summarises every live segment, ordered by
    /// identifier.
    ///
    /// # Errors
    /// Fails only when the label map names a region the graph does not know,
    /// which indicates a corrupted run.
    #[instrument(name = "segmerge.segment_records", skip(self))]
    pub fn segment_records(&mut self) -> Result<Vec<SegmentRecord>> {
        self.update_mapping();
        let geometry = self.label_map().segment_stats();
        let mut records = Vec::with_capacity(geometry.len());
        for (id, segment) in geometry {
            let region = self.graph().live_region(id)?;
            let mut record = SegmentRecord::from_stats(id, region.stats());
            record.neighbours = segment.neighbours;
            record.left_top_point = segment.left_top;
            record.bounds = segment.bounds;
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn eigen_pairs_are_sorted_largest_first() {
        let covariance = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 9.0]);
        let (values, vectors) = sorted_eigen(&covariance);
        assert_relative_eq!(values[0], 9.0, epsilon = 1e-9);
        assert_relative_eq!(values[1], 1.0, epsilon = 1e-9);
        assert_relative_eq!(vectors[0][1].abs(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(vectors[0][0], 0.0, epsilon = 1e-9);
    }

    #[rstest]
    fn record_carries_moments() {
        let pixels: [[f64; 2]; 2] = [[0.0, 4.0], [2.0, 4.0]];
        let stats = RegionStats::from_pixels(2, pixels.iter().map(|pixel| &pixel[..]))
            .expect("two channels");
        let record = SegmentRecord::from_stats(RegionId::new(3), &stats);
        assert_eq!(record.area, 2);
        assert_eq!(record.mean, vec![1.0, 4.0]);
        assert_relative_eq!(record.covariance[0][0], 1.0);
        assert_relative_eq!(record.covariance[1][1], 0.0);
        assert_relative_eq!(record.eigenvalues[0], 1.0, epsilon = 1e-9);
    }
}
