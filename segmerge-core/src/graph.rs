//! Region adjacency graph.
//!
//! Regions and edges live in two arenas addressed by [`RegionId`] and
//! [`EdgeId`]. Each region keeps its adjacency as a sorted map from
//! neighbour to the edge joining them, so a pair lookup during contraction
//! is a map lookup rather than a list walk.
//!
//! Regions are never removed. An absorbed region stays in the arena, marked
//! dead, with a back-reference to the region that absorbed it; following
//! that chain resolves stale identifiers without rewriting them eagerly.

use std::{collections::BTreeMap, fmt};

use thiserror::Error;

use crate::{
    error::GraphError,
    heap::EdgeId,
    raster::{Channel, Point},
};

mod stats;

pub use self::stats::{Rect, RegionStats};

/// Stable handle naming one region.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RegionId(usize);

impl RegionId {
    /// Wraps a raw arena index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// One image segment: accumulated statistics plus its adjacency.
#[derive(Clone, Debug)]
pub struct Region {
    stats: RegionStats,
    bounds: Option<Rect>,
    links: BTreeMap<RegionId, EdgeId>,
    exists: bool,
    absorbed_by: Option<RegionId>,
    locked: bool,
}

impl Region {
    /// Creates an empty, live region accumulating `channels` channels.
    #[must_use]
    pub fn new(channels: usize) -> Self {
        Self {
            stats: RegionStats::new(channels),
            bounds: None,
            links: BTreeMap::new(),
            exists: true,
            absorbed_by: None,
            locked: false,
        }
    }

    /// Folds one pixel located at `point` into the statistics.
    ///
    /// # Errors
    /// Returns [`GraphError::ChannelMismatch`] when `pixel` does not carry
    /// the region's channel count.
    pub fn update<C: Channel>(&mut self, point: Point, pixel: &[C]) -> Result<(), GraphError> {
        self.stats.update(pixel)?;
        self.bounds = Some(match self.bounds {
            Some(bounds) => bounds.including(point),
            None => Rect::at(point),
        });
        Ok(())
    }

    /// Accumulated statistics.
    #[must_use]
    #[rustfmt::skip]
    pub fn stats(&self) -> &RegionStats { &self.stats }

    /// Pixel count.
    #[must_use]
    pub fn area(&self) -> u64 {
        self.stats.area()
    }

    /// Bounding rectangle of every pixel ever folded into the region.
    #[must_use]
    #[rustfmt::skip]
    pub fn bounds(&self) -> Option<Rect> { self.bounds }

    /// Whether the region is still live.
    #[must_use]
    #[rustfmt::skip]
    pub fn exists(&self) -> bool { self.exists }

    /// Region that absorbed this one directly, if any.
    #[must_use]
    #[rustfmt::skip]
    pub fn absorbed_by(&self) -> Option<RegionId> { self.absorbed_by }

    /// Whether the locking policy forbids merging this region.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_locked(&self) -> bool { self.locked }

    /// Neighbours in ascending identity order, each with the joining edge.
    pub fn links(&self) -> impl ExactSizeIterator<Item = (RegionId, EdgeId)> + '_ {
        self.links.iter().map(|(&neighbour, &edge)| (neighbour, edge))
    }

    /// Edge joining this region to `neighbour`, if they are adjacent.
    #[must_use]
    pub fn link_to(&self, neighbour: RegionId) -> Option<EdgeId> {
        self.links.get(&neighbour).copied()
    }

    /// Number of adjacent regions.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.links.len()
    }
}

/// A candidate merge between two adjacent regions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    left: RegionId,
    right: RegionId,
    cost: f64,
    sequence: u64,
    retired: bool,
    blocked: bool,
}

impl Edge {
    /// Lower endpoint.
    #[must_use]
    #[rustfmt::skip]
    pub fn left(&self) -> RegionId { self.left }

    /// Upper endpoint.
    #[must_use]
    #[rustfmt::skip]
    pub fn right(&self) -> RegionId { self.right }

    /// Most recently computed merge cost.
    #[must_use]
    #[rustfmt::skip]
    pub fn cost(&self) -> f64 { self.cost }

    /// Creation order, used to break cost ties.
    #[must_use]
    #[rustfmt::skip]
    pub fn sequence(&self) -> u64 { self.sequence }

    /// Whether the edge was unlinked by a merge.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_retired(&self) -> bool { self.retired }

    /// Whether the locking policy forbids merging across this edge.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_blocked(&self) -> bool { self.blocked }

    /// Endpoint opposite `region`.
    #[must_use]
    pub fn other(&self, region: RegionId) -> RegionId {
        if self.left == region {
            self.right
        } else {
            self.left
        }
    }
}

/// Structural defects reported by [`RegionGraph::check_invariants`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum GraphInvariantViolation {
    /// A live region links to a dead one.
    #[error("live region {region} still links to dead region {neighbour}")]
    DeadNeighbour {
        /// Region owning the link.
        region: RegionId,
        /// Dead neighbour.
        neighbour: RegionId,
    },
    /// A dead region still carries links.
    #[error("dead region {region} still has {degree} links")]
    DeadWithLinks {
        /// Offending region.
        region: RegionId,
        /// Remaining link count.
        degree: usize,
    },
    /// The reverse link is missing or names another edge.
    #[error("link {region}->{neighbour} via {edge} has no matching reverse link")]
    Asymmetric {
        /// Region owning the link.
        region: RegionId,
        /// Neighbour named by the link.
        neighbour: RegionId,
        /// Edge named by the link.
        edge: EdgeId,
    },
    /// The link names an edge whose endpoints differ.
    #[error("link {region}->{neighbour} names {edge}, which joins other regions or is retired")]
    EdgeMismatch {
        /// Region owning the link.
        region: RegionId,
        /// Neighbour named by the link.
        neighbour: RegionId,
        /// Edge named by the link.
        edge: EdgeId,
    },
    /// The cached live count drifted.
    #[error("graph reports {reported} live regions but {actual} are live")]
    LiveCount {
        /// Cached count.
        reported: usize,
        /// Count obtained by scanning.
        actual: usize,
    },
}

/// Arena-backed region adjacency graph.
#[derive(Clone, Debug, Default)]
pub struct RegionGraph {
    regions: Vec<Region>,
    edges: Vec<Edge>,
    live: usize,
    next_sequence: u64,
}

impl RegionGraph {
    /// Creates `region_count` empty live regions with `channels` channels each.
    #[must_use]
    pub fn new(region_count: usize, channels: usize) -> Self {
        Self {
            regions: (0..region_count).map(|_| Region::new(channels)).collect(),
            edges: Vec::new(),
            live: region_count,
            next_sequence: 0,
        }
    }

    /// Total number of regions ever created, live or dead.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns `true` when the graph holds no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Number of live regions.
    #[must_use]
    #[rustfmt::skip]
    pub fn live_count(&self) -> usize { self.live }

    /// Identifiers of every region, live or dead.
    pub fn ids(&self) -> impl Iterator<Item = RegionId> {
        (0..self.regions.len()).map(RegionId::new)
    }

    /// Identifiers of live regions in ascending order.
    pub fn live_ids(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, region)| region.exists)
            .map(|(index, _)| RegionId::new(index))
    }

    /// Looks up a region, live or dead.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownRegion`] for handles outside the arena.
    pub fn region(&self, id: RegionId) -> Result<&Region, GraphError> {
        self.regions.get(id.index()).ok_or(GraphError::UnknownRegion {
            region: id,
            len: self.regions.len(),
        })
    }

    /// Mutable access to a region, live or dead.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownRegion`] for handles outside the arena.
    pub fn region_mut(&mut self, id: RegionId) -> Result<&mut Region, GraphError> {
        let len = self.regions.len();
        self.regions
            .get_mut(id.index())
            .ok_or(GraphError::UnknownRegion { region: id, len })
    }

    /// Looks up a region that must still be live.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownRegion`] or [`GraphError::DeadRegion`].
    pub fn live_region(&self, id: RegionId) -> Result<&Region, GraphError> {
        let region = self.region(id)?;
        if !region.exists {
            return Err(GraphError::DeadRegion {
                region: id,
                absorbed_by: region.absorbed_by,
            });
        }
        Ok(region)
    }

    /// Looks up an edge that has not been retired.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownEdge`] for unknown or retired handles.
    pub fn edge(&self, id: EdgeId) -> Result<&Edge, GraphError> {
        self.edges
            .get(id.index())
            .filter(|edge| !edge.retired)
            .ok_or(GraphError::UnknownEdge { edge: id })
    }

    /// Number of edges ever created, including retired ones.
    #[must_use]
    pub fn edge_slots(&self) -> usize {
        self.edges.len()
    }

    /// Iterates over edges that are still linked.
    pub fn active_edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| !edge.retired)
            .map(|(index, edge)| (EdgeId::new(index), edge))
    }

    /// Edge joining `left` and `right`, if they are adjacent.
    #[must_use]
    pub fn edge_between(&self, left: RegionId, right: RegionId) -> Option<EdgeId> {
        self.regions
            .get(left.index())
            .and_then(|region| region.link_to(right))
    }

    /// Creates an edge between two live regions and links it into both
    /// adjacency maps.
    ///
    /// # Errors
    /// Propagates the preconditions of [`Self::ordered_insert`].
    pub fn add_edge(
        &mut self,
        left: RegionId,
        right: RegionId,
        cost: f64,
    ) -> Result<EdgeId, GraphError> {
        let edge = EdgeId::new(self.edges.len());
        self.ordered_insert(left, right, edge)?;
        if let Err(error) = self.ordered_insert(right, left, edge) {
            self.regions[left.index()].links.remove(&right);
            return Err(error);
        }
        let (left, right) = if left <= right {
            (left, right)
        } else {
            (right, left)
        };
        self.edges.push(Edge {
            left,
            right,
            cost,
            sequence: self.next_sequence,
            retired: false,
            blocked: false,
        });
        self.next_sequence += 1;
        Ok(edge)
    }

    /// Inserts a one-way link from `region` to `neighbour` in sorted position.
    ///
    /// # Errors
    /// Returns [`GraphError::SelfReference`] when `region == neighbour`,
    /// [`GraphError::DuplicateLink`] when the link exists, and the lookup
    /// errors of [`Self::live_region`] for either endpoint.
    pub fn ordered_insert(
        &mut self,
        region: RegionId,
        neighbour: RegionId,
        edge: EdgeId,
    ) -> Result<(), GraphError> {
        if region == neighbour {
            return Err(GraphError::SelfReference { region });
        }
        self.live_region(neighbour)?;
        self.live_region(region)?;
        let links = &mut self.regions[region.index()].links;
        if links.contains_key(&neighbour) {
            return Err(GraphError::DuplicateLink { region, neighbour });
        }
        links.insert(neighbour, edge);
        Ok(())
    }

    /// Removes the adjacency between `left` and `right` and retires its edge.
    ///
    /// # Errors
    /// Returns [`GraphError::MissingLink`] when the regions are not adjacent.
    pub fn unlink(&mut self, left: RegionId, right: RegionId) -> Result<EdgeId, GraphError> {
        let edge = self
            .region_mut(left)?
            .links
            .remove(&right)
            .ok_or(GraphError::MissingLink {
                region: left,
                neighbour: right,
            })?;
        self.region_mut(right)?.links.remove(&left);
        if let Some(record) = self.edges.get_mut(edge.index()) {
            record.retired = true;
        }
        Ok(edge)
    }

    /// Stores a freshly computed cost on an edge.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownEdge`] for unknown or retired handles.
    pub fn set_cost(&mut self, edge: EdgeId, cost: f64) -> Result<(), GraphError> {
        let record = self
            .edges
            .get_mut(edge.index())
            .filter(|record| !record.retired)
            .ok_or(GraphError::UnknownEdge { edge })?;
        record.cost = cost;
        Ok(())
    }

    /// Marks an edge as non-mergeable.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownEdge`] for unknown or retired handles.
    pub fn block_edge(&mut self, edge: EdgeId) -> Result<(), GraphError> {
        let record = self
            .edges
            .get_mut(edge.index())
            .filter(|record| !record.retired)
            .ok_or(GraphError::UnknownEdge { edge })?;
        record.blocked = true;
        Ok(())
    }

    /// Marks a region as non-mergeable.
    ///
    /// # Errors
    /// Returns [`GraphError::UnknownRegion`] for handles outside the arena.
    pub fn lock_region(&mut self, id: RegionId) -> Result<(), GraphError> {
        self.region_mut(id)?.locked = true;
        Ok(())
    }

    /// Folds `other` into `target`: statistics and bounds are combined,
    /// `other` is marked dead and records `target` as its absorber.
    ///
    /// Adjacency is left untouched; rewiring links is the caller's job.
    ///
    /// # Errors
    /// Returns [`GraphError::SelfReference`] when both handles match and
    /// the lookup errors of [`Self::live_region`] when either region is
    /// unknown or already dead.
    pub fn absorb(&mut self, target: RegionId, other: RegionId) -> Result<(), GraphError> {
        if target == other {
            return Err(GraphError::SelfReference { region: target });
        }
        self.live_region(target)?;
        let absorbed = self.live_region(other)?;
        let stats = absorbed.stats.clone();
        let bounds = absorbed.bounds;

        let survivor = &mut self.regions[target.index()];
        survivor.stats.absorb(&stats)?;
        survivor.bounds = match (survivor.bounds, bounds) {
            (Some(left), Some(right)) => Some(left.union(right)),
            (left, right) => left.or(right),
        };

        let absorbed = &mut self.regions[other.index()];
        absorbed.exists = false;
        absorbed.absorbed_by = Some(target);
        self.live -= 1;
        Ok(())
    }

    /// Marks every live region that never received a pixel and has no links
    /// as dead, returning how many were retired.
    ///
    /// Label rasters may skip identifiers; the gaps must not count as
    /// segments.
    pub fn retire_empty(&mut self) -> usize {
        let mut retired = 0;
        for region in &mut self.regions {
            if region.exists && region.area() == 0 && region.links.is_empty() {
                region.exists = false;
                retired += 1;
            }
        }
        self.live -= retired;
        retired
    }

    /// Follows the absorption chain from `id` to its end.
    ///
    /// Returns the live region now owning `id`'s pixels, or `None` when `id`
    /// was never absorbed (including unknown handles).
    #[must_use]
    pub fn final_absorbent(&self, id: RegionId) -> Option<RegionId> {
        let mut current = self.regions.get(id.index())?.absorbed_by?;
        while let Some(next) = self
            .regions
            .get(current.index())
            .and_then(|region| region.absorbed_by)
        {
            current = next;
        }
        Some(current)
    }

    /// Resolves `id` to the live region currently standing for it.
    #[must_use]
    pub fn resolve(&self, id: RegionId) -> RegionId {
        self.final_absorbent(id).unwrap_or(id)
    }

    /// Neighbour reachable through the cheapest edge, ties going to the
    /// older edge.
    #[must_use]
    pub fn nearest_neighbour(&self, id: RegionId) -> Option<RegionId> {
        let region = self.regions.get(id.index())?;
        region
            .links()
            .filter_map(|(neighbour, edge)| {
                self.edges
                    .get(edge.index())
                    .map(|record| (neighbour, record))
            })
            .min_by(|(_, a), (_, b)| {
                a.cost
                    .total_cmp(&b.cost)
                    .then_with(|| a.sequence.cmp(&b.sequence))
            })
            .map(|(neighbour, _)| neighbour)
    }

    /// Sum of areas over live regions.
    #[must_use]
    pub fn live_area(&self) -> u64 {
        self.regions
            .iter()
            .filter(|region| region.exists)
            .map(Region::area)
            .sum()
    }

    /// Verifies link symmetry, edge bookkeeping and liveness.
    ///
    /// # Errors
    /// Returns the first [`GraphInvariantViolation`] found.
    pub fn check_invariants(&self) -> Result<(), GraphInvariantViolation> {
        let mut live = 0;
        for (index, region) in self.regions.iter().enumerate() {
            let id = RegionId::new(index);
            if !region.exists {
                if !region.links.is_empty() {
                    return Err(GraphInvariantViolation::DeadWithLinks {
                        region: id,
                        degree: region.links.len(),
                    });
                }
                continue;
            }
            live += 1;
            for (&neighbour, &edge) in &region.links {
                self.check_link(id, neighbour, edge)?;
            }
        }
        if live != self.live {
            return Err(GraphInvariantViolation::LiveCount {
                reported: self.live,
                actual: live,
            });
        }
        Ok(())
    }

    fn check_link(
        &self,
        id: RegionId,
        neighbour: RegionId,
        edge: EdgeId,
    ) -> Result<(), GraphInvariantViolation> {
        let Some(other) = self.regions.get(neighbour.index()) else {
            return Err(GraphInvariantViolation::Asymmetric {
                region: id,
                neighbour,
                edge,
            });
        };
        if !other.exists {
            return Err(GraphInvariantViolation::DeadNeighbour {
                region: id,
                neighbour,
            });
        }
        if other.links.get(&id) != Some(&edge) {
            return Err(GraphInvariantViolation::Asymmetric {
                region: id,
                neighbour,
                edge,
            });
        }
        let (low, high) = if id < neighbour {
            (id, neighbour)
        } else {
            (neighbour, id)
        };
        let matches = self
            .edges
            .get(edge.index())
            .is_some_and(|record| !record.retired && record.left == low && record.right == high);
        if !matches {
            return Err(GraphInvariantViolation::EdgeMismatch {
                region: id,
                neighbour,
                edge,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
