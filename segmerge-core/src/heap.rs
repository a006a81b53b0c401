//! Bounded-degree (8-ary) min-heap of merge edges.
//!
//! Entries live in one dense array. Every edge handle maps to its current
//! array slot through a side table, so removing or re-costing an arbitrary
//! edge is `O(log_8 n)` without a search. The array is sized once from the
//! initial edge count and never grows: a region merge always retires at
//! least as many edges as it creates.
//!
//! Ordering is by cost, then by insertion sequence, which makes pops
//! deterministic when costs tie.

use std::{cmp::Ordering, fmt};

use thiserror::Error;

use crate::error::HeapError;

/// Number of children per heap node.
pub const HEAP_ARITY: usize = 8;

/// Stable handle naming one edge of the region graph.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EdgeId(usize);

impl EdgeId {
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

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A queued edge together with its ordering key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeapEntry {
    edge: EdgeId,
    cost: f64,
    sequence: u64,
}

impl HeapEntry {
    /// Builds an entry for `edge` with the given cost and tie-break sequence.
    #[must_use]
    pub const fn new(edge: EdgeId, cost: f64, sequence: u64) -> Self {
        Self {
            edge,
            cost,
            sequence,
        }
    }

    /// Returns the queued edge.
    #[must_use]
    #[rustfmt::skip]
    pub fn edge(&self) -> EdgeId { self.edge }

    /// Returns the merge cost.
    #[must_use]
    #[rustfmt::skip]
    pub fn cost(&self) -> f64 { self.cost }

    /// Returns the insertion sequence used to break ties.
    #[must_use]
    #[rustfmt::skip]
    pub fn sequence(&self) -> u64 { self.sequence }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }

    fn precedes(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Less
    }
}

/// Reports a broken heap property found by [`EdgeHeap::check_invariants`].
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum HeapInvariantViolation {
    /// A child sorts before its parent.
    #[error("slot {child} (cost {child_cost}) sorts before its parent slot {parent} (cost {parent_cost})")]
    Order {
        /// Parent slot index.
        parent: usize,
        /// Child slot index.
        child: usize,
        /// Parent cost.
        parent_cost: f64,
        /// Child cost.
        child_cost: f64,
    },
    /// The side table disagrees with the array about where an edge lives.
    #[error("edge {edge} sits in slot {actual} but the slot table records {recorded:?}")]
    SlotTable {
        /// Edge whose slot is out of sync.
        edge: EdgeId,
        /// Slot the edge actually occupies.
        actual: usize,
        /// Slot recorded for the edge.
        recorded: Option<usize>,
    },
    /// The side table references more edges than the heap holds.
    #[error("slot table tracks {tracked} edges but the heap holds {len}")]
    StaleSlots {
        /// Entries with a recorded slot.
        tracked: usize,
        /// Heap length.
        len: usize,
    },
}

/// Fixed-capacity 8-ary min-heap keyed by edge cost.
///
/// # Examples
/// ```
/// use segmerge_core::{EdgeHeap, EdgeId};
///
/// let mut heap = EdgeHeap::with_capacity(3);
/// heap.push(EdgeId::new(0), 2.0, 0)?;
/// heap.push(EdgeId::new(1), 1.0, 1)?;
/// heap.push(EdgeId::new(2), 1.0, 2)?;
/// heap.update(EdgeId::new(0), 0.5)?;
/// assert_eq!(heap.pop().map(|entry| entry.edge()), Some(EdgeId::new(0)));
/// assert_eq!(heap.pop().map(|entry| entry.edge()), Some(EdgeId::new(1)));
/// # Ok::<(), segmerge_core::HeapError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct EdgeHeap {
    entries: Vec<HeapEntry>,
    slots: Vec<Option<usize>>,
    capacity: usize,
}

impl EdgeHeap {
    /// Creates an empty heap that can hold up to `capacity` edges.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of queued edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no edge is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of edges the heap accepts.
    #[must_use]
    #[rustfmt::skip]
    pub fn capacity(&self) -> usize { self.capacity }

    /// Returns `true` when `edge` is currently queued.
    #[must_use]
    pub fn contains(&self, edge: EdgeId) -> bool {
        self.slot_of(edge).is_some()
    }

    /// Peeks at the cheapest entry.
    #[must_use]
    pub fn top(&self) -> Option<HeapEntry> {
        self.entries.first().copied()
    }

    /// Returns the queued cost of `edge`.
    #[must_use]
    pub fn cost_of(&self, edge: EdgeId) -> Option<f64> {
        self.slot_of(edge)
            .and_then(|slot| self.entries.get(slot))
            .map(HeapEntry::cost)
    }

    /// Queues `edge` with the given cost and tie-break sequence.
    ///
    /// # Errors
    /// Returns [`HeapError::CapacityExceeded`] when the heap is full and
    /// [`HeapError::AlreadyQueued`] when `edge` is already present.
    pub fn push(&mut self, edge: EdgeId, cost: f64, sequence: u64) -> Result<(), HeapError> {
        if self.contains(edge) {
            return Err(HeapError::AlreadyQueued { edge });
        }
        if self.entries.len() >= self.capacity {
            return Err(HeapError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let slot = self.entries.len();
        self.entries.push(HeapEntry::new(edge, cost, sequence));
        self.record_slot(edge, Some(slot));
        self.sift_up(slot);
        Ok(())
    }

    /// Removes and returns the cheapest entry.
    pub fn pop(&mut self) -> Option<HeapEntry> {
        let top = self.top()?;
        self.remove_slot(0);
        Some(top)
    }

    /// Removes `edge` wherever it sits in the heap.
    ///
    /// # Errors
    /// Returns [`HeapError::NotQueued`] when `edge` is not present.
    pub fn remove(&mut self, edge: EdgeId) -> Result<HeapEntry, HeapError> {
        let slot = self.slot_of(edge).ok_or(HeapError::NotQueued { edge })?;
        let entry = self.entries[slot];
        self.remove_slot(slot);
        Ok(entry)
    }

    /// Re-costs `edge` in place and restores the heap order.
    ///
    /// # Errors
    /// Returns [`HeapError::NotQueued`] when `edge` is not present.
    pub fn update(&mut self, edge: EdgeId, cost: f64) -> Result<(), HeapError> {
        let slot = self.slot_of(edge).ok_or(HeapError::NotQueued { edge })?;
        let previous = self.entries[slot];
        self.entries[slot].cost = cost;
        if self.entries[slot].precedes(&previous) {
            self.sift_up(slot);
        } else {
            self.sift_down(slot);
        }
        Ok(())
    }

    /// Iterates over queued entries in array order.
    pub fn iter(&self) -> impl Iterator<Item = &HeapEntry> {
        self.entries.iter()
    }

    /// Verifies the heap order and the slot side table.
    ///
    /// # Errors
    /// Returns the first [`HeapInvariantViolation`] encountered.
    pub fn check_invariants(&self) -> Result<(), HeapInvariantViolation> {
        for (child, entry) in self.entries.iter().enumerate().skip(1) {
            let parent = parent_of(child);
            let parent_entry = &self.entries[parent];
            if entry.precedes(parent_entry) {
                return Err(HeapInvariantViolation::Order {
                    parent,
                    child,
                    parent_cost: parent_entry.cost,
                    child_cost: entry.cost,
                });
            }
        }
        for (actual, entry) in self.entries.iter().enumerate() {
            let recorded = self.slot_of(entry.edge);
            if recorded != Some(actual) {
                return Err(HeapInvariantViolation::SlotTable {
                    edge: entry.edge,
                    actual,
                    recorded,
                });
            }
        }
        let tracked = self.slots.iter().filter(|slot| slot.is_some()).count();
        if tracked != self.entries.len() {
            return Err(HeapInvariantViolation::StaleSlots {
                tracked,
                len: self.entries.len(),
            });
        }
        Ok(())
    }

    fn slot_of(&self, edge: EdgeId) -> Option<usize> {
        self.slots.get(edge.index()).copied().flatten()
    }

    fn record_slot(&mut self, edge: EdgeId, slot: Option<usize>) {
        let index = edge.index();
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = slot;
    }

    /// Writes `entry` into `slot` and keeps the side table in sync.
    fn place(&mut self, slot: usize, entry: HeapEntry) {
        self.entries[slot] = entry;
        self.record_slot(entry.edge, Some(slot));
    }

    fn remove_slot(&mut self, slot: usize) {
        let removed = self.entries[slot];
        self.record_slot(removed.edge, None);
        let Some(last) = self.entries.pop() else {
            return;
        };
        if slot == self.entries.len() {
            return;
        }
        self.place(slot, last);
        if last.precedes(&removed) {
            self.sift_up(slot);
        } else {
            self.sift_down(slot);
        }
    }

    fn sift_up(&mut self, mut slot: usize) {
        let entry = self.entries[slot];
        while slot > 0 {
            let parent = parent_of(slot);
            let parent_entry = self.entries[parent];
            if !entry.precedes(&parent_entry) {
                break;
            }
            self.place(slot, parent_entry);
            slot = parent;
        }
        self.place(slot, entry);
    }

    fn sift_down(&mut self, mut slot: usize) {
        let entry = self.entries[slot];
        let len = self.entries.len();
        loop {
            let first_child = slot * HEAP_ARITY + 1;
            if first_child >= len {
                break;
            }
            let last_child = (first_child + HEAP_ARITY).min(len);
            let mut best = first_child;
            for child in (first_child + 1)..last_child {
                if self.entries[child].precedes(&self.entries[best]) {
                    best = child;
                }
            }
            let best_entry = self.entries[best];
            if !best_entry.precedes(&entry) {
                break;
            }
            self.place(slot, best_entry);
            slot = best;
        }
        self.place(slot, entry);
    }
}

const fn parent_of(slot: usize) -> usize {
    (slot - 1) / HEAP_ARITY
}
