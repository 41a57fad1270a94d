//! Sorted coordinate index for rectangular "fully contained" queries.
//!
//! Entries are kept ordered by lattice key (x, then z). A query seeks to the
//! first entry whose x can still fall inside the rectangle, scans while x stays
//! within it, and keeps only columns whose whole box lies inside.

use std::collections::HashSet;

use bevy::math::Vec2;

use crate::column::{Column, ColumnId, LatticeKey};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexEntry {
    pub start: LatticeKey,
    pub end: LatticeKey,
    pub id: ColumnId,
}

impl IndexEntry {
    pub fn new(id: ColumnId, column: &Column) -> Self {
        Self {
            start: column.key(),
            end: LatticeKey::from_world(column.end()),
            id,
        }
    }
}

// =============================================================================
// Predicates
// =============================================================================

/// Seek predicate: `true` while an entry lies strictly before the query range
/// and therefore no entry at or before it can be contained.
///
/// Only the primary axis is monotone under the (x, z) ordering, so this is the
/// relaxed test used to position the scan, never to accept a column.
#[inline]
pub fn precedes_range(entry: LatticeKey, range_start: LatticeKey) -> bool {
    entry.x < range_start.x
}

/// Scan predicate: `true` while an entry may still lie inside the range.
#[inline]
pub fn may_reach(entry: LatticeKey, range_end: LatticeKey) -> bool {
    entry.x <= range_end.x
}

/// Strict containment: both corners of the box lie componentwise in
/// `[range_start, range_end]`.
#[inline]
pub fn is_contained(entry: &IndexEntry, range_start: LatticeKey, range_end: LatticeKey) -> bool {
    entry.start.x >= range_start.x
        && entry.start.z >= range_start.z
        && entry.end.x <= range_end.x
        && entry.end.z <= range_end.z
}

/// Componentwise min/max of two corners.
pub fn normalize_range(a: Vec2, b: Vec2) -> (Vec2, Vec2) {
    (a.min(b), a.max(b))
}

// =============================================================================
// SpatialIndex
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    entries: Vec<IndexEntry>,
    sorted: bool,
}

impl SpatialIndex {
    /// Append an entry. The index must be [`sort`](Self::sort)ed before the
    /// next query.
    pub fn insert(&mut self, id: ColumnId, column: &Column) {
        self.entries.push(IndexEntry::new(id, column));
        self.sorted = false;
    }

    pub fn remove_all(&mut self, ids: &HashSet<ColumnId>) {
        self.entries.retain(|e| !ids.contains(&e.id));
    }

    pub fn sort(&mut self) {
        self.entries.sort_by_key(|e| (e.start, e.id));
        self.sorted = true;
    }

    #[inline]
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending (x, z) order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Ids of every column whose `[grid_coord, end]` box lies entirely inside
    /// the rectangle spanned by `a` and `b`, in ascending (x, z) order.
    pub fn columns_in_range(&self, a: Vec2, b: Vec2) -> Vec<ColumnId> {
        debug_assert!(self.sorted, "spatial index queried before sort");
        let (start, end) = normalize_range(a, b);
        let start = LatticeKey::from_world(start);
        let end = LatticeKey::from_world(end);

        let first = self
            .entries
            .partition_point(|e| precedes_range(e.start, start));

        self.entries[first..]
            .iter()
            .take_while(|e| may_reach(e.start, end))
            .filter(|e| is_contained(e, start, end))
            .map(|e| e.id)
            .collect()
    }
}
