//! The authoritative column/pipe graph and the two-pass step over it.

use std::collections::{HashMap, HashSet};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnArena, ColumnId, LatticeKey};
use crate::config::{DrainageParams, FlowParams, HydroConfig, COORD_QUANTUM};
use crate::pipe::{PipeId, PipeRegistry};
use crate::rain_drain::{apply_rain_drain, RainDrainOutcome};
use crate::spatial_index::SpatialIndex;

/// Totals produced by one [`FlowNetwork::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub rain_drain: RainDrainOutcome,
    /// Sum of absolute volume moved through pipes.
    pub moved: f64,
}

/// Owns every column and pipe, the lattice-key lookup and the spatial index.
///
/// Lattices are added with `build_lattice` and replaced with `refine_region`
/// (see `grid_builder`). Neither may run while a step is in progress, which
/// holds trivially since all three take `&mut self`.
#[derive(Resource, Debug, Clone, Default)]
pub struct FlowNetwork {
    pub(crate) columns: ColumnArena,
    pub(crate) pipes: PipeRegistry,
    pub(crate) lookup: HashMap<LatticeKey, ColumnId>,
    pub(crate) index: SpatialIndex,
}

impl FlowNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    pub fn columns(&self) -> &ColumnArena {
        &self.columns
    }

    pub fn pipes(&self) -> &PipeRegistry {
        &self.pipes
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    #[inline]
    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id)
    }

    #[inline]
    pub fn column_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.columns.get_mut(id)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn pipe_count(&self) -> usize {
        self.pipes.len()
    }

    /// The column anchored exactly at `coord`.
    pub fn query_column(&self, coord: Vec2) -> Option<(ColumnId, &Column)> {
        let id = *self.lookup.get(&LatticeKey::from_world(coord))?;
        self.columns.get(id).map(|c| (id, c))
    }

    /// Columns fully inside the rectangle spanned by `a` and `b`, ascending (x, z).
    pub fn columns_in_range(&self, a: Vec2, b: Vec2) -> Vec<ColumnId> {
        self.index.columns_in_range(a, b)
    }

    pub fn total_volume(&self) -> f64 {
        self.columns.total_volume()
    }

    /// Distinct column side lengths currently in use, ascending.
    pub fn resolutions(&self) -> Vec<f32> {
        let mut widths: Vec<f32> = self.columns.iter().map(|(_, c)| c.width).collect();
        widths.sort_by(f32::total_cmp);
        widths.dedup_by(|a, b| (*a - *b).abs() < COORD_QUANTUM);
        widths
    }

    /// Ids of the columns at the other end of `id`'s pipes.
    pub fn neighbors(&self, id: ColumnId) -> Vec<ColumnId> {
        self.columns
            .get(id)
            .map(|c| {
                c.pipes
                    .iter()
                    .filter_map(|&p| self.pipes.get(p).map(|pipe| pipe.other(id)))
                    .collect()
            })
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Stepping
    // -------------------------------------------------------------------------

    /// Rain/drain pass over every column. Columns are independent here.
    pub fn rain_drain_pass(
        &mut self,
        dt: f32,
        rate_mm_per_h: f32,
        params: &DrainageParams,
    ) -> RainDrainOutcome {
        let mut total = RainDrainOutcome::default();
        for (_, column) in self.columns.iter_mut() {
            total.accumulate(&apply_rain_drain(column, rate_mm_per_h, dt, params));
        }
        total
    }

    /// Flow pass: every pipe once, in elevation order.
    pub fn flow_pass(&mut self, dt: f32, params: &FlowParams) -> f64 {
        self.pipes.resolve_flow(&mut self.columns, dt, params)
    }

    /// Advance by `dt` simulated hours with the given weather rate.
    pub fn step(&mut self, dt: f32, rate_mm_per_h: f32, config: &HydroConfig) -> StepReport {
        let rain_drain = self.rain_drain_pass(dt, rate_mm_per_h, &config.drainage);
        let moved = self.flow_pass(dt, &config.flow);
        StepReport { rain_drain, moved }
    }

    // -------------------------------------------------------------------------
    // External rainfall
    // -------------------------------------------------------------------------

    /// Add `rate_mm_per_h` of extra rainfall to every column fully inside the
    /// rectangle. Returns the number of columns affected.
    pub fn inject_rainfall(&mut self, a: Vec2, b: Vec2, rate_mm_per_h: f32) -> usize {
        let ids = self.columns_in_range(a, b);
        for &id in &ids {
            if let Some(column) = self.columns.get_mut(id) {
                column.injected_rainfall = (column.injected_rainfall + rate_mm_per_h).max(0.0);
            }
        }
        ids.len()
    }

    pub fn clear_injected_rainfall(&mut self) {
        for (_, column) in self.columns.iter_mut() {
            column.injected_rainfall = 0.0;
        }
    }

    // -------------------------------------------------------------------------
    // Topology (used by grid_builder)
    // -------------------------------------------------------------------------

    pub(crate) fn connect(&mut self, a: ColumnId, b: ColumnId) -> Option<PipeId> {
        if a == b || !self.columns.contains(a) || !self.columns.contains(b) {
            return None;
        }
        let id = self.pipes.insert(a, b);
        for end in [a, b] {
            if let Some(column) = self.columns.get_mut(end) {
                column.pipes.push(id);
            }
        }
        Some(id)
    }

    pub(crate) fn add_column(&mut self, column: Column) -> ColumnId {
        let key = column.key();
        let id = self.columns.insert(column);
        self.lookup.insert(key, id);
        id
    }

    /// Remove `ids` and every pipe touching them. Returns the removed volume
    /// and the surviving columns that lost a pipe, in first-seen order.
    pub(crate) fn detach_columns(&mut self, ids: &[ColumnId]) -> (f64, Vec<ColumnId>) {
        let removed: HashSet<ColumnId> = ids.iter().copied().collect();
        let mut seen = HashSet::new();
        let mut boundary = Vec::new();
        let mut volume = 0.0_f64;

        for &id in ids {
            let Some(column) = self.columns.remove(id) else {
                continue;
            };
            volume += column.water_volume as f64;
            if self.lookup.get(&column.key()) == Some(&id) {
                self.lookup.remove(&column.key());
            }
            for pipe_id in column.pipes {
                let Some(pipe) = self.pipes.remove(pipe_id) else {
                    continue;
                };
                let other = pipe.other(id);
                if let Some(neighbor) = self.columns.get_mut(other) {
                    neighbor.pipes.retain(|&p| p != pipe_id);
                }
                if !removed.contains(&other) && seen.insert(other) {
                    boundary.push(other);
                }
            }
        }

        self.index.remove_all(&removed);
        (volume, boundary)
    }

    /// Re-sort the spatial index and the pipe processing order.
    pub(crate) fn reorder(&mut self) {
        self.index.sort();
        self.pipes.sort_by_elevation(&self.columns);
    }
}
