//! Lattice construction and multi-resolution refinement.
//!
//! `build_lattice` tiles a rectangle with square columns of one side length,
//! aggregates site features into per-cell capacities, links 8-connected pipes
//! to existing same-resolution neighbours and, when given stitch neighbours
//! from another resolution, links boundary columns to every neighbour whose box
//! touches theirs. `refine_region` swaps a block of columns for a finer lattice
//! carrying the same total volume.
//!
//! Lattices are half-open: `[start, end)` on both axes, anchors at
//! `start + (i, j) * resolution`.

pub mod aggregate;
pub mod refine;

mod tests;

pub use aggregate::aggregate_features;
pub use refine::RefineOutcome;

use std::collections::HashSet;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnId, LatticeKey};
use crate::config::{DrainageParams, COORD_QUANTUM, LATTICE_STEP_TOLERANCE};
use crate::error::FlowError;
use crate::network::FlowNetwork;
use crate::site_data::SiteFeatures;
use crate::terrain::TerrainSampler;

// =============================================================================
// Inputs and results
// =============================================================================

/// External collaborators consulted while building columns.
#[derive(Clone, Copy)]
pub struct LatticeInputs<'a> {
    pub terrain: &'a dyn TerrainSampler,
    pub features: &'a SiteFeatures,
    pub drainage: &'a DrainageParams,
    /// Side length greenery values are normalised against.
    pub base_side_length: f32,
}

/// Summary of one lattice build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeBuild {
    pub columns_created: usize,
    /// All pipes created, stitched ones included.
    pub pipes_created: usize,
    pub stitched_pipes: usize,
    /// Lattice points already occupied by a live column.
    pub skipped_occupied: usize,
    /// Feature points outside the lattice.
    pub points_ignored: usize,
}

// =============================================================================
// LatticeGrid
// =============================================================================

/// Validated geometry of a rectangular lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeGrid {
    pub start: Vec2,
    pub resolution: f32,
    pub nx: u32,
    pub nz: u32,
}

/// `n` rounded to a whole step count, if it is one (and at least 1).
fn whole_steps(n: f32) -> Option<u32> {
    let rounded = n.round();
    if !n.is_finite() || rounded < 1.0 || (n - rounded).abs() > LATTICE_STEP_TOLERANCE {
        return None;
    }
    Some(rounded as u32)
}

impl LatticeGrid {
    pub fn new(resolution: f32, start: Vec2, end: Vec2) -> Result<Self, FlowError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(FlowError::InvalidResolution(resolution));
        }
        let malformed = || FlowError::MalformedRegion {
            start,
            end,
            resolution,
        };
        if !start.is_finite() || !end.is_finite() {
            return Err(malformed());
        }
        let steps = (end - start) / resolution;
        let nx = whole_steps(steps.x).ok_or_else(malformed)?;
        let nz = whole_steps(steps.y).ok_or_else(malformed)?;
        Ok(Self {
            start,
            resolution,
            nx,
            nz,
        })
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.nx as usize * self.nz as usize
    }

    /// Anchor of cell `(i, j)`. Indices outside the lattice extrapolate.
    #[inline]
    pub fn anchor(&self, i: i64, j: i64) -> Vec2 {
        Vec2::new(
            self.start.x + i as f32 * self.resolution,
            self.start.y + j as f32 * self.resolution,
        )
    }

    pub fn end(&self) -> Vec2 {
        self.anchor(self.nx as i64, self.nz as i64)
    }

    /// Cell whose half-open box contains `point`.
    pub fn cell_of(&self, point: Vec2) -> Option<(u32, u32)> {
        let local = (point - self.start) / self.resolution;
        if !local.is_finite() || local.x < 0.0 || local.y < 0.0 {
            return None;
        }
        let (i, j) = (local.x.floor() as u64, local.y.floor() as u64);
        if i >= self.nx as u64 || j >= self.nz as u64 {
            return None;
        }
        Some((i as u32, j as u32))
    }

    #[inline]
    pub fn flat_index(&self, i: u32, j: u32) -> usize {
        i as usize * self.nz as usize + j as usize
    }

    #[inline]
    pub fn is_boundary(&self, i: u32, j: u32) -> bool {
        i == 0 || j == 0 || i + 1 == self.nx || j + 1 == self.nz
    }
}

/// Closed boxes share an edge segment or a corner without overlapping interiors.
pub fn boxes_touch(a: (LatticeKey, LatticeKey), b: (LatticeKey, LatticeKey)) -> bool {
    let overlap_x = a.1.x.min(b.1.x) - a.0.x.max(b.0.x);
    let overlap_z = a.1.z.min(b.1.z) - a.0.z.max(b.0.z);
    overlap_x >= 0 && overlap_z >= 0 && (overlap_x == 0 || overlap_z == 0)
}

// =============================================================================
// Building
// =============================================================================

impl FlowNetwork {
    /// Build a lattice of `resolution`-sided columns over `[start, end)`.
    ///
    /// Occupied lattice points are skipped. Boundary columns are linked to any
    /// `stitch` neighbour whose box touches theirs. Fails before touching the
    /// network if the resolution or region is invalid.
    pub fn build_lattice(
        &mut self,
        resolution: f32,
        start: Vec2,
        end: Vec2,
        initial_volume: f32,
        stitch: &[ColumnId],
        inputs: &LatticeInputs,
    ) -> Result<LatticeBuild, FlowError> {
        let grid = LatticeGrid::new(resolution, start, end)?;
        Ok(self.build_on_grid(&grid, initial_volume, stitch, inputs))
    }

    pub(crate) fn build_on_grid(
        &mut self,
        grid: &LatticeGrid,
        initial_volume: f32,
        stitch: &[ColumnId],
        inputs: &LatticeInputs,
    ) -> LatticeBuild {
        let (cells, points_ignored) = aggregate_features(
            grid,
            inputs.features,
            inputs.drainage,
            inputs.base_side_length,
        );
        if points_ignored > 0 {
            debug!(
                "{} feature points outside the {}x{} lattice at {} were ignored",
                points_ignored, grid.nx, grid.nz, grid.resolution
            );
        }

        let mut seen = HashSet::new();
        let stitch_boxes: Vec<(ColumnId, (LatticeKey, LatticeKey))> = stitch
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|&id| {
                self.columns
                    .get(id)
                    .map(|c| (id, (c.key(), LatticeKey::from_world(c.end()))))
            })
            .collect();

        let mut build = LatticeBuild {
            points_ignored,
            ..Default::default()
        };

        for i in 0..grid.nx {
            for j in 0..grid.nz {
                let anchor = grid.anchor(i as i64, j as i64);
                let key = LatticeKey::from_world(anchor);
                if self.lookup.contains_key(&key) {
                    build.skipped_occupied += 1;
                    continue;
                }

                let height = inputs.terrain.height_at(anchor.x, anchor.y);
                let column = Column::new(anchor, height, grid.resolution, initial_volume)
                    .with_attributes(&cells[grid.flat_index(i, j)], inputs.drainage);
                let id = self.add_column(column);
                build.columns_created += 1;

                // Same-resolution Moore neighbourhood.
                for dz in -1..=1_i64 {
                    for dx in -1..=1_i64 {
                        if dx == 0 && dz == 0 {
                            continue;
                        }
                        let neighbor = grid.anchor(i as i64 + dx, j as i64 + dz);
                        let Some(&nid) = self.lookup.get(&LatticeKey::from_world(neighbor)) else {
                            continue;
                        };
                        let same_resolution = self
                            .columns
                            .get(nid)
                            .is_some_and(|n| (n.width - grid.resolution).abs() < COORD_QUANTUM);
                        if same_resolution && self.connect(id, nid).is_some() {
                            build.pipes_created += 1;
                        }
                    }
                }

                if !stitch_boxes.is_empty() && grid.is_boundary(i, j) {
                    let own = (key, LatticeKey::from_world(anchor + Vec2::splat(grid.resolution)));
                    for &(nid, bounds) in &stitch_boxes {
                        if boxes_touch(own, bounds)
                            && !self.is_connected(id, nid)
                            && self.connect(id, nid).is_some()
                        {
                            build.pipes_created += 1;
                            build.stitched_pipes += 1;
                        }
                    }
                }

                if let Some(column) = self.columns.get(id) {
                    self.index.insert(id, column);
                }
            }
        }

        self.reorder();
        info!(
            "Built {}x{} lattice at resolution {}: {} columns, {} pipes ({} stitched), {} occupied points skipped",
            grid.nx,
            grid.nz,
            grid.resolution,
            build.columns_created,
            build.pipes_created,
            build.stitched_pipes,
            build.skipped_occupied
        );
        build
    }

    fn is_connected(&self, a: ColumnId, b: ColumnId) -> bool {
        self.neighbors(a).contains(&b)
    }
}
