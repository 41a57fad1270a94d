//! Replacing a block of columns with a finer (or coarser) lattice.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TILING_TOLERANCE;
use crate::error::FlowError;
use crate::grid_builder::{LatticeBuild, LatticeGrid, LatticeInputs};
use crate::network::FlowNetwork;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RefineOutcome {
    /// No column was fully inside the requested range; nothing changed.
    Empty,
    Refined {
        /// Region after snapping to the replaced columns' extents.
        start: Vec2,
        end: Vec2,
        replaced: usize,
        /// Water volume carried from the old columns into the new ones.
        volume: f64,
        build: LatticeBuild,
    },
}

impl RefineOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, RefineOutcome::Empty)
    }
}

impl FlowNetwork {
    /// Replace every column fully inside the rectangle spanned by `a` and `b`
    /// with a `resolution`-sided lattice over their combined extent.
    ///
    /// The replaced volume is spread evenly over the new columns and their
    /// former outside neighbours are stitched to the new boundary. All checks
    /// run before the network is modified.
    pub fn refine_region(
        &mut self,
        resolution: f32,
        a: Vec2,
        b: Vec2,
        inputs: &LatticeInputs,
    ) -> Result<RefineOutcome, FlowError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(FlowError::InvalidResolution(resolution));
        }

        let ids = self.columns_in_range(a, b);
        if ids.is_empty() {
            warn!(
                "Refine region ({}, {})..({}, {}) contains no whole column, nothing to do",
                a.x, a.y, b.x, b.y
            );
            return Ok(RefineOutcome::Empty);
        }

        let mut start = Vec2::splat(f32::INFINITY);
        let mut end = Vec2::splat(f32::NEG_INFINITY);
        let mut covered = 0.0_f64;
        for column in ids.iter().filter_map(|&id| self.columns.get(id)) {
            start = start.min(column.grid_coord());
            end = end.max(column.end());
            covered += column.area() as f64;
        }

        let grid = LatticeGrid::new(resolution, start, end)?;

        // The replaced columns must tile their bounding box exactly.
        let span = end - start;
        let bbox = span.x as f64 * span.y as f64;
        if (covered - bbox).abs() > bbox * TILING_TOLERANCE {
            return Err(FlowError::MalformedRegion {
                start,
                end,
                resolution,
            });
        }

        let (volume, stitch) = self.detach_columns(&ids);
        let mean_volume = (volume / grid.cell_count() as f64) as f32;
        let build = self.build_on_grid(&grid, mean_volume, &stitch, inputs);

        info!(
            "Refined ({}, {})..({}, {}) to resolution {}: {} columns replaced by {}, {} boundary neighbours stitched",
            start.x,
            start.y,
            end.x,
            end.y,
            resolution,
            ids.len(),
            build.columns_created,
            stitch.len()
        );

        Ok(RefineOutcome::Refined {
            start,
            end,
            replaced: ids.len(),
            volume,
            build,
        })
    }
}
