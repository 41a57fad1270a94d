//! Per-cell aggregation of site feature points.

use crate::column::CellAttributes;
use crate::config::DrainageParams;
use crate::grid_builder::LatticeGrid;
use crate::site_data::{FeatureKind, SiteFeatures};

#[derive(Debug, Clone, Copy, Default)]
struct CellTally {
    water: f32,
    greenery: f32,
    drains: f32,
}

/// Fold every feature point into the lattice cell containing it.
///
/// Returns one `CellAttributes` per cell (indexed by `LatticeGrid::flat_index`)
/// and the number of points that fell outside the lattice.
pub fn aggregate_features(
    grid: &LatticeGrid,
    features: &SiteFeatures,
    params: &DrainageParams,
    base_side_length: f32,
) -> (Vec<CellAttributes>, usize) {
    let mut tallies = vec![CellTally::default(); grid.cell_count()];
    let mut ignored = 0;

    for point in &features.points {
        let Some((i, j)) = grid.cell_of(point.position()) else {
            ignored += 1;
            continue;
        };
        let tally = &mut tallies[grid.flat_index(i, j)];
        match point.kind {
            FeatureKind::Water => tally.water += params.water_point_weight,
            FeatureKind::Greenery => tally.greenery += point.value,
            kind if kind.is_drain() => tally.drains += 1.0,
            _ => {}
        }
    }

    // Greenery values are expressed per reference patch of the base lattice.
    let patches = (base_side_length / params.soil_reference_side).powi(2);
    let patches = if patches.is_finite() && patches > 0.0 {
        patches
    } else {
        1.0
    };

    let cells = tallies
        .into_iter()
        .map(|t| CellAttributes {
            soil_percentage: t.greenery / patches,
            drain_count: t.drains,
            water_weight: t.water,
        })
        .collect();
    (cells, ignored)
}
