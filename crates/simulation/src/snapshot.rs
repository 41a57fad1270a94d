//! Per-tick outputs: the water surface snapshot consumed by visualisation and
//! aggregate flood statistics.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::column::ColumnId;
use crate::config::FLOOD_DEPTH_THRESHOLD;
use crate::driver::{HydroClock, LastStepReport};
use crate::network::FlowNetwork;
use crate::simulation_sets::SimulationSet;
use crate::TickCounter;

// =============================================================================
// WaterSnapshot
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnSample {
    pub id: ColumnId,
    /// Anchor (minimum x, minimum z) corner.
    pub coord: Vec2,
    pub width: f32,
    pub water_depth: f32,
    pub water_surface_height: f32,
}

/// Water state of every live column, in spatial-index order.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaterSnapshot {
    pub tick: u64,
    pub samples: Vec<ColumnSample>,
}

impl WaterSnapshot {
    pub fn capture(network: &FlowNetwork, tick: u64) -> Self {
        let samples = network
            .index()
            .entries()
            .iter()
            .filter_map(|entry| {
                let column = network.column(entry.id)?;
                Some(ColumnSample {
                    id: entry.id,
                    coord: column.grid_coord(),
                    width: column.width,
                    water_depth: column.water_depth(),
                    water_surface_height: column.water_surface_height(),
                })
            })
            .collect();
        Self { tick, samples }
    }

    /// The sample whose column box contains `point` (half-open).
    pub fn sample_at(&self, point: Vec2) -> Option<&ColumnSample> {
        self.samples.iter().find(|s| {
            let end = s.coord + Vec2::splat(s.width);
            point.x >= s.coord.x && point.x < end.x && point.y >= s.coord.y && point.y < end.y
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// =============================================================================
// FlowStats
// =============================================================================

/// Aggregate flood statistics, refreshed every tick.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct FlowStats {
    pub total_volume: f64,
    pub max_depth: f32,
    /// Columns deeper than `flood_depth_threshold`.
    pub flooded_columns: usize,
    pub flood_depth_threshold: f32,
    pub cumulative_rain: f64,
    pub cumulative_drained: f64,
    pub cumulative_soaked: f64,
    pub cumulative_water_body: f64,
    pub column_count: usize,
    pub pipe_count: usize,
    pub hours_passed: u32,
}

impl Default for FlowStats {
    fn default() -> Self {
        Self {
            total_volume: 0.0,
            max_depth: 0.0,
            flooded_columns: 0,
            flood_depth_threshold: FLOOD_DEPTH_THRESHOLD,
            cumulative_rain: 0.0,
            cumulative_drained: 0.0,
            cumulative_soaked: 0.0,
            cumulative_water_body: 0.0,
            column_count: 0,
            pipe_count: 0,
            hours_passed: 0,
        }
    }
}

impl FlowStats {
    /// Recompute the instantaneous fields from `network`.
    pub fn refresh(&mut self, network: &FlowNetwork) {
        let mut max_depth = 0.0f32;
        let mut flooded = 0;
        for (_, column) in network.columns().iter() {
            let depth = column.water_depth();
            max_depth = max_depth.max(depth);
            if depth > self.flood_depth_threshold {
                flooded += 1;
            }
        }
        self.total_volume = network.total_volume();
        self.max_depth = max_depth;
        self.flooded_columns = flooded;
        self.column_count = network.column_count();
        self.pipe_count = network.pipe_count();
    }

    /// Total water removed from the surface so far.
    pub fn cumulative_outflow(&self) -> f64 {
        self.cumulative_drained + self.cumulative_soaked + self.cumulative_water_body
    }
}

// =============================================================================
// Systems
// =============================================================================

pub fn update_water_snapshot(
    network: Res<FlowNetwork>,
    tick: Res<TickCounter>,
    mut snapshot: ResMut<WaterSnapshot>,
) {
    *snapshot = WaterSnapshot::capture(&network, tick.0);
}

pub fn update_flow_stats(
    network: Res<FlowNetwork>,
    clock: Res<HydroClock>,
    report: Res<LastStepReport>,
    mut stats: ResMut<FlowStats>,
) {
    if !clock.halted {
        let outcome = &report.0.rain_drain;
        stats.cumulative_rain += outcome.rain as f64;
        stats.cumulative_drained += outcome.drained as f64;
        stats.cumulative_soaked += outcome.soaked as f64;
        stats.cumulative_water_body += outcome.water_body as f64;
    }
    stats.hours_passed = clock.hours_passed;
    stats.refresh(&network);
}

pub struct SnapshotPlugin;

impl Plugin for SnapshotPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WaterSnapshot>()
            .init_resource::<FlowStats>()
            .add_systems(
                FixedUpdate,
                (update_water_snapshot, update_flow_stats).in_set(SimulationSet::PostSim),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;

    fn network_with_depths(depths: &[f32]) -> FlowNetwork {
        let mut net = FlowNetwork::new();
        for (i, &depth) in depths.iter().enumerate() {
            let anchor = Vec2::new(i as f32 * 10.0, 0.0);
            let column = Column::new(anchor, 1.0, 10.0, depth * 100.0);
            let id = net.add_column(column.clone());
            net.index.insert(id, &column);
        }
        net.reorder();
        net
    }

    #[test]
    fn test_snapshot_in_index_order() {
        let net = network_with_depths(&[0.5, 0.0, 2.0]);
        let snap = WaterSnapshot::capture(&net, 7);
        assert_eq!(snap.tick, 7);
        assert_eq!(snap.len(), 3);
        let xs: Vec<f32> = snap.samples.iter().map(|s| s.coord.x).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0]);
        assert!((snap.samples[2].water_depth - 2.0).abs() < 1e-6);
        assert!((snap.samples[2].water_surface_height - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_at_half_open() {
        let net = network_with_depths(&[0.5, 1.0]);
        let snap = WaterSnapshot::capture(&net, 0);
        let hit = snap.sample_at(Vec2::new(10.0, 5.0)).map(|s| s.coord.x);
        assert_eq!(hit, Some(10.0));
        assert!(snap.sample_at(Vec2::new(20.0, 5.0)).is_none());
    }

    #[test]
    fn test_stats_refresh() {
        let net = network_with_depths(&[0.005, 0.02, 1.5]);
        let mut stats = FlowStats::default();
        stats.refresh(&net);
        assert_eq!(stats.flooded_columns, 2);
        assert!((stats.max_depth - 1.5).abs() < 1e-6);
        assert!((stats.total_volume - 152.5).abs() < 1e-3);
        assert_eq!(stats.column_count, 3);
        assert_eq!(stats.pipe_count, 0);
    }

    #[test]
    fn test_cumulative_outflow() {
        let stats = FlowStats {
            cumulative_drained: 1.0,
            cumulative_soaked: 2.0,
            cumulative_water_body: 3.5,
            ..Default::default()
        };
        assert_eq!(stats.cumulative_outflow(), 6.5);
    }
}
