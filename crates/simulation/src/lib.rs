//! Multi-resolution overland flow simulation.
//!
//! The catchment is tiled with square water columns joined by virtual pipes.
//! Each fixed tick applies rainfall and drainage per column, then resolves
//! pipe flow in descending elevation order. Regions can be refined to a finer
//! lattice at runtime without losing water.

use bevy::prelude::*;

pub mod column;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod grid_builder;
pub mod network;
pub mod pipe;
pub mod rain_drain;
pub mod simulation_sets;
pub mod site_data;
pub mod snapshot;
pub mod spatial_index;
pub mod terrain;
pub mod weather;
pub mod world_init;

#[cfg(any(test, feature = "bench"))]
pub mod test_harness;

pub use column::{Column, ColumnId, LatticeKey};
pub use config::HydroConfig;
pub use error::FlowError;
pub use network::{FlowNetwork, StepReport};
pub use simulation_sets::SimulationSet;

// ---------------------------------------------------------------------------
// Core resources
// ---------------------------------------------------------------------------

/// Fixed ticks run since startup.
#[derive(Resource, Default)]
pub struct TickCounter(pub u64);

pub fn tick_counter(mut tick: ResMut<TickCounter>) {
    tick.0 = tick.0.wrapping_add(1);
}

/// Registers the flow network, its inputs and every hydrology system.
///
/// Resources inserted before the plugin is added (config, terrain, site
/// features, rainfall) are kept; missing ones fall back to their defaults.
pub struct HydrologyPlugin;

impl Plugin for HydrologyPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TickCounter>()
            .init_resource::<HydroConfig>()
            .init_resource::<FlowNetwork>()
            .init_resource::<terrain::Terrain>()
            .init_resource::<site_data::SiteFeatures>()
            .init_resource::<weather::RainfallSeries>()
            .configure_sets(
                FixedUpdate,
                (
                    SimulationSet::PreSim,
                    SimulationSet::Simulation,
                    SimulationSet::PostSim,
                )
                    .chain(),
            )
            .add_systems(Startup, world_init::init_network)
            .add_systems(FixedUpdate, tick_counter.in_set(SimulationSet::PreSim));

        app.add_plugins((driver::DriverPlugin, snapshot::SnapshotPlugin));
    }
}
