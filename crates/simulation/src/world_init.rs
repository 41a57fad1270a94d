// =============================================================================
// Network initialisation: base lattice over the site area plus the optional
// detailed region.
// =============================================================================

use bevy::prelude::*;

use crate::config::HydroConfig;
use crate::error::FlowError;
use crate::grid_builder::{LatticeInputs, RefineOutcome};
use crate::network::FlowNetwork;
use crate::site_data::SiteFeatures;
use crate::terrain::{Terrain, TerrainSampler};

/// Marker resource that, when present, causes `init_network` to leave the
/// `FlowNetwork` untouched. Used by the test harness to build its own lattice.
#[derive(Resource)]
pub struct SkipNetworkInit;

/// Build the network described by `config.resolution`, starting dry.
pub fn build_network(
    config: &HydroConfig,
    terrain: &dyn TerrainSampler,
    features: &SiteFeatures,
) -> Result<FlowNetwork, FlowError> {
    let res = &config.resolution;
    let inputs = LatticeInputs {
        terrain,
        features,
        drainage: &config.drainage,
        base_side_length: res.base_side_length,
    };

    let mut network = FlowNetwork::new();
    network.build_lattice(
        res.base_side_length,
        res.area_start,
        res.area_end,
        0.0,
        &[],
        &inputs,
    )?;

    if res.multi_resolution {
        let outcome = network.refine_region(
            res.detailed_side_length,
            res.detailed_start,
            res.detailed_end,
            &inputs,
        )?;
        if let RefineOutcome::Refined { replaced, .. } = outcome {
            debug!("Detailed region replaced {replaced} base columns");
        }
    }

    Ok(network)
}

pub fn init_network(
    mut network: ResMut<FlowNetwork>,
    config: Res<HydroConfig>,
    terrain: Res<Terrain>,
    features: Res<SiteFeatures>,
    skip: Option<Res<SkipNetworkInit>>,
    mut exit: EventWriter<AppExit>,
) {
    if skip.is_some() {
        return;
    }
    match build_network(&config, terrain.0.as_ref(), &features) {
        Ok(built) => {
            info!(
                "Flow network ready: {} columns, {} pipes, resolutions {:?}",
                built.column_count(),
                built.pipe_count(),
                built.resolutions()
            );
            *network = built;
        }
        Err(err) => {
            error!("Failed to build flow network: {err}");
            exit.send(AppExit::error());
        }
    }
}
