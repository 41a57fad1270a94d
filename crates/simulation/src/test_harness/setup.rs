//! Builder methods for lattice, weather and site setup.

use bevy::prelude::*;

use crate::config::{DrainageParams, HydroConfig};
use crate::events::{ClearInjectedRainfall, InjectRainfall, RefineRegionRequest};
use crate::grid_builder::{LatticeBuild, LatticeInputs, RefineOutcome};
use crate::network::FlowNetwork;
use crate::site_data::SiteFeatures;
use crate::terrain::{Terrain, TerrainSampler};
use crate::weather::RainfallSeries;

use super::TestCatchment;

impl TestCatchment {
    // -----------------------------------------------------------------------
    // Lattice
    // -----------------------------------------------------------------------

    /// Add a lattice over `[start, end)`. Terrain and features must already be
    /// set, they are sampled here.
    pub fn with_lattice(mut self, resolution: f32, start: Vec2, end: Vec2, volume: f32) -> Self {
        self.build_lattice(resolution, start, end, volume);
        self
    }

    /// Non-consuming form of `with_lattice`, returning the build summary.
    pub fn build_lattice(
        &mut self,
        resolution: f32,
        start: Vec2,
        end: Vec2,
        volume: f32,
    ) -> LatticeBuild {
        self.with_inputs(|network, inputs| {
            network
                .build_lattice(resolution, start, end, volume, &[], inputs)
                .unwrap_or_else(|err| panic!("with_lattice: {err}"))
        })
    }

    /// Refine immediately, outside the schedule.
    pub fn with_refined_region(mut self, resolution: f32, start: Vec2, end: Vec2) -> Self {
        self.refine_now(resolution, start, end);
        self
    }

    /// Set the volume of the column anchored at `coord`.
    pub fn with_water_at(mut self, coord: Vec2, volume: f32) -> Self {
        {
            let mut network = self.app.world_mut().resource_mut::<FlowNetwork>();
            let id = network
                .query_column(coord)
                .map(|(id, _)| id)
                .unwrap_or_else(|| panic!("no column anchored at {coord}"));
            if let Some(column) = network.column_mut(id) {
                column.water_volume = volume.max(0.0);
            }
        }
        self
    }

    fn with_inputs<R>(&mut self, f: impl FnOnce(&mut FlowNetwork, &LatticeInputs) -> R) -> R {
        self.app
            .world_mut()
            .resource_scope(|world, mut network: Mut<FlowNetwork>| {
                let config = world.resource::<HydroConfig>();
                let terrain = world.resource::<Terrain>();
                let features = world.resource::<SiteFeatures>();
                let inputs = LatticeInputs {
                    terrain: terrain.0.as_ref(),
                    features,
                    drainage: &config.drainage,
                    base_side_length: config.resolution.base_side_length,
                };
                f(&mut network, &inputs)
            })
    }

    // -----------------------------------------------------------------------
    // Site inputs
    // -----------------------------------------------------------------------

    pub fn with_terrain(mut self, sampler: impl TerrainSampler + 'static) -> Self {
        self.app.insert_resource(Terrain::new(sampler));
        self
    }

    pub fn with_features(mut self, features: SiteFeatures) -> Self {
        self.app.insert_resource(features);
        self
    }

    /// Side length greenery values are normalised against.
    pub fn with_base_side_length(mut self, side: f32) -> Self {
        self.config_mut().resolution.base_side_length = side;
        self
    }

    pub fn with_drainage(mut self, drainage: DrainageParams) -> Self {
        self.config_mut().drainage = drainage;
        self
    }

    // -----------------------------------------------------------------------
    // Weather and time
    // -----------------------------------------------------------------------

    pub fn with_rain_override(mut self, rate_mm_per_h: f32) -> Self {
        self.config_mut().rain.rain_override = Some(rate_mm_per_h);
        self
    }

    /// Drive rainfall from `series` instead of the override.
    pub fn with_series(mut self, series: RainfallSeries) -> Self {
        self.config_mut().rain.rain_override = None;
        self.app.insert_resource(series);
        self
    }

    pub fn with_rain_schedule(mut self, intervals_of_rain: u32, time_without_rain: u32) -> Self {
        let mut config = self.config_mut();
        config.rain.intervals_of_rain = intervals_of_rain;
        config.rain.time_without_rain = time_without_rain;
        drop(config);
        self
    }

    pub fn with_time(mut self, seconds_per_tick: f32, timestep: f32) -> Self {
        let mut config = self.config_mut();
        config.time.seconds_per_tick = seconds_per_tick;
        config.time.timestep = timestep;
        drop(config);
        self
    }

    fn config_mut(&mut self) -> Mut<'_, HydroConfig> {
        self.app.world_mut().resource_mut::<HydroConfig>()
    }

    // -----------------------------------------------------------------------
    // Events (applied on the next tick)
    // -----------------------------------------------------------------------

    pub fn request_refine(&mut self, resolution: f32, start: Vec2, end: Vec2) {
        self.app.world_mut().send_event(RefineRegionRequest {
            resolution,
            start,
            end,
        });
    }

    pub fn inject_rainfall(&mut self, start: Vec2, end: Vec2, rate_mm_per_h: f32) {
        self.app.world_mut().send_event(InjectRainfall {
            start,
            end,
            rate_mm_per_h,
        });
    }

    pub fn clear_injected_rainfall(&mut self) {
        self.app.world_mut().send_event(ClearInjectedRainfall);
    }

    /// Refine directly, bypassing the event queue.
    pub fn refine_now(&mut self, resolution: f32, start: Vec2, end: Vec2) -> RefineOutcome {
        self.with_inputs(|network, inputs| {
            network
                .refine_region(resolution, start, end, inputs)
                .unwrap_or_else(|err| panic!("refine_now: {err}"))
        })
    }
}
