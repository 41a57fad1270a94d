//! Fixed-tick driver: hydro clock, weather lookup, queued network edits and
//! the two simulation passes.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{HydroConfig, RainConfig, TimeConfig};
use crate::error::FlowError;
use crate::events::{ClearInjectedRainfall, InjectRainfall, RefineRegionRequest};
use crate::grid_builder::LatticeInputs;
use crate::network::{FlowNetwork, StepReport};
use crate::simulation_sets::SimulationSet;
use crate::site_data::SiteFeatures;
use crate::terrain::Terrain;
use crate::weather::RainfallSeries;

// =============================================================================
// HydroClock
// =============================================================================

/// Simulated time, weather position and rain schedule state.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct HydroClock {
    /// Simulated hours since startup.
    pub elapsed_hours: f64,
    /// Real seconds accumulated towards the next simulated hour.
    pub hour_timer: f32,
    pub weather_index: usize,
    pub hours_passed: u32,
    /// Hours since the rain schedule last restarted.
    pub interval_count: u32,
    pub currently_raining: bool,
    /// Set once a fatal error stops the simulation. Both passes are skipped.
    pub halted: bool,
    /// `dt` for the current tick, in simulated hours.
    pub tick_hours: f32,
    /// Rainfall rate (mm/h) used by the current tick's rain/drain pass.
    pub current_rate: f32,
}

impl Default for HydroClock {
    fn default() -> Self {
        Self {
            elapsed_hours: 0.0,
            hour_timer: 0.0,
            weather_index: 0,
            hours_passed: 0,
            interval_count: 0,
            currently_raining: true,
            halted: false,
            tick_hours: 0.0,
            current_rate: 0.0,
        }
    }
}

impl HydroClock {
    /// Advance by one tick. Returns the number of simulated hours crossed.
    ///
    /// A non-positive `timestep` freezes the clock.
    pub fn advance(&mut self, time: &TimeConfig) -> u32 {
        if time.timestep <= 0.0 || !time.timestep.is_finite() {
            self.tick_hours = 0.0;
            return 0;
        }

        self.tick_hours = time.tick_hours();
        self.elapsed_hours += self.tick_hours as f64;
        self.hour_timer += time.seconds_per_tick;

        let mut crossed = 0;
        while self.hour_timer >= time.timestep {
            self.hour_timer -= time.timestep;
            self.weather_index += 1;
            self.hours_passed += 1;
            self.interval_count += 1;
            crossed += 1;
        }
        crossed
    }

    /// Apply the wet/dry schedule. Returns whether rain falls this tick.
    ///
    /// Rain falls for `intervals_of_rain` hours, then stops until the count
    /// reaches `intervals_of_rain * time_without_rain`, where it restarts.
    pub fn update_schedule(&mut self, rain: &RainConfig) -> bool {
        let mut raining = true;
        if rain.intervals_of_rain > 0 {
            let cycle = rain
                .intervals_of_rain
                .saturating_mul(rain.time_without_rain.max(1));
            if self.interval_count > rain.intervals_of_rain && self.interval_count != cycle {
                raining = false;
            } else if self.interval_count == cycle {
                self.interval_count = 0;
            }
        }
        self.currently_raining = raining;
        raining
    }

    /// Rainfall rate for this tick: the override if set, otherwise the series
    /// entry at `weather_index`. Zero while the schedule is dry.
    pub fn rate_for(
        &self,
        raining: bool,
        rain: &RainConfig,
        series: &RainfallSeries,
    ) -> Result<f32, FlowError> {
        let rate = match rain.rain_override {
            Some(rate) => rate,
            None => series.rate_at(self.weather_index)?,
        };
        Ok(if raining { rate } else { 0.0 })
    }
}

/// Totals from the most recent tick's passes.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct LastStepReport(pub StepReport);

// =============================================================================
// Systems
// =============================================================================

/// Seek the weather series to the configured start time.
pub fn init_hydro_clock(
    config: Res<HydroConfig>,
    series: Res<RainfallSeries>,
    mut clock: ResMut<HydroClock>,
    mut exit: EventWriter<AppExit>,
) {
    let Some(start_time) = config.time.weather_start_time else {
        return;
    };
    match series.start_index(start_time) {
        Ok(index) => {
            clock.weather_index = index;
            info!("Weather series starts at entry {index} (t = {start_time})");
        }
        Err(err) => {
            error!("Cannot start hydrology clock: {err}");
            clock.halted = true;
            exit.send(AppExit::error());
        }
    }
}

pub fn advance_hydro_clock(
    config: Res<HydroConfig>,
    series: Res<RainfallSeries>,
    mut clock: ResMut<HydroClock>,
    mut exit: EventWriter<AppExit>,
) {
    if clock.halted {
        clock.tick_hours = 0.0;
        return;
    }

    let crossed = clock.advance(&config.time);
    let raining = clock.update_schedule(&config.rain);
    match clock.rate_for(raining, &config.rain, &series) {
        Ok(rate) => {
            clock.current_rate = rate;
            if crossed > 0 {
                debug!(
                    "Hour {} (weather entry {}): {} mm/h",
                    clock.hours_passed, clock.weather_index, rate
                );
            }
        }
        Err(err) => {
            error!("Halting hydrology after {} hours: {err}", clock.hours_passed);
            clock.halted = true;
            clock.tick_hours = 0.0;
            clock.current_rate = 0.0;
            exit.send(AppExit::error());
        }
    }
}

pub fn apply_refine_requests(
    mut requests: EventReader<RefineRegionRequest>,
    mut network: ResMut<FlowNetwork>,
    config: Res<HydroConfig>,
    terrain: Res<Terrain>,
    features: Res<SiteFeatures>,
) {
    if requests.is_empty() {
        return;
    }
    let inputs = LatticeInputs {
        terrain: terrain.0.as_ref(),
        features: &features,
        drainage: &config.drainage,
        base_side_length: config.resolution.base_side_length,
    };
    for request in requests.read() {
        if let Err(err) =
            network.refine_region(request.resolution, request.start, request.end, &inputs)
        {
            warn!("Refine request rejected: {err}");
        }
    }
}

/// Clears run before injections queued in the same tick.
pub fn apply_rainfall_injections(
    mut clears: EventReader<ClearInjectedRainfall>,
    mut injections: EventReader<InjectRainfall>,
    mut network: ResMut<FlowNetwork>,
) {
    if !clears.is_empty() {
        clears.clear();
        network.clear_injected_rainfall();
    }
    for injection in injections.read() {
        let affected =
            network.inject_rainfall(injection.start, injection.end, injection.rate_mm_per_h);
        debug!(
            "Injected {} mm/h over {} columns",
            injection.rate_mm_per_h, affected
        );
    }
}

pub fn apply_rain_drain_pass(
    clock: Res<HydroClock>,
    config: Res<HydroConfig>,
    mut network: ResMut<FlowNetwork>,
    mut report: ResMut<LastStepReport>,
) {
    if clock.halted {
        report.0 = StepReport::default();
        return;
    }
    report.0.rain_drain =
        network.rain_drain_pass(clock.tick_hours, clock.current_rate, &config.drainage);
}

pub fn resolve_flow_pass(
    clock: Res<HydroClock>,
    config: Res<HydroConfig>,
    mut network: ResMut<FlowNetwork>,
    mut report: ResMut<LastStepReport>,
) {
    if clock.halted {
        return;
    }
    report.0.moved = network.flow_pass(clock.tick_hours, &config.flow);
}

// =============================================================================
// Plugin
// =============================================================================

pub struct DriverPlugin;

impl Plugin for DriverPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HydroClock>()
            .init_resource::<LastStepReport>()
            .add_event::<RefineRegionRequest>()
            .add_event::<InjectRainfall>()
            .add_event::<ClearInjectedRainfall>()
            .add_systems(Startup, init_hydro_clock)
            .add_systems(
                FixedUpdate,
                (
                    advance_hydro_clock,
                    apply_refine_requests,
                    apply_rainfall_injections,
                )
                    .chain()
                    .after(crate::tick_counter)
                    .in_set(SimulationSet::PreSim),
            )
            .add_systems(
                FixedUpdate,
                (
                    apply_rain_drain_pass,
                    resolve_flow_pass.after(apply_rain_drain_pass),
                )
                    .in_set(SimulationSet::Simulation),
            );
    }
}
