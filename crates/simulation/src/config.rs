use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// World units per integer lattice step. Column anchors are quantized to this
/// before being used as lookup keys.
pub const COORD_QUANTUM: f32 = 0.001;

/// Lattice steps per world unit (`1 / COORD_QUANTUM`).
pub const COORD_SCALE: f32 = 1000.0;

/// Largest distance, in cells, a region's extent may be from a whole step
/// count. Absolute, so it does not grow with the lattice size.
pub const LATTICE_STEP_TOLERANCE: f32 = 1e-3;

/// Relative tolerance when checking that replaced columns tile their
/// bounding box.
pub const TILING_TOLERANCE: f64 = 1e-3;

pub const DEFAULT_BASE_SIDE_LENGTH: f32 = 25.0;
pub const DEFAULT_DETAILED_SIDE_LENGTH: f32 = 2.5;
pub const DEFAULT_AREA_SIZE: f32 = 500.0;

pub const DEFAULT_TIME_WITHOUT_RAIN: u32 = 3;

pub const DEFAULT_FRICTION: f32 = 0.9995;
pub const DEFAULT_GRAVITY: f32 = 9.806;

/// Timestep (simulated hours) at which `friction` is the per-step damping factor.
pub const REFERENCE_TIMESTEP: f32 = 0.005;

/// Water depth (metres) above which a column counts as flooded in the stats.
pub const FLOOD_DEPTH_THRESHOLD: f32 = 0.01;

/// Grid layout of the base lattice and the optional detailed region.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub base_side_length: f32,
    pub area_start: Vec2,
    pub area_end: Vec2,
    pub multi_resolution: bool,
    pub detailed_side_length: f32,
    pub detailed_start: Vec2,
    pub detailed_end: Vec2,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            base_side_length: DEFAULT_BASE_SIDE_LENGTH,
            area_start: Vec2::ZERO,
            area_end: Vec2::splat(DEFAULT_AREA_SIZE),
            multi_resolution: false,
            detailed_side_length: DEFAULT_DETAILED_SIDE_LENGTH,
            detailed_start: Vec2::new(5.0, 5.0),
            detailed_end: Vec2::new(100.0, 100.0),
        }
    }
}

/// Physical constants used by every pipe during the flow pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowParams {
    /// Fraction of flow velocity kept per `reference_timestep`.
    pub friction: f32,
    pub gravity: f32,
    pub reference_timestep: f32,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            friction: DEFAULT_FRICTION,
            gravity: DEFAULT_GRAVITY,
            reference_timestep: REFERENCE_TIMESTEP,
        }
    }
}

impl FlowParams {
    /// Damping applied to the carried velocity for a step of `dt` hours.
    ///
    /// `1 - (1 - friction) * dt / reference_timestep`
    #[inline]
    pub fn friction_factor(&self, dt: f32) -> f32 {
        1.0 - (1.0 - self.friction) * dt / self.reference_timestep
    }
}

/// Coefficients for the per-column rain/drain mass balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainageParams {
    /// Weight added per `water` feature point; a column is a water body once
    /// its accumulated weight reaches 1.
    pub water_point_weight: f32,
    /// Soil infiltration rate (mm/h per unit of soil percentage).
    pub grass_drain_rate: f32,
    /// Engineered drainage rate per drain feature.
    pub drain_rate_per_drain: f32,
    /// Total volume a single drain can take before it needs to recover.
    pub drain_capacity_per_drain: f32,
    /// Soil storage per unit of soil percentage.
    pub soil_capacity_per_unit: f32,
    /// Side length of the reference patch greenery values are expressed in.
    pub soil_reference_side: f32,
    /// Fraction of `max_drain_capacity` returned per dry hour.
    pub capacity_recovery_per_hour: f32,
    /// 1 = drains fully open, 0 = fully blocked.
    pub blocked_drainage: f32,
}

impl Default for DrainageParams {
    fn default() -> Self {
        Self {
            water_point_weight: 1000.0,
            grass_drain_rate: 0.6,
            drain_rate_per_drain: 30.0,
            drain_capacity_per_drain: 100.0,
            soil_capacity_per_unit: 120_000.0,
            soil_reference_side: 10.0,
            capacity_recovery_per_hour: 0.05,
            blocked_drainage: 1.0,
        }
    }
}

impl DrainageParams {
    /// `blocked_drainage` clamped into `[0, 1]`.
    #[inline]
    pub fn drainage_factor(&self) -> f32 {
        self.blocked_drainage.clamp(0.0, 1.0)
    }
}

/// Mapping between fixed ticks, real seconds and simulated hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Real seconds represented by one `FixedUpdate` tick.
    pub seconds_per_tick: f32,
    /// Real seconds per simulated hour. Smaller is faster.
    pub timestep: f32,
    /// Unix time of the first weather entry to use. `None` starts at the
    /// beginning of the series.
    pub weather_start_time: Option<i64>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            seconds_per_tick: 1.0 / 64.0,
            timestep: 1.0,
            weather_start_time: None,
        }
    }
}

impl TimeConfig {
    /// Simulated hours advanced by one tick.
    #[inline]
    pub fn tick_hours(&self) -> f32 {
        self.seconds_per_tick / self.timestep
    }
}

/// Scenario switches on top of the rainfall series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RainConfig {
    /// Constant rainfall (mm/h) replacing the series.
    pub rain_override: Option<f32>,
    /// Hours of rain before a dry spell. 0 disables the schedule.
    pub intervals_of_rain: u32,
    /// Length of a full wet+dry cycle as a multiple of `intervals_of_rain`.
    /// Values below 1 are read as 1 (no dry spell).
    pub time_without_rain: u32,
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            rain_override: None,
            intervals_of_rain: 0,
            time_without_rain: DEFAULT_TIME_WITHOUT_RAIN,
        }
    }
}

/// All tuning for the hydrology simulation.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HydroConfig {
    pub resolution: ResolutionConfig,
    pub flow: FlowParams,
    pub drainage: DrainageParams,
    pub time: TimeConfig,
    pub rain: RainConfig,
}

impl HydroConfig {
    /// Parse a config where every omitted field keeps its default.
    pub fn from_json_str(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&json)?;
        info!("Loaded hydrology config from {}", path.as_ref().display());
        Ok(config)
    }
}
