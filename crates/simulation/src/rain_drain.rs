//! Per-column rainfall and drainage mass balance.
//!
//! Every column is updated independently: rain is added, then water bodies,
//! engineered drains and soil each take what they can from a running
//! "available" counter, in that order. Drain capacity recovers during dry
//! steps; soil capacity does not.

use serde::{Deserialize, Serialize};

use crate::column::Column;
use crate::config::DrainageParams;

/// Volumes moved by one rain/drain update (cubic units).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RainDrainOutcome {
    pub rain: f32,
    /// Removed by engineered drains, after the blockage factor.
    pub drained: f32,
    /// Absorbed by soil, after the blockage factor.
    pub soaked: f32,
    /// Removed because the column is a water body.
    pub water_body: f32,
}

impl RainDrainOutcome {
    /// Net change requested for the column's volume.
    #[inline]
    pub fn net(&self) -> f32 {
        self.rain - (self.drained + self.soaked + self.water_body)
    }

    pub fn accumulate(&mut self, other: &RainDrainOutcome) {
        self.rain += other.rain;
        self.drained += other.drained;
        self.soaked += other.soaked;
        self.water_body += other.water_body;
    }
}

/// Take up to `demand` from `remaining` capacity, clamping the take at what is left.
#[inline]
fn consume_capacity(demand: f32, remaining: &mut f32) -> f32 {
    if *remaining - demand < 0.0 {
        let taken = *remaining;
        *remaining = 0.0;
        taken
    } else {
        *remaining -= demand;
        demand
    }
}

/// Apply rainfall at `rate_mm_per_h` plus the column's injected rainfall, then
/// drain, for a step of `dt` hours.
pub fn apply_rain_drain(
    column: &mut Column,
    rate_mm_per_h: f32,
    dt: f32,
    params: &DrainageParams,
) -> RainDrainOutcome {
    let area = column.area();
    let rain = area * (rate_mm_per_h + column.injected_rainfall) / 1000.0 * dt;
    let mut available = rain + column.water_volume;

    let mut water_drain = 0.0;
    if column.is_water_body {
        water_drain = available;
        available = 0.0;
    }

    let mut drained = 0.0;
    if column.drain_capacity_remaining > 0.0 {
        let demand =
            (column.drain_count * params.drain_rate_per_drain / 10.0 * dt).min(available);
        drained = consume_capacity(demand, &mut column.drain_capacity_remaining);
    }

    if column.max_drain_capacity > 0.0 && rain <= 0.0 {
        column.drain_capacity_remaining = (column.drain_capacity_remaining
            + column.max_drain_capacity * params.capacity_recovery_per_hour * dt)
            .min(column.max_drain_capacity);
    }

    available -= drained;

    let mut soaked = 0.0;
    if column.soil_capacity_remaining > 0.0 {
        let demand =
            (params.grass_drain_rate * column.soil_percentage * area / 1000.0 * dt).min(available);
        soaked = consume_capacity(demand, &mut column.soil_capacity_remaining);
    }

    let blocked = params.drainage_factor();
    let outcome = RainDrainOutcome {
        rain,
        drained: blocked * drained,
        soaked: blocked * soaked,
        water_body: water_drain,
    };
    column.apply_delta(outcome.net());
    outcome
}
