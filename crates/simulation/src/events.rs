use bevy::prelude::*;

/// Replace the columns fully inside `start..end` with a `resolution` lattice.
/// Applied in `PreSim`, never during a pass.
#[derive(Event, Debug, Clone, Copy)]
pub struct RefineRegionRequest {
    pub resolution: f32,
    pub start: Vec2,
    pub end: Vec2,
}

/// Add extra rainfall (mm/h) to every column fully inside `start..end`.
#[derive(Event, Debug, Clone, Copy)]
pub struct InjectRainfall {
    pub start: Vec2,
    pub end: Vec2,
    pub rate_mm_per_h: f32,
}

/// Reset every column's injected rainfall to zero.
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct ClearInjectedRainfall;
