//! Query and tick methods for `TestCatchment`.

use bevy::prelude::*;

use crate::column::Column;
use crate::driver::{HydroClock, LastStepReport};
use crate::network::FlowNetwork;
use crate::snapshot::{ColumnSample, FlowStats, WaterSnapshot};
use crate::TickCounter;

use super::TestCatchment;

impl TestCatchment {
    // -----------------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------------

    /// Run N fixed ticks by executing the `FixedUpdate` schedule directly,
    /// independent of virtual time.
    pub fn tick(&mut self, n: u32) {
        for _ in 0..n {
            self.app.world_mut().run_schedule(FixedUpdate);
        }
    }

    /// Tick until `hours` simulated hours have passed on the hydro clock.
    pub fn run_hours(&mut self, hours: u32) {
        let target = self.clock().hours_passed + hours;
        while self.clock().hours_passed < target && !self.clock().halted {
            self.tick(1);
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn resource<T: Resource>(&self) -> &T {
        self.app.world().resource::<T>()
    }

    pub fn network(&self) -> &FlowNetwork {
        self.resource::<FlowNetwork>()
    }

    pub fn clock(&self) -> &HydroClock {
        self.resource::<HydroClock>()
    }

    pub fn stats(&self) -> &FlowStats {
        self.resource::<FlowStats>()
    }

    pub fn snapshot(&self) -> &WaterSnapshot {
        self.resource::<WaterSnapshot>()
    }

    pub fn last_report(&self) -> &LastStepReport {
        self.resource::<LastStepReport>()
    }

    pub fn tick_count(&self) -> u64 {
        self.resource::<TickCounter>().0
    }

    pub fn total_volume(&self) -> f64 {
        self.network().total_volume()
    }

    pub fn column_count(&self) -> usize {
        self.network().column_count()
    }

    pub fn pipe_count(&self) -> usize {
        self.network().pipe_count()
    }

    /// Column anchored exactly at `coord`.
    pub fn column_at(&self, coord: Vec2) -> Option<&Column> {
        self.network().query_column(coord).map(|(_, c)| c)
    }

    pub fn volume_at(&self, coord: Vec2) -> f32 {
        self.column_at(coord)
            .map(|c| c.water_volume)
            .unwrap_or_else(|| panic!("no column anchored at {coord}"))
    }

    /// Snapshot sample of the column covering `point`, as of the last tick.
    pub fn sample_at(&self, point: Vec2) -> Option<ColumnSample> {
        self.snapshot().sample_at(point).copied()
    }

    pub fn exit_requested(&self) -> Option<AppExit> {
        self.app.should_exit()
    }
}
