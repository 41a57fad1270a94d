//! Assertion helpers for `TestCatchment` integration tests.

use bevy::prelude::*;

use super::TestCatchment;

impl TestCatchment {
    // -----------------------------------------------------------------------
    // Assertions
    // -----------------------------------------------------------------------

    /// Assert total stored water is within `tolerance` of `expected`.
    pub fn assert_total_volume_near(&self, expected: f64, tolerance: f64) {
        let total = self.total_volume();
        assert!(
            (total - expected).abs() <= tolerance,
            "Expected total volume {expected} ± {tolerance}, got {total}"
        );
    }

    pub fn assert_no_negative_volume(&self) {
        for (id, column) in self.network().columns().iter() {
            assert!(
                column.water_volume >= 0.0,
                "Column {id:?} at {} has negative volume {}",
                column.grid_coord(),
                column.water_volume
            );
        }
    }

    pub fn assert_volume_at(&self, coord: Vec2, expected: f32, tolerance: f32) {
        let volume = self.volume_at(coord);
        assert!(
            (volume - expected).abs() <= tolerance,
            "Expected volume {expected} ± {tolerance} at {coord}, got {volume}"
        );
    }

    /// Assert every column's drain and soil capacities lie within their bounds.
    pub fn assert_capacities_in_bounds(&self) {
        for (id, column) in self.network().columns().iter() {
            assert!(
                (0.0..=column.max_drain_capacity).contains(&column.drain_capacity_remaining),
                "Column {id:?} drain capacity {} outside [0, {}]",
                column.drain_capacity_remaining,
                column.max_drain_capacity
            );
            assert!(
                (0.0..=column.initial_soil_capacity).contains(&column.soil_capacity_remaining),
                "Column {id:?} soil capacity {} outside [0, {}]",
                column.soil_capacity_remaining,
                column.initial_soil_capacity
            );
        }
    }

    /// Assert every pipe joins two live columns that list it.
    pub fn assert_pipes_consistent(&self) {
        let network = self.network();
        for (pipe_id, pipe) in network.pipes().iter() {
            for end in [pipe.a, pipe.b] {
                let column = network
                    .column(end)
                    .unwrap_or_else(|| panic!("Pipe {pipe_id:?} references dead column {end:?}"));
                assert!(
                    column.pipes().contains(&pipe_id),
                    "Column {end:?} does not list pipe {pipe_id:?}"
                );
            }
        }
    }

    pub fn assert_halted_with_error(&self) {
        assert!(self.clock().halted, "Expected the hydro clock to be halted");
        assert!(
            matches!(self.exit_requested(), Some(AppExit::Error(_))),
            "Expected an error exit, got {:?}",
            self.exit_requested()
        );
    }
}
