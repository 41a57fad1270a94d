//! Run-length control and progress reporting shared by both run modes.

use bevy::prelude::*;

use catchment_sim::snapshot::FlowStats;

/// Simulated hours to run before exiting.
#[derive(Resource, Debug, Clone, Copy)]
pub struct RunLength {
    pub hours: u32,
}

/// Log the flood statistics once per simulated hour.
pub fn report_progress(stats: Res<FlowStats>, mut last_hour: Local<u32>) {
    if stats.hours_passed == *last_hour {
        return;
    }
    *last_hour = stats.hours_passed;
    info!(
        "hour {:>4}: volume {:>12.2}  max depth {:>6.3} m  flooded {:>5}/{:<5}  rain {:>10.2}  drained {:>10.2}  soaked {:>10.2}",
        stats.hours_passed,
        stats.total_volume,
        stats.max_depth,
        stats.flooded_columns,
        stats.column_count,
        stats.cumulative_rain,
        stats.cumulative_drained,
        stats.cumulative_soaked,
    );
}

pub fn stop_after_run_length(
    stats: Res<FlowStats>,
    run: Res<RunLength>,
    mut exit: EventWriter<AppExit>,
) {
    if stats.hours_passed >= run.hours {
        exit.send(AppExit::Success);
    }
}

/// Drive `FixedUpdate` as fast as possible until an exit is requested.
pub fn run_headless(app: &mut App) -> AppExit {
    // Startup: network build and weather seek.
    app.update();

    loop {
        if let Some(exit) = app.should_exit() {
            log_summary(app.world());
            return exit;
        }
        app.world_mut().run_schedule(FixedUpdate);
    }
}

fn log_summary(world: &World) {
    let Some(stats) = world.get_resource::<FlowStats>() else {
        return;
    };
    info!(
        "Finished after {} simulated hours: {} columns, {} pipes, {:.2} units stored, {} flooded (> {} m), {:.2} removed by drains, soil and water bodies",
        stats.hours_passed,
        stats.column_count,
        stats.pipe_count,
        stats.total_volume,
        stats.flooded_columns,
        stats.flood_depth_threshold,
        stats.cumulative_outflow()
    );
}
