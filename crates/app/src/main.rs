use bevy::log::LogPlugin;
use bevy::prelude::*;

use catchment_sim::snapshot::update_flow_stats;
use catchment_sim::{HydrologyPlugin, SimulationSet};

mod runner;
mod scenario;

use runner::{report_progress, run_headless, stop_after_run_length, RunLength};
use scenario::Scenario;

fn main() -> AppExit {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, LogPlugin::default()));

    let scenario = match Scenario::from_env() {
        Ok(scenario) => scenario,
        Err(err) => {
            error!("Cannot load scenario: {err}");
            return AppExit::error();
        }
    };
    let seconds_per_tick = scenario.config.time.seconds_per_tick;
    let run = RunLength {
        hours: scenario.hours,
    };
    scenario.install(&mut app);

    app.add_plugins(HydrologyPlugin)
        .insert_resource(run)
        .add_systems(
            FixedUpdate,
            (report_progress, stop_after_run_length)
                .chain()
                .after(update_flow_stats)
                .in_set(SimulationSet::PostSim),
        );

    // Real-time mode: one fixed tick per `seconds_per_tick` of wall clock.
    if std::env::var("CATCHMENT_REALTIME").is_ok() {
        app.insert_resource(Time::<Fixed>::from_seconds(seconds_per_tick as f64));
        return app.run();
    }

    run_headless(&mut app)
}
