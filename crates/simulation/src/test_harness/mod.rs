//! # TestCatchment: headless harness for hydrology integration tests
//!
//! Wraps `bevy::app::App` + `HydrologyPlugin` without a window or logger.
//! The network starts empty (`SkipNetworkInit`) and rain is overridden to
//! zero, so each test lays out exactly the lattice and weather it needs.

mod assertions;
mod queries;
mod setup;

use bevy::prelude::*;

use crate::config::{HydroConfig, RainConfig};
use crate::weather::RainfallSeries;
use crate::world_init::SkipNetworkInit;
use crate::HydrologyPlugin;

pub struct TestCatchment {
    app: App,
}

impl TestCatchment {
    /// Empty network, dry weather, default tuning.
    pub fn new() -> Self {
        Self::with_config(HydroConfig {
            rain: RainConfig {
                rain_override: Some(0.0),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Empty network with the given tuning. `init_network` still skips, so
    /// `config.resolution` only matters to later `with_*` calls.
    pub fn with_config(config: HydroConfig) -> Self {
        Self::with_weather(config, RainfallSeries::default())
    }

    /// Like `with_config`, with `series` present before Startup so
    /// `weather_start_time` is resolved against it.
    pub fn with_weather(config: HydroConfig, series: RainfallSeries) -> Self {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);

        // Before the plugin: init_resource keeps them, init_network skips.
        app.insert_resource(SkipNetworkInit);
        app.insert_resource(config);
        app.insert_resource(series);
        app.add_plugins(HydrologyPlugin);

        // Run Startup once.
        app.update();

        Self { app }
    }
}

impl Default for TestCatchment {
    fn default() -> Self {
        Self::new()
    }
}
