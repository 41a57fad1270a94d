//! Scenario inputs resolved from environment variables.
//!
//! | Variable             | Meaning                                   | Fallback            |
//! |----------------------|-------------------------------------------|---------------------|
//! | `CATCHMENT_CONFIG`   | `HydroConfig` JSON (partial is fine)      | defaults            |
//! | `CATCHMENT_SITE`     | site features JSON (`terrainData`)        | synthetic survey    |
//! | `CATCHMENT_WEATHER`  | rainfall series JSON (`weatherData`)      | synthetic storms    |
//! | `CATCHMENT_HOURS`    | simulated hours to run                    | 48                  |
//! | `CATCHMENT_SEED`     | seed for terrain and synthetic data       | 42                  |

use std::env;
use std::str::FromStr;

use bevy::prelude::*;

use catchment_sim::site_data::SiteFeatures;
use catchment_sim::terrain::{NoiseTerrain, Terrain};
use catchment_sim::weather::RainfallSeries;
use catchment_sim::{FlowError, HydroConfig};

const DEFAULT_HOURS: u32 = 48;
const DEFAULT_SEED: u64 = 42;

/// Height range of the generated terrain, in world units.
const TERRAIN_MIN: f32 = 0.0;
const TERRAIN_MAX: f32 = 20.0;

pub struct Scenario {
    pub config: HydroConfig,
    pub features: SiteFeatures,
    pub series: RainfallSeries,
    pub hours: u32,
    pub seed: u64,
}

/// Parse `name`, warning and falling back to `default` on a bad value.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {name}={raw:?}");
            default
        }),
        Err(_) => default,
    }
}

impl Scenario {
    pub fn from_env() -> Result<Self, FlowError> {
        let hours = env_or("CATCHMENT_HOURS", DEFAULT_HOURS);
        let seed = env_or("CATCHMENT_SEED", DEFAULT_SEED);

        let config = match env::var("CATCHMENT_CONFIG") {
            Ok(path) => HydroConfig::load(path)?,
            Err(_) => HydroConfig::default(),
        };

        let features = match env::var("CATCHMENT_SITE") {
            Ok(path) => SiteFeatures::load(path)?,
            Err(_) => {
                let res = &config.resolution;
                let features = SiteFeatures::synthetic(seed, res.area_start, res.area_end);
                info!(
                    "CATCHMENT_SITE unset, generated {} synthetic feature points",
                    features.len()
                );
                features
            }
        };

        let series = match env::var("CATCHMENT_WEATHER") {
            Ok(path) => RainfallSeries::load(path)?,
            Err(_) => {
                // One entry past the last hour, which the clock reads as it
                // crosses into it.
                let start = config.time.weather_start_time.unwrap_or(0);
                let series = RainfallSeries::synthetic(seed, hours as usize + 1, start);
                info!(
                    "CATCHMENT_WEATHER unset, generated {} hours of synthetic rain ({:.1} mm total)",
                    series.len(),
                    series.total_rainfall()
                );
                series
            }
        };

        Ok(Self {
            config,
            features,
            series,
            hours,
            seed,
        })
    }

    /// Insert every input as a resource. Must run before `HydrologyPlugin` is
    /// added so its `init_resource` calls keep these values.
    pub fn install(self, app: &mut App) {
        let terrain = NoiseTerrain::new(self.seed as i32, TERRAIN_MIN, TERRAIN_MAX);
        app.insert_resource(self.config)
            .insert_resource(self.features)
            .insert_resource(self.series)
            .insert_resource(Terrain::new(terrain));
    }
}
