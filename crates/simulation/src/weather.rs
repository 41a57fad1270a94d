//! Hourly rainfall series.
//!
//! The on-disk format is `{"weatherData": [{"time": <unix seconds>, "rainfall": <mm>}]}`
//! with one entry per hour. The driver advances one entry per simulated hour
//! and treats running past the end as fatal.

use std::path::Path;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FlowError;

const SECONDS_PER_HOUR: i64 = 3600;

/// Chance that a dry hour starts a new storm in synthetic series.
const STORM_START_CHANCE: f64 = 0.08;

/// Timestamps are sometimes written as floats by preprocessing tools.
fn unix_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let raw = f64::deserialize(deserializer)?;
    Ok(raw.round() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherPoint {
    #[serde(deserialize_with = "unix_time")]
    pub time: i64,
    /// Millimetres of rain over the hour.
    #[serde(default)]
    pub rainfall: f32,
}

#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RainfallSeries {
    #[serde(rename = "weatherData", default)]
    pub entries: Vec<WeatherPoint>,
}

impl RainfallSeries {
    pub fn new(entries: Vec<WeatherPoint>) -> Self {
        Self { entries }
    }

    /// `hours` entries of constant `rate` starting at `start_time`.
    pub fn constant(rate: f32, hours: usize, start_time: i64) -> Self {
        Self::new(
            (0..hours)
                .map(|h| WeatherPoint {
                    time: start_time + h as i64 * SECONDS_PER_HOUR,
                    rainfall: rate,
                })
                .collect(),
        )
    }

    /// Reproducible storm-and-dry-spell series for scenarios without data.
    pub fn synthetic(seed: u64, hours: usize, start_time: i64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut storm_hours_left = 0u32;
        let mut peak = 0.0f32;

        let entries = (0..hours)
            .map(|h| {
                if storm_hours_left == 0 && rng.gen_bool(STORM_START_CHANCE) {
                    storm_hours_left = rng.gen_range(2..=12);
                    peak = rng.gen_range(2.0..40.0);
                }
                let rainfall = if storm_hours_left > 0 {
                    storm_hours_left -= 1;
                    peak * rng.gen_range(0.4..1.0)
                } else {
                    0.0
                };
                WeatherPoint {
                    time: start_time + h as i64 * SECONDS_PER_HOUR,
                    rainfall,
                }
            })
            .collect();
        Self::new(entries)
    }

    pub fn from_json_str(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let series = Self::from_json_str(&json)?;
        info!(
            "Loaded {} hourly rainfall entries from {}",
            series.entries.len(),
            path.as_ref().display()
        );
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry stamped exactly `time`.
    pub fn start_index(&self, time: i64) -> Result<usize, FlowError> {
        self.entries
            .iter()
            .position(|p| p.time == time)
            .ok_or(FlowError::WeatherStartNotFound(time))
    }

    /// Rainfall rate (mm/h) for the hour at `index`.
    pub fn rate_at(&self, index: usize) -> Result<f32, FlowError> {
        self.entries
            .get(index)
            .map(|p| p.rainfall)
            .ok_or(FlowError::MissingWeatherEntry {
                index,
                len: self.entries.len(),
            })
    }

    pub fn time_at(&self, index: usize) -> Option<i64> {
        self.entries.get(index).map(|p| p.time)
    }

    /// Total rainfall (mm) over the whole series.
    pub fn total_rainfall(&self) -> f32 {
        self.entries.iter().map(|p| p.rainfall).sum()
    }
}
