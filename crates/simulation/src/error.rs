// ---------------------------------------------------------------------------
// FlowError: typed failures for lattice construction, datasets and the driver
// ---------------------------------------------------------------------------

use std::fmt;

use bevy::math::Vec2;

/// Errors raised by the hydrology core.
///
/// Precondition failures (`InvalidResolution`, `MalformedRegion`) are always
/// reported before the network is touched.
#[derive(Debug)]
pub enum FlowError {
    /// Column side length was zero, negative or not finite.
    InvalidResolution(f32),
    /// The region cannot be tiled by a whole, positive number of cells.
    MalformedRegion {
        start: Vec2,
        end: Vec2,
        resolution: f32,
    },
    /// The rainfall series has no entry for the requested hour.
    MissingWeatherEntry { index: usize, len: usize },
    /// No rainfall entry carries the configured start timestamp.
    WeatherStartNotFound(i64),
    /// Reading a dataset from disk failed.
    Io(std::io::Error),
    /// A dataset was not valid JSON for its schema.
    Json(serde_json::Error),
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::InvalidResolution(r) => {
                write!(f, "Invalid resolution {r}: column side length must be > 0")
            }
            FlowError::MalformedRegion {
                start,
                end,
                resolution,
            } => write!(
                f,
                "Malformed region ({}, {})..({}, {}): not a whole number of {resolution} cells",
                start.x, start.y, end.x, end.y
            ),
            FlowError::MissingWeatherEntry { index, len } => write!(
                f,
                "Rainfall series has no entry for hour {index} (series length {len})"
            ),
            FlowError::WeatherStartNotFound(time) => {
                write!(f, "Rainfall series has no entry at unix time {time}")
            }
            FlowError::Io(e) => write!(f, "I/O error: {e}"),
            FlowError::Json(e) => write!(f, "Dataset parse error: {e}"),
        }
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlowError::Io(e) => Some(e),
            FlowError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FlowError {
    fn from(e: std::io::Error) -> Self {
        FlowError::Io(e)
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        FlowError::Json(e)
    }
}
