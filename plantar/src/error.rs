use miette::Diagnostic;
use thiserror::Error;

use crate::sensor::SensorId;

/// Errors from validating a [`PlantarConfig`](crate::config::PlantarConfig).
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("no sensors are configured")]
    #[diagnostic(help("list the sensor ids in `sensors.ids`"))]
    NoSensors,

    #[error("sensor `{sensor}` has no coordinate in the {frame} layout")]
    MissingCoordinate { sensor: SensorId, frame: &'static str },

    #[error("the {frame} layout contains unknown sensor `{sensor}`")]
    UnknownCoordinate { sensor: SensorId, frame: &'static str },

    #[error("region `{region}` refers to unknown sensor `{sensor}`")]
    UnknownRegionSensor { region: String, sensor: SensorId },

    #[error("gait detection uses region `{region}`, which is not configured")]
    #[diagnostic(help("add `{region}` to `regions.sensors`"))]
    MissingGaitRegion { region: String },

    #[error("`heatmap.max_pressure` must be positive, got {0}")]
    MaxPressure(f32),

    #[error("`pressure.calibration` must be positive, got {0}")]
    Calibration(f32),

    #[error("`{section}.activity_threshold` must be finite and non-negative, got {value}")]
    ActivityThreshold { section: &'static str, value: f32 },
}

pub type Result<T> = std::result::Result<T, Error>;
