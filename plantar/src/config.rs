//! Configuration of the monitoring pipeline, loaded from `config/plantar.toml`.
use std::{collections::BTreeSet, path::Path, time::Duration};

use filter::SmoothingFactor;
use odal::{Config, ConfigKind, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::{
    cop::CopConfig,
    error::{Error, Result},
    gait::GaitConfig,
    heatmap::HeatmapConfig,
    layout::CoordinateMap,
    region::RegionConfig,
    sensor::{SensorId, conditioning::ConditioningConfig, pressure::DEFAULT_CALIBRATION},
};

/// Configuration of a single insole and everything that processes its readings.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct PlantarConfig {
    pub sensors: SensorLayoutConfig,
    #[serde(default)]
    pub pressure: PressureConfig,
    #[serde(default)]
    pub center_of_pressure: CopConfig,
    pub regions: RegionConfig,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    pub gait: GaitConfig,
    #[serde(default)]
    pub heatmap: HeatmapConfig,
    #[serde(default)]
    pub conditioning: ConditioningConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
}

impl Config for PlantarConfig {
    const PATH: &'static str = "plantar.toml";
}

impl PlantarConfig {
    /// Checks the relations between sections that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let ids = &self.sensors.ids;
        if ids.is_empty() {
            return Err(Error::NoSensors);
        }
        let known: BTreeSet<&SensorId> = ids.iter().collect();

        for (frame, map) in [("raw", &self.sensors.raw), ("target", &self.sensors.target)] {
            if let Some(sensor) = ids.iter().find(|id| !map.contains_key(*id)) {
                return Err(Error::MissingCoordinate {
                    sensor: sensor.clone(),
                    frame,
                });
            }
            if let Some(sensor) = map.keys().find(|id| !known.contains(id)) {
                return Err(Error::UnknownCoordinate {
                    sensor: sensor.clone(),
                    frame,
                });
            }
        }

        for (region, sensors) in &self.regions.sensors {
            if let Some(sensor) = sensors.iter().find(|id| !known.contains(id)) {
                return Err(Error::UnknownRegionSensor {
                    region: region.clone(),
                    sensor: sensor.clone(),
                });
            }
        }

        for region in [
            &self.gait.heel_region,
            &self.gait.midfoot_region,
            &self.gait.toe_region,
        ] {
            if !self.regions.sensors.contains_key(region) {
                return Err(Error::MissingGaitRegion {
                    region: region.clone(),
                });
            }
        }

        let max_pressure = self.heatmap.max_pressure;
        if !is_positive(max_pressure) {
            return Err(Error::MaxPressure(max_pressure));
        }

        let calibration = self.pressure.calibration;
        if !is_positive(calibration) {
            return Err(Error::Calibration(calibration));
        }

        for (section, value) in [
            ("center_of_pressure", self.center_of_pressure.activity_threshold),
            ("gait", self.gait.activity_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::ActivityThreshold { section, value });
            }
        }

        Ok(())
    }
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

/// The sensors of the insole and where they are.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SensorLayoutConfig {
    /// Sensor ids, in the order in which plain-text packets list their voltages.
    pub ids: Vec<SensorId>,
    /// Sensor positions as measured on the insole.
    pub raw: CoordinateMap,
    /// Reference positions of the sensors in the display frame.
    pub target: CoordinateMap,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct PressureConfig {
    /// Calibration constant `k` of `p = k * v^1.5`.
    pub calibration: f32,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            calibration: DEFAULT_CALIBRATION,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SmoothingConfig {
    /// Smoothing factor of the peak pressure indicator.
    pub peak_alpha: SmoothingFactor,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            peak_alpha: SmoothingFactor::saturating(0.3),
        }
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AcquisitionConfig {
    /// Interval between two polls of the reading source.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_interval: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(150),
        }
    }
}

/// Loads `T` from `main_dir`, merged with the overlay in `overlay_dir` if there is one.
///
/// A missing overlay is not an error, the main config is used on its own.
pub fn load_config<T: Config>(main_dir: &Path, overlay_dir: Option<&Path>) -> odal::Result<T> {
    let Some(overlay_dir) = overlay_dir else {
        return T::load(main_dir);
    };

    match T::load_with_overlay(main_dir, overlay_dir) {
        Ok(config) => Ok(config),
        Err(odal::Error {
            name,
            kind:
                ErrorKind::Load {
                    path,
                    config_kind: ConfigKind::Overlay,
                    ..
                },
        }) => {
            tracing::debug!("`{name}`: failed to read overlay from `{path}`, using main config");
            T::load(main_dir)
        }
        Err(e) => Err(e),
    }
}
