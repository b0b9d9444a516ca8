//! Conversion from FSR voltages to pressure.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{SensorId, SensorReading};

/// Calibration constant of the FSR-402 voltage divider, in kPa per V^1.5.
pub const DEFAULT_CALIBRATION: f32 = 100.0;

const EXPONENT: f32 = 1.5;

/// Converts a voltage into kPa as `calibration * volts^1.5`.
///
/// Negative and NaN voltages are sensor noise and read as 0 V.
#[must_use]
pub fn volts_to_kpa(volts: f32, calibration: f32) -> f32 {
    // `f32::max` drops the NaN operand
    calibration * volts.max(0.0).powf(EXPONENT)
}

/// Converts complete readings for a fixed set of sensors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConverter {
    calibration: f32,
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION)
    }
}

impl UnitConverter {
    #[must_use]
    pub fn new(calibration: f32) -> Self {
        Self { calibration }
    }

    #[must_use]
    pub fn kpa(&self, volts: f32) -> f32 {
        volts_to_kpa(volts, self.calibration)
    }

    /// Pressure of every sensor in `sensors`, sensors missing from `reading` read as 0 kPa.
    #[must_use]
    pub fn convert(&self, reading: &SensorReading, sensors: &[SensorId]) -> Pressures {
        Pressures(
            sensors
                .iter()
                .map(|id| (id.clone(), self.kpa(reading.voltage(id.as_str()))))
                .collect(),
        )
    }
}

/// Pressure per sensor in kPa for a single snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pressures(BTreeMap<SensorId, f32>);

impl Pressures {
    /// Pressure of `sensor`, `0.0` for unknown sensors.
    #[must_use]
    pub fn get(&self, sensor: &str) -> f32 {
        self.0.get(sensor).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn total(&self) -> f32 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SensorId, f32)> {
        self.0.iter().map(|(id, kpa)| (id, *kpa))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<SensorId>> FromIterator<(K, f32)> for Pressures {
    fn from_iter<T: IntoIterator<Item = (K, f32)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(id, kpa)| (id.into(), kpa)).collect())
    }
}
