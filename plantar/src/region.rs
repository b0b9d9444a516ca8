//! Anatomical regions of the foot, such as heel, midfoot and forefoot.
use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::{
    history::RingBuffer,
    sensor::{SensorId, pressure::Pressures},
};

/// Configuration of the foot regions.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    /// Number of snapshots kept in the region history.
    pub history_capacity: usize,
    /// Sensors that belong to each region. Regions may share sensors.
    pub sensors: BTreeMap<String, Vec<SensorId>>,
}

/// Named groups of sensors.
#[derive(Debug, Clone, Default)]
pub struct Regions(BTreeMap<String, Vec<SensorId>>);

impl Regions {
    #[must_use]
    pub fn new(regions: BTreeMap<String, Vec<SensorId>>) -> Self {
        Self(regions)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, region: &str) -> bool {
        self.0.contains_key(region)
    }

    pub fn sensors(&self, region: &str) -> impl Iterator<Item = &SensorId> {
        self.0.get(region).into_iter().flatten()
    }

    /// Mean pressure of each region. Regions without sensors average to 0 kPa.
    #[must_use]
    pub fn averages(&self, pressures: &Pressures) -> RegionAverages {
        RegionAverages(
            self.0
                .iter()
                .map(|(name, sensors)| {
                    let average = if sensors.is_empty() {
                        0.0
                    } else {
                        let sum: f32 = sensors.iter().map(|id| pressures.get(id.as_str())).sum();
                        sum / sensors.len() as f32
                    };
                    (name.clone(), average)
                })
                .collect(),
        )
    }

    /// Whether any sensor of `region` exceeds `threshold`. Unknown regions are never active.
    #[must_use]
    pub fn is_active(&self, region: &str, pressures: &Pressures, threshold: f32) -> bool {
        self.sensors(region)
            .any(|id| pressures.get(id.as_str()) > threshold)
    }
}

/// Mean pressure (in kPa) per region.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RegionAverages(BTreeMap<String, f32>);

impl RegionAverages {
    /// Average of `region`, `0.0` for unknown regions.
    #[must_use]
    pub fn get(&self, region: &str) -> f32 {
        self.0.get(region).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(name, kpa)| (name.as_str(), *kpa))
    }
}

/// Summary of one snapshot, as kept in the region history for trend charts.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PressureSnapshot {
    /// Time since the start of the session.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub elapsed: Duration,
    /// Sum of all sensor pressures in kPa.
    pub total: f32,
    pub regions: RegionAverages,
}

impl PressureSnapshot {
    #[must_use]
    pub fn new(elapsed: Duration, pressures: &Pressures, regions: &Regions) -> Self {
        Self {
            elapsed,
            total: pressures.total(),
            regions: regions.averages(pressures),
        }
    }
}

pub type RegionHistory = RingBuffer<PressureSnapshot>;
