//! Clean-up of raw FSR voltages before they enter the pipeline.
//!
//! FSRs drift, pick up noise while the foot is in the air, and occasionally
//! fail in a way that pins them far above their neighbours. The
//! [`Conditioner`] removes a slowly learnt per-sensor baseline while the foot
//! is unloaded, and silences sensors that keep misbehaving.
use std::collections::{BTreeMap, BTreeSet};

use filter::{ExponentialSmoother, SmoothingFactor};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::{ReadingSource, SensorId, SensorReading, SourceError};

/// Configuration for the sensor conditioning.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConditioningConfig {
    /// Whether readings are conditioned at all.
    pub enabled: bool,
    /// Weight of a new idle sample in the per-sensor baseline.
    pub baseline_learn_rate: SmoothingFactor,
    /// Corrected voltages below this offset (in V) are reported as 0 V.
    pub baseline_offset_tolerance: f32,
    /// Voltage (in V) at which a sensor counts towards foot contact.
    pub contact_min_voltage: f32,
    /// Number of sensors that need to be in contact for the foot to be loaded.
    pub min_active_sensors: usize,
    /// Corrected voltage (in V) that counts as noise while the foot is unloaded.
    pub noise_threshold_voltage: f32,
    /// Number of noisy idle readings after which a sensor is disabled.
    pub noise_trigger_count: u32,
    /// Number of median absolute deviations above the median that count as an outlier.
    pub outlier_factor: f32,
    /// Lower bound (in V) of the outlier threshold.
    pub outlier_min_voltage: f32,
    /// Number of consecutive outlier readings after which a sensor is disabled.
    pub outlier_trigger_count: u32,
    /// Sensors that always read as 0 V.
    #[serde(default)]
    pub disabled_sensors: Vec<SensorId>,
    /// If not empty, only these sensors are reported, all others read as 0 V.
    #[serde(default)]
    pub allowed_sensors: Vec<SensorId>,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            baseline_learn_rate: SmoothingFactor::saturating(0.02),
            baseline_offset_tolerance: 0.02,
            contact_min_voltage: 0.35,
            min_active_sensors: 2,
            noise_threshold_voltage: 0.15,
            noise_trigger_count: 80,
            outlier_factor: 4.0,
            outlier_min_voltage: 0.4,
            outlier_trigger_count: 60,
            disabled_sensors: Vec::new(),
            allowed_sensors: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Channel {
    baseline: Option<ExponentialSmoother>,
    noise_count: u32,
    outlier_count: u32,
}

/// Stateful conditioning of raw readings for a fixed set of sensors.
#[derive(Debug)]
pub struct Conditioner {
    config: ConditioningConfig,
    channels: BTreeMap<SensorId, Channel>,
    auto_disabled: BTreeSet<SensorId>,
}

impl Conditioner {
    #[must_use]
    pub fn new(config: ConditioningConfig, sensors: &[SensorId]) -> Self {
        Self {
            config,
            channels: sensors
                .iter()
                .map(|id| (id.clone(), Channel::default()))
                .collect(),
            auto_disabled: BTreeSet::new(),
        }
    }

    /// Sensors that were disabled because they kept producing noise or outliers.
    pub fn auto_disabled(&self) -> impl Iterator<Item = &SensorId> {
        self.auto_disabled.iter()
    }

    /// Conditions a raw reading, the result contains every configured sensor.
    pub fn condition(&mut self, raw: &SensorReading) -> SensorReading {
        let foot_active = self.is_foot_active(raw);

        let mut corrected = BTreeMap::new();
        for (id, channel) in &mut self.channels {
            let volts = raw.voltage(id.as_str());
            let alpha = self.config.baseline_learn_rate;

            let baseline = channel.baseline.get_or_insert_with(|| {
                if foot_active {
                    ExponentialSmoother::with_initial(alpha, 0.0)
                } else {
                    ExponentialSmoother::new(alpha)
                }
            });
            if !foot_active {
                baseline.update(volts);
            }

            let offset = volts - baseline.state().unwrap_or(0.0);
            let volts = if offset < self.config.baseline_offset_tolerance {
                0.0
            } else {
                offset
            };
            corrected.insert(id.clone(), volts);
        }

        self.update_noise_detection(&corrected, foot_active);
        self.update_outlier_detection(&corrected);

        for (id, volts) in &mut corrected {
            if self.is_disabled(id) {
                *volts = 0.0;
            }
        }

        SensorReading::new(corrected)
    }

    fn is_foot_active(&self, raw: &SensorReading) -> bool {
        let active = self
            .channels
            .keys()
            .filter(|id| raw.voltage(id.as_str()) >= self.config.contact_min_voltage)
            .count();

        active >= self.config.min_active_sensors
    }

    fn is_disabled(&self, id: &SensorId) -> bool {
        self.auto_disabled.contains(id)
            || self.config.disabled_sensors.contains(id)
            || (!self.config.allowed_sensors.is_empty() && !self.config.allowed_sensors.contains(id))
    }

    fn update_noise_detection(&mut self, corrected: &BTreeMap<SensorId, f32>, foot_active: bool) {
        if foot_active {
            for channel in self.channels.values_mut() {
                channel.noise_count = 0;
            }
            return;
        }

        for (id, channel) in &mut self.channels {
            if corrected[id] > self.config.noise_threshold_voltage {
                channel.noise_count += 1;
                if channel.noise_count >= self.config.noise_trigger_count
                    && self.auto_disabled.insert(id.clone())
                {
                    tracing::warn!(sensor = %id, "disabling sensor, it keeps reading noise while unloaded");
                }
            } else {
                channel.noise_count = channel.noise_count.saturating_sub(1);
            }
        }
    }

    fn update_outlier_detection(&mut self, corrected: &BTreeMap<SensorId, f32>) {
        let magnitudes: Vec<f32> = corrected
            .values()
            .filter(|volts| **volts != 0.0)
            .map(|volts| volts.abs())
            .collect();

        if magnitudes.len() < 3 {
            for channel in self.channels.values_mut() {
                channel.outlier_count = 0;
            }
            return;
        }

        let median_volts = median(&magnitudes);
        let deviations: Vec<f32> = magnitudes.iter().map(|m| (m - median_volts).abs()).collect();
        let mad = median(&deviations);
        let threshold = self
            .config
            .outlier_min_voltage
            .max(median_volts + self.config.outlier_factor * mad);

        for (id, channel) in &mut self.channels {
            let magnitude = corrected[id].abs();
            if magnitude > threshold {
                channel.outlier_count += 1;
                if channel.outlier_count >= self.config.outlier_trigger_count
                    && self.auto_disabled.insert(id.clone())
                {
                    tracing::warn!(
                        sensor = %id,
                        "disabling sensor, {magnitude:.3} V exceeded the outlier threshold of {threshold:.3} V"
                    );
                }
            } else {
                channel.outlier_count = 0;
            }
        }
    }
}

/// Median of a non-empty slice, the mean of the two middle values for even lengths.
fn median(values: &[f32]) -> f32 {
    let mut sorted: Vec<OrderedFloat<f32>> = values.iter().copied().map(OrderedFloat).collect();
    sorted.sort_unstable();

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid].0
    } else {
        f32::midpoint(sorted[mid - 1].0, sorted[mid].0)
    }
}

/// A [`ReadingSource`] that conditions every reading of the wrapped source.
pub struct ConditionedSource<S> {
    inner: S,
    conditioner: Conditioner,
}

impl<S: ReadingSource> ConditionedSource<S> {
    pub fn new(inner: S, conditioner: Conditioner) -> Self {
        Self { inner, conditioner }
    }

    #[must_use]
    pub fn conditioner(&self) -> &Conditioner {
        &self.conditioner
    }
}

impl<S: ReadingSource> ReadingSource for ConditionedSource<S> {
    fn poll(&mut self) -> Result<Option<SensorReading>, SourceError> {
        Ok(self
            .inner
            .poll()?
            .map(|raw| self.conditioner.condition(&raw)))
    }

    fn is_exhausted(&self) -> bool {
        self.inner.is_exhausted()
    }
}
