//! Sensor readings and the collaborators that acquire them.
//!
//! Everything in here sits in front of the processing pipeline: sources
//! produce raw [`SensorReading`]s, optionally cleaned up by
//! [`conditioning`], and the [`pressure`] module turns them into physical
//! units.
pub mod conditioning;
pub mod packet;
pub mod pressure;
pub mod source;

use std::{borrow::Borrow, collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use conditioning::{ConditionedSource, Conditioner};
pub use packet::{PacketError, parse_packet};
pub use source::{LineSource, SimulatedSource};

/// Identifier of a single force sensitive resistor in the insole, e.g. `fsr3`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(String);

impl SensorId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SensorId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SensorId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw voltages of one acquisition cycle, keyed by sensor.
///
/// A reading is immutable once captured and superseded by the next one.
/// Sensors that are missing from the reading read as 0 V.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorReading(BTreeMap<SensorId, f32>);

impl SensorReading {
    #[must_use]
    pub fn new(voltages: BTreeMap<SensorId, f32>) -> Self {
        Self(voltages)
    }

    /// Voltage of `sensor`, `0.0` if the reading does not contain it.
    #[must_use]
    pub fn voltage(&self, sensor: &str) -> f32 {
        self.0.get(sensor).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SensorId, f32)> {
        self.0.iter().map(|(id, volts)| (id, *volts))
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

impl<K: Into<SensorId>> FromIterator<(K, f32)> for SensorReading {
    fn from_iter<T: IntoIterator<Item = (K, f32)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(id, volts)| (id.into(), volts)).collect())
    }
}

/// Failure of a [`ReadingSource`] to deliver data in a cycle.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read from the sensor stream")]
    Io(#[from] std::io::Error),
    #[error("received a malformed packet")]
    Packet(#[from] PacketError),
}

/// Acquisition collaborator that delivers sensor readings on a fixed schedule.
///
/// `Ok(None)` means there is no new data this cycle, which is not an error.
/// Errors are soft: the cycle is skipped and the next poll is the retry.
pub trait ReadingSource {
    fn poll(&mut self) -> Result<Option<SensorReading>, SourceError>;

    /// Whether this source will never deliver another reading.
    fn is_exhausted(&self) -> bool {
        false
    }
}

impl<S: ReadingSource + ?Sized> ReadingSource for Box<S> {
    fn poll(&mut self) -> Result<Option<SensorReading>, SourceError> {
        (**self).poll()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}
