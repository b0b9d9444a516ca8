//! Text packets sent by the insole firmware.
//!
//! The firmware writes one packet per line, either as a JSON object
//! (`{"fsr0": 1.2, "fsr1": 0.0}`) or as whitespace separated voltages in the
//! order of the configured sensors (`1.2 0.0 0.4 ...`).
use std::num::ParseFloatError;

use thiserror::Error;

use super::{SensorId, SensorReading};

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("invalid JSON packet")]
    Json(#[from] serde_json::Error),
    #[error("invalid voltage `{value}`")]
    Voltage {
        value: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("packet has {found} values, expected {expected}")]
    Incomplete { found: usize, expected: usize },
}

/// Parses a single line into a reading.
///
/// Blank lines carry no data and yield `Ok(None)`. Positional packets with
/// fewer values than `sensors` are rejected, as the values can no longer be
/// attributed to the right sensors. Trailing extra values are ignored.
pub fn parse_packet(line: &str, sensors: &[SensorId]) -> Result<Option<SensorReading>, PacketError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if line.starts_with('{') && line.ends_with('}') {
        return Ok(Some(serde_json::from_str(line)?));
    }

    let values = line
        .split_whitespace()
        .map(|value| {
            value.parse::<f32>().map_err(|source| PacketError::Voltage {
                value: value.to_owned(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() < sensors.len() {
        return Err(PacketError::Incomplete {
            found: values.len(),
            expected: sensors.len(),
        });
    }

    Ok(Some(sensors.iter().cloned().zip(values).collect()))
}
