use std::io::BufRead;

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{ReadingSource, SensorId, SensorReading, SourceError, packet::parse_packet};

/// Reads one packet per poll from a line based stream, such as a serial
/// capture or a recorded session.
pub struct LineSource<R> {
    reader: R,
    sensors: Vec<SensorId>,
    line: String,
    exhausted: bool,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R, sensors: Vec<SensorId>) -> Self {
        Self {
            reader,
            sensors,
            line: String::new(),
            exhausted: false,
        }
    }
}

impl<R: BufRead> ReadingSource for LineSource<R> {
    fn poll(&mut self) -> Result<Option<SensorReading>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }

        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            tracing::info!("sensor stream ended");
            self.exhausted = true;
            return Ok(None);
        }

        Ok(parse_packet(&self.line, &self.sensors)?)
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Produces random voltages for every sensor, for running without hardware.
pub struct SimulatedSource {
    rng: StdRng,
    sensors: Vec<SensorId>,
}

impl SimulatedSource {
    const CENTER_VOLTS: f32 = 2.5;
    const MAX_VOLTS: f32 = 5.0;

    #[must_use]
    pub fn new(sensors: Vec<SensorId>, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sensors,
        }
    }
}

impl ReadingSource for SimulatedSource {
    fn poll(&mut self) -> Result<Option<SensorReading>, SourceError> {
        let reading = self
            .sensors
            .iter()
            .map(|id| {
                let deviation = self.rng.random_range(-0.9..0.9);
                let volts = Self::CENTER_VOLTS + Self::CENTER_VOLTS * deviation;
                (id.clone(), volts.clamp(0.0, Self::MAX_VOLTS))
            })
            .collect();

        Ok(Some(reading))
    }
}
