//! Colors for the plantar pressure heatmap.
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    layout::CoordinateMap,
    sensor::{SensorId, pressure::Pressures},
};

/// Configuration of the heatmap rendering.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct HeatmapConfig {
    /// Pressure (in kPa) that maps to full intensity.
    pub max_pressure: f32,
    /// Colors from no pressure to full intensity.
    #[serde(default)]
    pub gradient: Gradient,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            max_pressure: 150.0,
            gradient: Gradient::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn lerp(self, other: Self, t: f32) -> Self {
        let channel = |a: u8, b: u8| {
            let (a, b) = (f32::from(a), f32::from(b));
            (a + (b - a) * t).round() as u8
        };

        Self::new(
            channel(self.r, other.r),
            channel(self.g, other.g),
            channel(self.b, other.b),
        )
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(color: Rgb) -> Self {
        [color.r, color.g, color.b]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GradientStop {
    pub stop: f32,
    pub color: Rgb,
}

#[derive(Debug, Error, PartialEq)]
pub enum GradientError {
    #[error("gradient needs at least two stops, got {0}")]
    TooFewStops(usize),
    #[error("gradient must start at 0 and end at 1, got {first} and {last}")]
    Range { first: f32, last: f32 },
    #[error("gradient stop {stop} comes after a larger stop")]
    NotIncreasing { stop: f32 },
    #[error("gradient stop {0} is not a finite number")]
    NotFinite(f32),
}

/// Piecewise linear color gradient over `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GradientStop>", into = "Vec<GradientStop>")]
pub struct Gradient(Vec<GradientStop>);

impl Default for Gradient {
    /// Blue through green and yellow to red.
    fn default() -> Self {
        Self(vec![
            GradientStop {
                stop: 0.0,
                color: Rgb::new(59, 130, 246),
            },
            GradientStop {
                stop: 0.55,
                color: Rgb::new(22, 163, 74),
            },
            GradientStop {
                stop: 0.85,
                color: Rgb::new(250, 204, 21),
            },
            GradientStop {
                stop: 1.0,
                color: Rgb::new(239, 68, 68),
            },
        ])
    }
}

impl Gradient {
    pub fn new(stops: Vec<GradientStop>) -> Result<Self, GradientError> {
        let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
            return Err(GradientError::TooFewStops(0));
        };
        if stops.len() < 2 {
            return Err(GradientError::TooFewStops(stops.len()));
        }
        if first.stop != 0.0 || last.stop != 1.0 {
            return Err(GradientError::Range {
                first: first.stop,
                last: last.stop,
            });
        }
        if let Some(stop) = stops.iter().find(|stop| !stop.stop.is_finite()) {
            return Err(GradientError::NotFinite(stop.stop));
        }
        if let Some(pair) = stops.windows(2).find(|pair| pair[1].stop < pair[0].stop) {
            return Err(GradientError::NotIncreasing { stop: pair[1].stop });
        }

        Ok(Self(stops))
    }

    #[must_use]
    pub fn stops(&self) -> &[GradientStop] {
        &self.0
    }

    /// Color at `intensity`, clamped into `[0, 1]`.
    ///
    /// A value outside of every segment, such as NaN, gets the final color.
    #[must_use]
    pub fn interpolate(&self, intensity: f32) -> Rgb {
        let value = intensity.clamp(0.0, 1.0);

        for pair in self.0.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if value >= from.stop && value <= to.stop {
                let range = to.stop - from.stop;
                let range = if range > 0.0 { range } else { 1.0 };
                return from.color.lerp(to.color, (value - from.stop) / range);
            }
        }

        self.0.last().map_or(Rgb::new(0, 0, 0), |last| last.color)
    }
}

impl TryFrom<Vec<GradientStop>> for Gradient {
    type Error = GradientError;

    fn try_from(stops: Vec<GradientStop>) -> Result<Self, Self::Error> {
        Self::new(stops)
    }
}

impl From<Gradient> for Vec<GradientStop> {
    fn from(gradient: Gradient) -> Self {
        gradient.0
    }
}

/// Relative pressure of a sensor, saturating at 1 for `max_pressure` and above.
#[must_use]
pub fn intensity(kpa: f32, max_pressure: f32) -> f32 {
    (kpa / max_pressure).clamp(0.0, 1.0)
}

/// One sensor blob of the heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub sensor: SensorId,
    /// Position in the target frame.
    pub position: Point2<f32>,
    pub intensity: f32,
    pub color: Rgb,
    /// Opacity at the blob center, fading out towards the edge.
    pub opacity: f32,
}

/// Heatmap blobs for every loaded sensor. Unloaded sensors are not drawn.
#[must_use]
pub fn heatmap_cells(
    pressures: &Pressures,
    coordinates: &CoordinateMap,
    config: &HeatmapConfig,
) -> Vec<HeatmapCell> {
    pressures
        .iter()
        .filter(|(_, kpa)| *kpa > 0.0)
        .filter_map(|(id, kpa)| {
            let position = *coordinates.get(id)?;
            let intensity = intensity(kpa, config.max_pressure);

            Some(HeatmapCell {
                sensor: id.clone(),
                position,
                intensity,
                color: config.gradient.interpolate(intensity),
                opacity: (0.35 + intensity).min(0.85),
            })
        })
        .collect()
}
