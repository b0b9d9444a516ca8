//! Center of pressure (CoP) of the foot on the insole.
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::{
    history::RingBuffer,
    layout::{Bounds, CoordinateMap},
    sensor::{SensorId, pressure::Pressures},
};

/// Configuration for the center of pressure estimation.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct CopConfig {
    /// Pressure (in kPa) a sensor needs to exceed to contribute to the CoP.
    pub activity_threshold: f32,
    /// Maximum number of points kept in the CoP trajectory.
    pub trajectory_capacity: usize,
}

impl Default for CopConfig {
    fn default() -> Self {
        Self {
            activity_threshold: 1.0,
            trajectory_capacity: 200,
        }
    }
}

/// Pressure weighted centroid of all sensors above `threshold`.
///
/// Returns `None` if no sensor exceeds the threshold, i.e. the foot is not in
/// contact with the ground.
#[must_use]
pub fn weighted_centroid(
    pressures: &Pressures,
    coordinates: &CoordinateMap,
    threshold: f32,
) -> Option<Point2<f32>> {
    let (weighted_sum, weight) = pressures
        .iter()
        .filter(|(_, kpa)| *kpa > threshold)
        .filter_map(|(id, kpa)| coordinates.get(id).map(|point| (point, kpa)))
        .fold(
            (Vector2::zeros(), 0.0),
            |(sum, weight): (Vector2<f32>, f32), (point, kpa)| {
                (sum + point.coords * kpa, weight + kpa)
            },
        );

    (weight > 0.0).then(|| Point2::from(weighted_sum / weight))
}

/// The current center of pressure, together with its recent trajectory.
#[derive(Debug, Clone, Default)]
pub struct CenterOfPressure {
    point: Option<Point2<f32>>,
    trajectory: RingBuffer<Point2<f32>>,
}

impl CenterOfPressure {
    #[must_use]
    pub fn new(trajectory_capacity: usize) -> Self {
        Self {
            point: None,
            trajectory: RingBuffer::new(trajectory_capacity),
        }
    }

    /// Updates the CoP from a new snapshot.
    ///
    /// The point is clamped to `bounds`, so it never leaves the sensor layout.
    /// When the foot loses contact the trajectory is discarded, the next
    /// contact starts a fresh one.
    pub fn update(
        &mut self,
        pressures: &Pressures,
        coordinates: &CoordinateMap,
        bounds: &Bounds,
        threshold: f32,
    ) -> Option<Point2<f32>> {
        self.point = weighted_centroid(pressures, coordinates, threshold).map(|p| bounds.clamp(p));

        match self.point {
            Some(point) => self.trajectory.push(point),
            None => self.trajectory.clear(),
        }

        self.point
    }

    #[must_use]
    pub fn point(&self) -> Option<Point2<f32>> {
        self.point
    }

    /// Recent CoP points, oldest first.
    #[must_use]
    pub fn trajectory(&self) -> &RingBuffer<Point2<f32>> {
        &self.trajectory
    }
}

/// Highest pressure in a snapshot, and the sensor that measured it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peak {
    pub sensor: SensorId,
    pub pressure: f32,
}

/// Finds the highest pressure in the snapshot. Ties go to the sensor that comes first.
#[must_use]
pub fn instantaneous_peak(pressures: &Pressures) -> Option<Peak> {
    pressures
        .iter()
        .fold(None, |peak: Option<(&SensorId, f32)>, (id, kpa)| match peak {
            Some((_, highest)) if kpa <= highest => peak,
            _ => Some((id, kpa)),
        })
        .map(|(sensor, pressure)| Peak {
            sensor: sensor.clone(),
            pressure,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinates() -> CoordinateMap {
        [
            ("heel", Point2::new(0.0, 10.0)),
            ("mid", Point2::new(0.0, 5.0)),
            ("toe", Point2::new(4.0, 0.0)),
        ]
        .into_iter()
        .map(|(id, p)| (SensorId::from(id), p))
        .collect()
    }

    fn pressures(heel: f32, mid: f32, toe: f32) -> Pressures {
        [("heel", heel), ("mid", mid), ("toe", toe)].into_iter().collect()
    }

    #[test]
    fn centroid_is_pressure_weighted() {
        let centroid = weighted_centroid(&pressures(100.0, 0.0, 100.0), &coordinates(), 1.0).unwrap();

        assert!((centroid - Point2::new(2.0, 5.0)).norm() < 1e-5);
    }

    #[test]
    fn sensors_below_threshold_are_ignored() {
        let centroid = weighted_centroid(&pressures(100.0, 0.5, 1.0), &coordinates(), 1.0).unwrap();

        assert!((centroid - Point2::new(0.0, 10.0)).norm() < 1e-5);
        assert_eq!(weighted_centroid(&pressures(1.0, 0.0, 0.5), &coordinates(), 1.0), None);
    }

    #[test]
    fn point_is_clamped_to_bounds() {
        // heel only, but the bounds are tighter than the heel position
        let bounds = Bounds {
            min: Point2::new(1.0, 1.0),
            max: Point2::new(3.0, 8.0),
        };
        let mut cop = CenterOfPressure::new(10);

        let point = cop
            .update(&pressures(50.0, 0.0, 0.0), &coordinates(), &bounds, 1.0)
            .unwrap();

        assert_eq!(point, Point2::new(1.0, 8.0));
        assert!(bounds.contains(&point));
    }

    #[test]
    fn trajectory_is_bounded() {
        let bounds = Bounds::of(&coordinates());
        let mut cop = CenterOfPressure::new(3);

        for step in 1..=5 {
            let heel = 10.0 * step as f32;
            cop.update(&pressures(heel, 0.0, 50.0), &coordinates(), &bounds, 1.0);
        }

        assert_eq!(cop.trajectory().len(), 3);
        assert_eq!(cop.trajectory().latest().copied(), cop.point());
    }

    #[test]
    fn lift_off_clears_trajectory() {
        let bounds = Bounds::of(&coordinates());
        let mut cop = CenterOfPressure::new(10);
        cop.update(&pressures(50.0, 50.0, 0.0), &coordinates(), &bounds, 1.0);
        cop.update(&pressures(50.0, 50.0, 50.0), &coordinates(), &bounds, 1.0);
        assert_eq!(cop.trajectory().len(), 2);

        assert_eq!(cop.update(&pressures(0.0, 0.0, 0.0), &coordinates(), &bounds, 1.0), None);
        assert!(cop.trajectory().is_empty());

        cop.update(&pressures(0.0, 0.0, 80.0), &coordinates(), &bounds, 1.0);
        assert_eq!(cop.trajectory().to_vec(), [Point2::new(4.0, 0.0)]);
    }

    #[test]
    fn peak_prefers_first_of_equal_pressures() {
        let peak = instantaneous_peak(&pressures(20.0, 80.0, 80.0)).unwrap();
        assert_eq!(peak.sensor.as_str(), "mid");
        assert_eq!(peak.pressure, 80.0);

        let idle = instantaneous_peak(&pressures(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(idle.sensor.as_str(), "heel");
        assert_eq!(instantaneous_peak(&Pressures::default()), None);
    }
}
