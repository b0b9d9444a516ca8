//! Sensor positions on the insole.
//!
//! Sensor layouts are usually measured in some arbitrary raw frame (e.g. the
//! millimetre grid of the insole PCB), while pressure is aggregated and
//! displayed in a target frame such as the foot outline image. The raw
//! layout is mapped onto the target frame once, when the configuration is
//! loaded.
use std::collections::BTreeMap;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::sensor::SensorId;

/// Position of every sensor in one coordinate frame.
pub type CoordinateMap = BTreeMap<SensorId, Point2<f32>>;

/// Axis aligned bounding box of a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point2<f32>,
    pub max: Point2<f32>,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Point2::origin(),
            max: Point2::origin(),
        }
    }
}

impl Bounds {
    /// Bounding box of all points, `{0, 0, 0, 0}` if there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2<f32>>) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::default();
        };

        points.fold(
            Self {
                min: *first,
                max: *first,
            },
            |bounds, point| Self {
                min: bounds.min.inf(point),
                max: bounds.max.sup(point),
            },
        )
    }

    #[must_use]
    pub fn of(map: &CoordinateMap) -> Self {
        Self::from_points(map.values())
    }

    /// Width and height of the box, where an empty axis counts as 1.
    #[must_use]
    fn span(&self) -> (f32, f32) {
        let span = |min: f32, max: f32| {
            let span = max - min;
            if span > 0.0 { span } else { 1.0 }
        };

        (span(self.min.x, self.max.x), span(self.min.y, self.max.y))
    }

    /// Clamps `point` into the box, per axis. NaN coordinates end up at the minimum.
    #[must_use]
    pub fn clamp(&self, point: Point2<f32>) -> Point2<f32> {
        let clamp = |value: f32, min: f32, max: f32| {
            if value.is_nan() {
                min
            } else {
                value.max(min).min(max)
            }
        };

        Point2::new(
            clamp(point.x, self.min.x, self.max.x),
            clamp(point.y, self.min.y, self.max.y),
        )
    }

    #[must_use]
    pub fn contains(&self, point: &Point2<f32>) -> bool {
        (self.min.x..=self.max.x).contains(&point.x) && (self.min.y..=self.max.y).contains(&point.y)
    }
}

/// Maps every raw coordinate into the target frame.
///
/// The raw bounding box is stretched onto the target bounding box, each axis
/// independently. An axis without extent in the raw layout collapses onto
/// the target minimum.
#[must_use]
pub fn normalize(raw: &CoordinateMap, target: &CoordinateMap) -> CoordinateMap {
    let raw_bounds = Bounds::of(raw);
    let target_bounds = Bounds::of(target);
    let (raw_span_x, raw_span_y) = raw_bounds.span();
    let (target_span_x, target_span_y) = target_bounds.span();

    raw.iter()
        .map(|(id, point)| {
            let x = target_bounds.min.x + (point.x - raw_bounds.min.x) / raw_span_x * target_span_x;
            let y = target_bounds.min.y + (point.y - raw_bounds.min.y) / raw_span_y * target_span_y;
            (id.clone(), Point2::new(x, y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(points: &[(&str, f32, f32)]) -> CoordinateMap {
        points
            .iter()
            .map(|(id, x, y)| (SensorId::from(*id), Point2::new(*x, *y)))
            .collect()
    }

    fn raw() -> CoordinateMap {
        map(&[
            ("fsr0", 210.0, 50.0),
            ("fsr1", 300.0, 400.0),
            ("fsr2", 130.0, 100.0),
            ("fsr3", 350.0, 175.0),
            ("fsr4", 400.0, 400.0),
            ("fsr5", 50.0, 210.0),
            ("fsr6", 50.0, 300.0),
        ])
    }

    fn target() -> CoordinateMap {
        map(&[
            ("fsr0", 160.0, 130.0),
            ("fsr1", 230.0, 140.0),
            ("fsr2", 175.0, 210.0),
            ("fsr3", 240.0, 225.0),
            ("fsr4", 190.0, 280.0),
            ("fsr5", 160.0, 350.0),
            ("fsr6", 220.0, 340.0),
        ])
    }

    #[test]
    fn empty_map_has_zero_bounds() {
        assert_eq!(Bounds::of(&CoordinateMap::new()), Bounds::default());
    }

    #[test]
    fn bounds_of_layout() {
        let bounds = Bounds::of(&raw());
        assert_eq!(bounds.min, Point2::new(50.0, 50.0));
        assert_eq!(bounds.max, Point2::new(400.0, 400.0));
    }

    #[test]
    fn raw_box_maps_onto_target_box() {
        let normalized = normalize(&raw(), &target());

        assert_eq!(Bounds::of(&normalized), Bounds::of(&target()));
        // fsr5 sits on the raw minimum x, fsr4 on the raw maximum x and y
        assert!((normalized[&SensorId::from("fsr5")].x - 160.0).abs() < 1e-4);
        let fsr4 = normalized[&SensorId::from("fsr4")];
        assert!((fsr4.x - 240.0).abs() < 1e-4);
        assert!((fsr4.y - 350.0).abs() < 1e-4);
        // (210 - 50) / 350 * 80 + 160
        assert!((normalized[&SensorId::from("fsr0")].x - 196.571_43).abs() < 1e-3);
    }

    #[test]
    fn normalizing_twice_is_identity() {
        let once = normalize(&raw(), &target());
        let twice = normalize(&once, &target());

        for (id, point) in &once {
            assert!((twice[id] - point).norm() < 1e-3);
        }
    }

    #[test]
    fn degenerate_axis_collapses_to_target_minimum() {
        let raw = map(&[("a", 5.0, 0.0), ("b", 5.0, 10.0)]);
        let target = map(&[("a", 100.0, 0.0), ("b", 200.0, 50.0)]);

        let normalized = normalize(&raw, &target);

        assert_eq!(normalized[&SensorId::from("a")], Point2::new(100.0, 0.0));
        assert_eq!(normalized[&SensorId::from("b")], Point2::new(100.0, 50.0));
    }

    #[test]
    fn small_span_still_fills_the_target() {
        let raw = map(&[("a", 0.0, 0.0), ("b", 0.5, 0.5)]);
        let target = map(&[("a", 0.0, 0.0), ("b", 100.0, 100.0)]);

        let normalized = normalize(&raw, &target);

        assert_eq!(normalized[&SensorId::from("b")], Point2::new(100.0, 100.0));
    }

    #[test]
    fn clamp_keeps_points_inside() {
        let bounds = Bounds {
            min: Point2::new(0.0, 0.0),
            max: Point2::new(10.0, 20.0),
        };

        assert_eq!(bounds.clamp(Point2::new(-5.0, 25.0)), Point2::new(0.0, 20.0));
        assert_eq!(bounds.clamp(Point2::new(f32::NAN, 5.0)), Point2::new(0.0, 5.0));
        assert!(bounds.contains(&bounds.clamp(Point2::new(100.0, -100.0))));
    }
}
