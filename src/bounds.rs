use anyhow::{ensure, Result};
use geo::Point;

use crate::mercator;

/// Geographic bounding box in degrees. Points carry longitude in `x`
/// and latitude in `y`; `min` is the south-west corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: Point,
    max: Point,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min: Point::new(min_lon.min(max_lon), min_lat.min(max_lat)),
            max: Point::new(min_lon.max(max_lon), min_lat.max(max_lat)),
        }
    }

    /// Smallest box containing every `(latitude, longitude)` point,
    /// widened by `padding` degrees on all four sides.
    pub fn from_points(points: &[(f64, f64)], padding: f64) -> Result<Self> {
        ensure!(
            !points.is_empty(),
            "cannot compute a bounding box without measurements"
        );

        let mut min_lat = f64::INFINITY;
        let mut min_lon = f64::INFINITY;
        let mut max_lat = f64::NEG_INFINITY;
        let mut max_lon = f64::NEG_INFINITY;
        for (lat, lon) in points {
            min_lat = min_lat.min(*lat);
            min_lon = min_lon.min(*lon);
            max_lat = max_lat.max(*lat);
            max_lon = max_lon.max(*lon);
        }

        Ok(Self {
            min: Point::new(min_lon - padding, min_lat - padding),
            max: Point::new(max_lon + padding, max_lat + padding),
        })
    }

    pub fn min_lat(&self) -> f64 {
        self.min.y()
    }

    pub fn min_lon(&self) -> f64 {
        self.min.x()
    }

    pub fn max_lat(&self) -> f64 {
        self.max.y()
    }

    pub fn max_lon(&self) -> f64 {
        self.max.x()
    }

    /// Both corners in EPSG:3857 metric coordinates for the map export
    /// endpoint. The south-west corner maps to the minimum metric pair.
    pub fn reproject_for_export(&self) -> ((f64, f64), (f64, f64)) {
        (
            mercator::to_epsg3857(self.min_lat(), self.min_lon()),
            mercator::to_epsg3857(self.max_lat(), self.max_lon()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_point_padding() {
        let b = BoundingBox::from_points(&[(52.0, 13.0)], 0.02).unwrap();
        assert_eq!(b.min_lat(), 51.98);
        assert_eq!(b.min_lon(), 12.98);
        assert_eq!(b.max_lat(), 52.02);
        assert_eq!(b.max_lon(), 13.02);
    }

    #[test]
    fn spans_all_points() {
        let b = BoundingBox::from_points(&[(52.5, 13.4), (52.4, 13.6), (52.6, 13.5)], 0.0).unwrap();
        assert_eq!(b.min_lat(), 52.4);
        assert_eq!(b.min_lon(), 13.4);
        assert_eq!(b.max_lat(), 52.6);
        assert_eq!(b.max_lon(), 13.6);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(BoundingBox::from_points(&[], 0.02).is_err());
    }

    #[test]
    fn export_corners_are_ordered() {
        let b = BoundingBox::from_points(&[(52.0, 13.0), (52.5, 13.5)], 0.0).unwrap();
        let (min, max) = b.reproject_for_export();
        assert!(min.0 < max.0);
        assert!(min.1 < max.1);
    }
}
