//! Web-Mercator coordinate transforms.
//!
//! Two target spaces: the unit square used by the slippy tile pyramid
//! (`project`, `x` and `y` in `[0, 1]`, `y` grows southward) and the
//! EPSG:3857 metric plane expected by operator map export endpoints
//! (`to_epsg3857`). Every plotted series goes through the same
//! transform so overlays line up.

use std::f64::consts::PI;

use crate::bounds::BoundingBox;

const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Project into the unit square of the tile pyramid.
pub fn project(latitude: f64, longitude: f64) -> (f64, f64) {
    let x = (longitude + 180.0) / 360.0;
    let y = (1.0 - latitude.to_radians().tan().asinh() / PI) / 2.0;
    (x, y)
}

/// Inverse of [`project`], returning `(latitude, longitude)`.
pub fn unproject(x: f64, y: f64) -> (f64, f64) {
    let longitude = x * 360.0 - 180.0;
    let latitude = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    (latitude, longitude)
}

/// Project into EPSG:3857 metric coordinates.
pub fn to_epsg3857(latitude: f64, longitude: f64) -> (f64, f64) {
    let x = EARTH_RADIUS_M * longitude.to_radians();
    let y = EARTH_RADIUS_M * latitude.to_radians().tan().asinh();
    (x, y)
}

/// Inverse of [`to_epsg3857`], returning `(latitude, longitude)`.
pub fn from_epsg3857(x: f64, y: f64) -> (f64, f64) {
    let longitude = (x / EARTH_RADIUS_M).to_degrees();
    let latitude = (y / EARTH_RADIUS_M).sinh().atan().to_degrees();
    (latitude, longitude)
}

/// View rectangle in unit-square coordinates. `y_min` is the northern
/// edge because the tile pyramid's `y` axis points south.
#[derive(Debug, Clone, Copy)]
pub struct Extent {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Extent {
    pub fn from_bounds(bounds: &BoundingBox) -> Self {
        let (x_min, y_min) = project(bounds.max_lat(), bounds.min_lon());
        let (x_max, y_max) = project(bounds.min_lat(), bounds.max_lon());
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Expand the short dimension around its center until the extent
    /// matches `ratio` (width over height). Never shrinks, so every
    /// measurement stays inside the view.
    pub fn to_aspect(self, ratio: f64) -> Self {
        let current = self.width() / self.height();
        if current < ratio {
            let half = self.height() * ratio / 2.0;
            let center = (self.x_min + self.x_max) / 2.0;
            Self {
                x_min: center - half,
                x_max: center + half,
                ..self
            }
        } else {
            let half = self.width() / ratio / 2.0;
            let center = (self.y_min + self.y_max) / 2.0;
            Self {
                y_min: center - half,
                y_max: center + half,
                ..self
            }
        }
    }

    /// Geographic bounds of the extent, for fetching an overlay that
    /// covers exactly the rendered view.
    pub fn to_bounds(&self) -> BoundingBox {
        let (max_lat, min_lon) = unproject(self.x_min, self.y_min);
        let (min_lat, max_lon) = unproject(self.x_max, self.y_max);
        BoundingBox::new(min_lat, min_lon, max_lat, max_lon)
    }
}
