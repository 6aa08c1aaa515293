//! Equidistant cylindrical (Plate Carree) projection.
//!
//! Projected coordinates are degrees: x is longitude relative to the
//! central meridian, wrapped into [-180, 180), and y is latitude.

use crate::{normalize_longitude, MapProjection};

#[derive(Debug, Clone, Default)]
pub struct PlateCarree {
    /// Central meridian in degrees
    pub central_longitude: f64,
}

impl PlateCarree {
    pub fn new(central_longitude: f64) -> Self {
        Self { central_longitude }
    }
}

impl MapProjection for PlateCarree {
    fn project(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
            return None;
        }
        Some((normalize_longitude(lon - self.central_longitude), lat))
    }

    fn unproject(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() || x.abs() > 180.0 || y.abs() > 90.0 {
            return None;
        }
        Some((normalize_longitude(x + self.central_longitude), y))
    }

    fn name(&self) -> &'static str {
        "plate_carree"
    }

    fn wrap_width(&self) -> Option<f64> {
        Some(360.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_grid_longitudes() {
        let proj = PlateCarree::default();
        assert_eq!(proj.project(358.75, 10.0), Some((-1.25, 10.0)));
        assert_eq!(proj.project(135.0, 35.0), Some((135.0, 35.0)));
    }

    #[test]
    fn test_central_longitude_shift() {
        let proj = PlateCarree::new(180.0);
        assert_eq!(proj.project(135.0, 0.0), Some((-45.0, 0.0)));
        assert_eq!(proj.unproject(-45.0, 0.0), Some((135.0, 0.0)));
    }

    #[test]
    fn test_rejects_off_globe() {
        let proj = PlateCarree::default();
        assert!(proj.project(0.0, 91.0).is_none());
        assert!(proj.unproject(181.0, 0.0).is_none());
    }
}
