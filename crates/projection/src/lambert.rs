//! Lambert Conformal Conic projection.
//!
//! A cone secant to the sphere along two standard parallels, unrolled onto
//! a plane. The regional maps of Japan use it with the conventional
//! defaults: central meridian 96W, origin latitude 39N, standard parallels
//! 33N and 45N. Points south of the cutoff latitude are not projected,
//! which keeps the opposite pole (where the cone radius diverges) out of
//! the plane.
//!
//! Projected coordinates are metres on a sphere of radius 6371229 m.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::error::ProjectionError;
use crate::{normalize_longitude, MapProjection};

/// Sphere radius used by GRIB shape-of-earth code 6.
pub const EARTH_RADIUS: f64 = 6_371_229.0;

/// Lambert Conformal Conic projection parameters.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Central meridian in radians
    pub lon0: f64,
    /// Latitude of the projection origin in radians
    pub lat0: f64,
    /// First standard parallel in radians
    pub latin1: f64,
    /// Second standard parallel in radians
    pub latin2: f64,
    /// Southernmost latitude that is projected, in degrees
    pub cutoff: f64,
    pub earth_radius: f64,
    /// Cone constant (n)
    n: f64,
    /// F constant
    f: f64,
    /// Rho at the origin latitude
    rho0: f64,
}

impl LambertConformal {
    /// Build a projection from angles in degrees.
    pub fn new(
        central_longitude: f64,
        central_latitude: f64,
        standard_parallels: (f64, f64),
        cutoff: f64,
    ) -> Result<Self, ProjectionError> {
        let (p1, p2) = standard_parallels;
        for (name, value) in [
            ("central_latitude", central_latitude),
            ("standard_parallel", p1),
            ("standard_parallel", p2),
            ("cutoff", cutoff),
        ] {
            if !value.is_finite() || value.abs() >= 90.0 {
                return Err(ProjectionError::InvalidParameter(format!(
                    "{} must lie strictly between -90 and 90, got {}",
                    name, value
                )));
            }
        }
        if p1 + p2 == 0.0 {
            return Err(ProjectionError::InvalidParameter(
                "standard parallels symmetric about the equator give a cylinder, not a cone"
                    .to_string(),
            ));
        }
        if !central_longitude.is_finite() {
            return Err(ProjectionError::InvalidParameter(
                "central_longitude must be finite".to_string(),
            ));
        }

        Ok(Self::from_degrees(
            central_longitude,
            central_latitude,
            standard_parallels,
            cutoff,
        ))
    }

    /// Central meridian 96W, origin 39N, parallels 33N/45N, cutoff 30S.
    pub fn conventional() -> Self {
        Self::from_degrees(-96.0, 39.0, (33.0, 45.0), -30.0)
    }

    fn from_degrees(
        central_longitude: f64,
        central_latitude: f64,
        (p1, p2): (f64, f64),
        cutoff: f64,
    ) -> Self {
        let latin1 = p1.to_radians();
        let latin2 = p2.to_radians();
        let lat0 = central_latitude.to_radians();

        let n = if (latin1 - latin2).abs() < 1e-10 {
            // Tangent cone
            latin1.sin()
        } else {
            let ln_ratio = (latin1.cos() / latin2.cos()).ln();
            let tan_ratio =
                ((FRAC_PI_4 + latin2 / 2.0).tan() / (FRAC_PI_4 + latin1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };

        let f = (latin1.cos() * (FRAC_PI_4 + latin1 / 2.0).tan().powf(n)) / n;
        let rho0 = EARTH_RADIUS * f / (FRAC_PI_4 + lat0 / 2.0).tan().powf(n);

        Self {
            lon0: central_longitude.to_radians(),
            lat0,
            latin1,
            latin2,
            cutoff,
            earth_radius: EARTH_RADIUS,
            n,
            f,
            rho0,
        }
    }

    /// Cone constant.
    pub fn cone_constant(&self) -> f64 {
        self.n
    }

    fn rho(&self, lat: f64) -> f64 {
        self.earth_radius * self.f / (FRAC_PI_4 + lat / 2.0).tan().powf(self.n)
    }
}

impl Default for LambertConformal {
    fn default() -> Self {
        Self::conventional()
    }
}

impl MapProjection for LambertConformal {
    fn project(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !lon.is_finite() || !lat.is_finite() || lat > 90.0 || lat < self.cutoff {
            return None;
        }
        let dlon = normalize_longitude(lon - self.lon0.to_degrees()).to_radians();
        let rho = self.rho(lat.to_radians());
        let theta = self.n * dlon;

        let x = rho * theta.sin();
        let y = self.rho0 - rho * theta.cos();
        Some((x, y))
    }

    fn unproject(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let dy = self.rho0 - y;
        let sign = self.n.signum();
        let rho = sign * (x * x + dy * dy).sqrt();
        let theta = (sign * x).atan2(sign * dy);

        // Outside the unrolled cone's wedge
        if theta.abs() > (self.n * PI).abs() {
            return None;
        }

        let lat = if rho == 0.0 {
            sign * FRAC_PI_2
        } else {
            2.0 * (self.earth_radius * self.f / rho).powf(1.0 / self.n).atan() - FRAC_PI_2
        };
        let lat = lat.to_degrees();
        if lat < self.cutoff {
            return None;
        }
        let lon = normalize_longitude((self.lon0 + theta / self.n).to_degrees());
        Some((lon, lat))
    }

    fn name(&self) -> &'static str {
        "lambert_conformal"
    }
}
