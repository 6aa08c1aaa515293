//! Map projections for geographic plotting.
//!
//! Implements the projections from scratch: each maps longitude/latitude in
//! degrees onto a plane and back. The renderer only sees the
//! [`MapProjection`] trait.

pub mod bbox;
pub mod error;
pub mod lambert;
pub mod plate_carree;

use serde::{Deserialize, Serialize};

pub use bbox::BoundingBox;
pub use error::ProjectionError;
pub use lambert::LambertConformal;
pub use plate_carree::PlateCarree;

/// Forward and inverse mapping between geographic and projected coordinates.
pub trait MapProjection: Send + Sync {
    /// Geographic degrees to plane coordinates. `None` when the point is
    /// outside the projection's domain.
    fn project(&self, lon: f64, lat: f64) -> Option<(f64, f64)>;

    /// Plane coordinates back to geographic degrees (longitude in [-180, 180)).
    fn unproject(&self, x: f64, y: f64) -> Option<(f64, f64)>;

    fn name(&self) -> &'static str;

    /// Plane width after which x repeats, for projections whose plane has a
    /// seam. Lines crossing the seam must be split by the caller.
    fn wrap_width(&self) -> Option<f64> {
        None
    }
}

/// Wrap a longitude into [-180, 180).
pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Projection choice as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectionKind {
    PlateCarree {
        #[serde(default)]
        central_longitude: f64,
    },
    LambertConformal {
        #[serde(default = "default_lcc_central_longitude")]
        central_longitude: f64,
        #[serde(default = "default_lcc_central_latitude")]
        central_latitude: f64,
        #[serde(default = "default_lcc_standard_parallels")]
        standard_parallels: (f64, f64),
        #[serde(default = "default_lcc_cutoff")]
        cutoff: f64,
    },
}

fn default_lcc_central_longitude() -> f64 {
    -96.0
}

fn default_lcc_central_latitude() -> f64 {
    39.0
}

fn default_lcc_standard_parallels() -> (f64, f64) {
    (33.0, 45.0)
}

fn default_lcc_cutoff() -> f64 {
    -30.0
}

impl ProjectionKind {
    pub fn plate_carree() -> Self {
        Self::PlateCarree {
            central_longitude: 0.0,
        }
    }

    pub fn lambert_conformal() -> Self {
        Self::LambertConformal {
            central_longitude: default_lcc_central_longitude(),
            central_latitude: default_lcc_central_latitude(),
            standard_parallels: default_lcc_standard_parallels(),
            cutoff: default_lcc_cutoff(),
        }
    }

    pub fn build(&self) -> Result<Box<dyn MapProjection>, ProjectionError> {
        match *self {
            Self::PlateCarree { central_longitude } => {
                if !central_longitude.is_finite() {
                    return Err(ProjectionError::InvalidParameter(
                        "central_longitude must be finite".to_string(),
                    ));
                }
                Ok(Box::new(PlateCarree::new(central_longitude)))
            }
            Self::LambertConformal {
                central_longitude,
                central_latitude,
                standard_parallels,
                cutoff,
            } => Ok(Box::new(LambertConformal::new(
                central_longitude,
                central_latitude,
                standard_parallels,
                cutoff,
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_longitude() {
        assert_eq!(normalize_longitude(180.0), -180.0);
        assert_eq!(normalize_longitude(-180.0), -180.0);
        assert_eq!(normalize_longitude(270.0), -90.0);
        assert_eq!(normalize_longitude(135.0), 135.0);
    }

    #[test]
    fn test_kind_from_yaml_with_defaults() {
        let kind: ProjectionKind = serde_yaml::from_str("kind: lambert_conformal\n").unwrap();
        assert_eq!(kind, ProjectionKind::lambert_conformal());
        assert_eq!(kind.build().unwrap().name(), "lambert_conformal");

        let kind: ProjectionKind =
            serde_yaml::from_str("kind: plate_carree\ncentral_longitude: 180\n").unwrap();
        assert_eq!(
            kind,
            ProjectionKind::PlateCarree {
                central_longitude: 180.0
            }
        );
    }

    #[test]
    fn test_invalid_kind_is_rejected_on_build() {
        let kind = ProjectionKind::LambertConformal {
            central_longitude: 0.0,
            central_latitude: 0.0,
            standard_parallels: (10.0, -10.0),
            cutoff: -30.0,
        };
        assert!(kind.build().is_err());
    }
}
