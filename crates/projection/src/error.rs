//! Projection errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Invalid projection parameter: {0}")]
    InvalidParameter(String),

    #[error("Extent [{lon_min}, {lon_max}] x [{lat_min}, {lat_max}] does not project to a finite area")]
    EmptyExtent {
        lon_min: f64,
        lon_max: f64,
        lat_min: f64,
        lat_max: f64,
    },
}
