//! Error types for GRIB decoding.

use thiserror::Error;

/// Result type alias using GribError.
pub type GribResult<T> = Result<T, GribError>;

/// Errors raised while reading, decoding or selecting GRIB records.
#[derive(Debug, Error)]
pub enum GribError {
    #[error("Failed to read GRIB file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid GRIB format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unsupported GRIB feature: {0}")]
    Unsupported(String),

    #[error("Unpacking failed: {0}")]
    UnpackingError(String),

    #[error("No records match selector: {0}")]
    NoMatchingRecords(String),

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),
}
