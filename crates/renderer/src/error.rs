//! Rendering errors.

use projection::ProjectionError;
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Shape mismatch: expected {expected} values, got {actual} for {what}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid contour levels: {0}")]
    InvalidLevels(String),

    #[error("Invalid canvas: {0}")]
    Canvas(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("Invalid coastline data: {0}")]
    Coastline(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}
