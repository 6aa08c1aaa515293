//! Pipeline error type.

use std::path::PathBuf;

use analysis::AnalysisError;
use grib_reader::GribError;
use projection::ProjectionError;
use renderer::RenderError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing input {path}: {reason}")]
    MissingInput { path: PathBuf, reason: String },

    #[error("GRIB error: {0}")]
    Grib(#[from] GribError),

    #[error("Cluster table error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Station table error: {0}")]
    Station(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether running again could succeed without changing any input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Network(_))
    }
}

impl From<ProjectionError> for PipelineError {
    fn from(err: ProjectionError) -> Self {
        PipelineError::Render(RenderError::Projection(err))
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Network(err.to_string())
    }
}
