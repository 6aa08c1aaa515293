//! Error types for table loading and the statistical routines.

use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unknown text encoding label: {0}")]
    UnknownEncoding(String),

    #[error("Input is not valid {encoding}")]
    Encoding { encoding: &'static str },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid value in column '{column}' at row {row}: {message}")]
    InvalidValue {
        column: String,
        row: usize,
        message: String,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
