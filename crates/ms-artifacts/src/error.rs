//! Error types for result export

use thiserror::Error;

/// Errors raised while exporting a result table
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown export format: {0}")]
    UnknownFormat(String),
}

pub type ExportResult<T> = Result<T, ExportError>;
