//! Error types for the console

use ms_rest_client::RestClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("REST client error: {0}")]
    RestClient(#[from] RestClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for console operations
pub type ConsoleResult<T> = Result<T, ConsoleError>;
