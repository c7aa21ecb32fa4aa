//! Error types for the REST API client

use ms_client_api::ClientApiError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when using the REST API client
#[derive(Debug, Error)]
pub enum RestClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("{}", .0.first_message())]
    ApiContract(#[from] ms_rest_api_contract::ApiContractError),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// 401 on an authenticated request; the session has been expired
    #[error("session expired, please log in again")]
    Unauthorized,

    #[error("{message}")]
    ServerError { status: StatusCode, message: String },

    #[error("unexpected response from {path}: {reason}")]
    Schema { path: String, reason: String },
}

/// Result type alias for REST client operations
pub type RestClientResult<T> = Result<T, RestClientError>;

impl From<RestClientError> for ClientApiError {
    fn from(err: RestClientError) -> Self {
        match err {
            RestClientError::Unauthorized => ClientApiError::Unauthorized,
            RestClientError::Schema { .. } => ClientApiError::Schema(err.to_string()),
            RestClientError::ServerError { .. } | RestClientError::ApiContract(_) => {
                ClientApiError::Server(err.to_string())
            }
            other => ClientApiError::Unexpected(other.to_string()),
        }
    }
}
