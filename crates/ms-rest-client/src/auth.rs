//! Authentication headers for the REST API client

use ms_client_api::SessionContext;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::error::{RestClientError, RestClientResult};

/// Authentication methods supported by the API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthMethod {
    /// Bearer token (`Authorization: Bearer <token>`)
    Bearer(String),
    /// No authentication
    #[default]
    None,
}

impl AuthMethod {
    /// Create bearer token authentication from a token string
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// The method matching the current session state
    pub fn from_session(session: &SessionContext) -> Self {
        session.token().map_or(AuthMethod::None, AuthMethod::Bearer)
    }

    /// Apply authentication headers to a request
    pub fn apply_to_headers(&self, headers: &mut HeaderMap) -> RestClientResult<()> {
        if let AuthMethod::Bearer(token) = self {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| RestClientError::Auth(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(())
    }

    pub fn headers(&self) -> RestClientResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        self.apply_to_headers(&mut headers)?;
        Ok(headers)
    }
}
