//! Error types for API contract validation and parsing

use thiserror::Error;

/// Errors that can occur during API contract validation and parsing
#[derive(Debug, Error)]
pub enum ApiContractError {
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
}

impl ApiContractError {
    /// First human-readable validation message, for inline guidance
    pub fn first_message(&self) -> String {
        match self {
            ApiContractError::Validation(errors) => errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| self.to_string()),
            other => other.to_string(),
        }
    }
}

/// Error body returned by the backend for non-2xx responses
///
/// `detail` is a plain message for most errors and a list of field
/// problems for request validation failures.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorDetail {
    pub detail: serde_json::Value,
}

impl ErrorDetail {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.get("msg")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| item.to_string())
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_detail_string() {
        let detail: ErrorDetail = serde_json::from_value(json!({"detail": "Data source not found"})).unwrap();
        assert_eq!(detail.message(), "Data source not found");
    }

    #[test]
    fn test_error_detail_field_list() {
        let detail: ErrorDetail = serde_json::from_value(json!({
            "detail": [{"loc": ["body", "dbNames"], "msg": "field required"}, {"msg": "bad cron"}]
        }))
        .unwrap();
        assert_eq!(detail.message(), "field required; bad cron");
    }
}
