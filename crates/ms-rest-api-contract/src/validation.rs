//! Validation helpers for API contract types

use crate::error::ApiContractError;
use crate::types::*;
use chrono::{DateTime, Utc};
use validator::Validate;

/// Validate a data source create/update payload
pub fn validate_data_source_draft(draft: &DataSourceDraft) -> Result<(), ApiContractError> {
    draft.trimmed().validate()?;
    Ok(())
}

/// Validate login credentials before they are sent
pub fn validate_login_request(request: &LoginRequest) -> Result<(), ApiContractError> {
    request.validate()?;
    Ok(())
}

/// Validate a scan-context assistant question
pub fn validate_ask_request(request: &AiAskRequest) -> Result<(), ApiContractError> {
    request.validate()?;
    Ok(())
}

/// Validate a retrieval-augmented assistant question
pub fn validate_rag_request(request: &RagQueryRequest) -> Result<(), ApiContractError> {
    request.validate()?;
    Ok(())
}

/// Validate URL format
pub fn validate_url(url_str: &str) -> Result<(), ApiContractError> {
    url::Url::parse(url_str)?;
    Ok(())
}

/// Check the shape of a CRON expression: five or six whitespace-separated
/// fields drawn from the usual CRON alphabet.
pub fn validate_cron_expression(expr: &str) -> Result<(), ApiContractError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if !(5..=6).contains(&fields.len()) {
        return Err(ApiContractError::InvalidSchedule(format!(
            "CRON expression needs 5 or 6 fields, got {}",
            fields.len()
        )));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '*' | ',' | '-' | '/' | '?');
    if let Some(bad) = fields.iter().find(|f| !f.chars().all(allowed)) {
        return Err(ApiContractError::InvalidSchedule(format!(
            "invalid CRON field '{}'",
            bad
        )));
    }
    Ok(())
}

/// Parse a user-entered schedule time (RFC 3339 or `YYYY-MM-DDTHH:MM[:SS]`)
pub fn parse_schedule_time(raw: &str) -> Result<DateTime<Utc>, ApiContractError> {
    parse_lenient_datetime(raw.trim()).ok_or_else(|| {
        ApiContractError::InvalidSchedule(format!("'{}' is not a valid date and time", raw.trim()))
    })
}
