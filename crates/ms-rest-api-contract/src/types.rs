//! API contract types for the metascan REST service

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Connector family of a data source, derived from its lowercased `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Mongo,
    Sqlite,
    Sql,
}

impl SourceKind {
    /// Classify a connector identifier such as `"mongodb"` or `"Postgres"`
    pub fn from_type(source_type: &str) -> Self {
        match source_type.trim().to_lowercase().as_str() {
            "mongodb" | "mongo" => SourceKind::Mongo,
            "sqlite" => SourceKind::Sqlite,
            _ => SourceKind::Sql,
        }
    }

    /// Object type given to containers whose category is unknown
    pub fn container_type(&self) -> &'static str {
        match self {
            SourceKind::Mongo => "collection",
            SourceKind::Sqlite | SourceKind::Sql => "table",
        }
    }

    pub fn is_mongo(&self) -> bool {
        matches!(self, SourceKind::Mongo)
    }
}

/// Result of the last connectivity test of a data source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Ok,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A configured external system that can be scanned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default, alias = "connectionString")]
    pub connection_string: String,
    #[serde(default = "default_active", alias = "isActive")]
    pub is_active: bool,
    #[serde(default)]
    pub environment: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_status: Option<ConnectionStatus>,
}

fn default_active() -> bool {
    true
}

impl DataSource {
    pub fn kind(&self) -> SourceKind {
        SourceKind::from_type(&self.source_type)
    }

    /// Lowercased connector identifier
    pub fn normalized_type(&self) -> String {
        self.source_type.trim().to_lowercase()
    }
}

/// Source types offered by the administration form
pub const SOURCE_TYPES: &[(&str, &str)] = &[
    ("postgres", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("mssql", "SQL Server"),
    ("oracle", "Oracle"),
    ("snowflake", "Snowflake"),
    ("bigquery", "Google BigQuery"),
    ("mongodb", "MongoDB"),
    ("redshift", "Amazon Redshift"),
    ("sqlite", "SQLite"),
    ("other", "Other (custom)"),
];

/// Human label for a connector identifier, falling back to the identifier itself
pub fn source_type_label(source_type: &str) -> &str {
    SOURCE_TYPES
        .iter()
        .find(|(value, _)| *value == source_type)
        .map(|(_, label)| *label)
        .unwrap_or(source_type)
}

/// Create/update payload for a data source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct DataSourceDraft {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Type is required"))]
    pub source_type: String,
    #[validate(length(min = 1, message = "Connection string is required"))]
    pub connection_string: String,
    pub is_active: bool,
}

impl DataSourceDraft {
    /// Prefill a draft from an existing source for editing
    pub fn from_source(source: &DataSource) -> Self {
        Self {
            name: source.name.clone(),
            source_type: source.source_type.clone(),
            connection_string: source.connection_string.clone(),
            is_active: source.is_active,
        }
    }

    /// Copy with surrounding whitespace removed from every text field
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            source_type: self.source_type.trim().to_string(),
            connection_string: self.connection_string.trim().to_string(),
            is_active: self.is_active,
        }
    }
}

/// Response of the connectivity test endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResponse {
    #[serde(default)]
    pub detail: String,
}

impl ConnectionTestResponse {
    pub fn status(&self) -> ConnectionStatus {
        match self.detail.as_str() {
            "ok" => ConnectionStatus::Ok,
            _ => ConnectionStatus::Error,
        }
    }
}

/// Response of the quick metadata scan endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickScanResponse {
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A database (or schema) inside a data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
}

/// Scan submission payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    pub data_source_id: i64,
    pub db_names: Vec<String>,
    pub artifact_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_cron: Option<String>,
}

/// Response to a scan submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateScanResponse {
    #[serde(rename = "jobId", alias = "job_id", deserialize_with = "de_string_or_number")]
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Server-side scan job lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanJobStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ScanJobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, ScanJobStatus::Completed | ScanJobStatus::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScanJobStatus::Pending => "pending",
            ScanJobStatus::Queued => "queued",
            ScanJobStatus::Running => "running",
            ScanJobStatus::Completed => "completed",
            ScanJobStatus::Failed => "failed",
            ScanJobStatus::Unknown => "unknown",
        }
    }
}

/// A scan job as tracked by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: i64,
    pub data_source_id: i64,
    #[serde(default)]
    pub db_names: Vec<String>,
    #[serde(default)]
    pub artifact_types: Vec<String>,
    pub status: ScanJobStatus,
    #[serde(deserialize_with = "de_lenient_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "de_lenient_datetime_opt")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata_result_id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_datetime_opt")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_cron: Option<String>,
}

/// One database entry inside a scan result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDatabase {
    pub name: String,
    #[serde(flatten)]
    pub artifacts: serde_json::Map<String, serde_json::Value>,
}

/// Result payload of a finished scan job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJobResult {
    pub scan_job_id: i64,
    /// Either a JSON-encoded string, an inline JSON value, or null
    #[serde(default)]
    pub metadata_json: Option<serde_json::Value>,
    #[serde(default)]
    pub data_source: String,
    #[serde(default)]
    pub scan_timestamp: String,
    #[serde(default)]
    pub databases: Vec<ResultDatabase>,
}

/// Login credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Successful login response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// The authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// Scan-context question for the agentic assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AiAskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub scan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 50, message = "At most 50 tables can be scoped"))]
    pub scope_tables: Option<Vec<String>>,
    #[validate(length(min = 3, max = 1000, message = "Question must be 3 to 1000 characters"))]
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 600))]
    pub row_limit: Option<u32>,
}

impl AiAskRequest {
    pub fn new(question: &str) -> Self {
        Self {
            scan_id: None,
            scope_tables: None,
            question: question.trim().to_string(),
            row_limit: None,
        }
    }
}

/// Strict response schema of `/agentic-ai/ask`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiAskResponse {
    pub answer: String,
    #[serde(default)]
    pub context_summary: Option<String>,
}

/// Retrieval-augmented question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RagQueryRequest {
    #[validate(length(min = 3, max = 1000, message = "Question must be 3 to 1000 characters"))]
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl RagQueryRequest {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.trim().to_string(),
            tenant_id: None,
        }
    }
}

/// A document the RAG answer was grounded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagSourceRef {
    pub id: i64,
    pub object_type: String,
    pub object_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl RagSourceRef {
    /// Chip label shown next to the answer
    pub fn label(&self) -> String {
        format!("[{}] {}", self.id, self.title.as_deref().unwrap_or(&self.object_id))
    }
}

/// Strict response schema of `/ai/rag/query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagQueryResponse {
    pub answer: String,
    pub sources: Vec<RagSourceRef>,
}

fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// Parse RFC 3339 or a naive ISO-8601 timestamp (taken as UTC)
pub fn parse_lenient_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn de_lenient_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_lenient_datetime(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

fn de_lenient_datetime_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_lenient_datetime(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_kind_classification() {
        assert_eq!(SourceKind::from_type("MongoDB"), SourceKind::Mongo);
        assert_eq!(SourceKind::from_type("mongo"), SourceKind::Mongo);
        assert_eq!(SourceKind::from_type("sqlite"), SourceKind::Sqlite);
        assert_eq!(SourceKind::from_type("postgres"), SourceKind::Sql);
        assert_eq!(SourceKind::Mongo.container_type(), "collection");
        assert_eq!(SourceKind::Sql.container_type(), "table");
    }

    #[test]
    fn test_data_source_accepts_both_casings() {
        let snake: DataSource = serde_json::from_value(json!({
            "id": 1, "name": "warehouse", "type": "postgres",
            "connection_string": "postgres://x", "is_active": false
        }))
        .unwrap();
        let camel: DataSource = serde_json::from_value(json!({
            "id": 1, "name": "warehouse", "type": "postgres",
            "connectionString": "postgres://x", "isActive": false
        }))
        .unwrap();
        assert_eq!(snake, camel);
        assert!(!snake.is_active);
        assert_eq!(snake.connection_status, None);
    }

    #[test]
    fn test_unknown_connection_status_maps_to_unknown() {
        let ds: DataSource = serde_json::from_value(json!({
            "id": 2, "name": "n", "type": "mysql", "connection_status": "degraded"
        }))
        .unwrap();
        assert_eq!(ds.connection_status, Some(ConnectionStatus::Unknown));
    }

    #[test]
    fn test_scan_config_serializes_camel_case() {
        let config = ScanConfig {
            data_source_id: 7,
            db_names: vec!["sales".into()],
            artifact_types: vec!["orders".into()],
            scheduled_time: None,
            scheduled_cron: Some("0 2 * * *".into()),
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(
            value,
            json!({
                "dataSourceId": 7,
                "dbNames": ["sales"],
                "artifactTypes": ["orders"],
                "scheduledCron": "0 2 * * *"
            })
        );
    }

    #[test]
    fn test_connection_test_status() {
        let ok: ConnectionTestResponse = serde_json::from_value(json!({"detail": "ok"})).unwrap();
        assert_eq!(ok.status(), ConnectionStatus::Ok);
        let failed: ConnectionTestResponse =
            serde_json::from_value(json!({"detail": "error"})).unwrap();
        assert_eq!(failed.status(), ConnectionStatus::Error);
    }

    #[test]
    fn test_job_id_accepts_number() {
        let resp: CreateScanResponse =
            serde_json::from_value(json!({"jobId": 42, "status": "queued"})).unwrap();
        assert_eq!(resp.job_id, "42");
    }

    #[test]
    fn test_scan_job_with_naive_timestamps() {
        let job: ScanJob = serde_json::from_value(json!({
            "id": 3,
            "data_source_id": 1,
            "db_names": ["public"],
            "artifact_types": ["users"],
            "status": "archived",
            "created_at": "2025-08-09T12:30:00.123456",
            "finished_at": null
        }))
        .unwrap();
        assert_eq!(job.status, ScanJobStatus::Unknown);
        assert_eq!(job.created_at.to_rfc3339(), "2025-08-09T12:30:00.123456+00:00");
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_rag_response_rejects_string_source_id() {
        let result = serde_json::from_value::<RagQueryResponse>(json!({
            "answer": "a",
            "sources": [{"id": "x", "object_type": "asset", "object_id": "t"}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_rag_source_label_prefers_title() {
        let with_title = RagSourceRef {
            id: 4,
            object_type: "asset".into(),
            object_id: "orders".into(),
            title: Some("Orders table".into()),
        };
        assert_eq!(with_title.label(), "[4] Orders table");
        let bare = RagSourceRef { title: None, ..with_title };
        assert_eq!(bare.label(), "[4] orders");
    }
}
