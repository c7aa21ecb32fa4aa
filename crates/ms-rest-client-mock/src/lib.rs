//! Scripted in-memory client for tests and offline demos
//!
//! Every call is recorded as `"<METHOD> <path>"` so tests can assert on the
//! exact requests a flow issued (or that it issued none).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ms_client_api::{ClientApi, ClientApiError, ClientApiResult};
use ms_rest_api_contract::*;
use serde_json::{json, Value};

/// Failure injected for calls whose log line starts with a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    Server(String),
    Unauthorized,
    Schema(String),
}

impl From<&MockFailure> for ClientApiError {
    fn from(failure: &MockFailure) -> Self {
        match failure {
            MockFailure::Server(message) => ClientApiError::Server(message.clone()),
            MockFailure::Unauthorized => ClientApiError::Unauthorized,
            MockFailure::Schema(message) => ClientApiError::Schema(message.clone()),
        }
    }
}

#[derive(Default)]
struct MockState {
    user: Option<User>,
    data_sources: Vec<DataSource>,
    databases: HashMap<i64, Vec<Database>>,
    artifacts: HashMap<(i64, String, String), Value>,
    quick_scans: HashMap<i64, Value>,
    jobs: Vec<ScanJob>,
    results: HashMap<i64, ScanJobResult>,
    rag_answer: Option<RagQueryResponse>,
    ask_answer: Option<AiAskResponse>,
    failures: Vec<(String, MockFailure)>,
    calls: Vec<String>,
    submitted: Vec<ScanConfig>,
    next_id: i64,
}

pub struct MockClient {
    state: Mutex<MockState>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    /// An empty backend: every listing is empty
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 100,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the log from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_user(self, user: User) -> Self {
        self.lock().user = Some(user);
        self
    }

    pub fn with_data_sources(self, sources: Vec<DataSource>) -> Self {
        self.lock().data_sources = sources;
        self
    }

    pub fn with_databases(self, data_source_id: i64, names: &[&str]) -> Self {
        self.lock().databases.insert(
            data_source_id,
            names.iter().map(|name| Database { name: name.to_string() }).collect(),
        );
        self
    }

    pub fn with_artifacts(self, data_source_id: i64, db: &str, artifact_type: &str, payload: Value) -> Self {
        self.lock()
            .artifacts
            .insert((data_source_id, db.to_string(), artifact_type.to_string()), payload);
        self
    }

    pub fn with_quick_scan(self, data_source_id: i64, metadata: Value) -> Self {
        self.lock().quick_scans.insert(data_source_id, metadata);
        self
    }

    pub fn with_jobs(self, jobs: Vec<ScanJob>) -> Self {
        self.lock().jobs = jobs;
        self
    }

    pub fn with_result(self, result: ScanJobResult) -> Self {
        self.lock().results.insert(result.scan_job_id, result);
        self
    }

    pub fn with_rag_answer(self, answer: RagQueryResponse) -> Self {
        self.lock().rag_answer = Some(answer);
        self
    }

    pub fn with_ask_answer(self, answer: AiAskResponse) -> Self {
        self.lock().ask_answer = Some(answer);
        self
    }

    /// Make every call whose log line starts with `prefix` fail
    pub fn fail(&self, prefix: &str, failure: MockFailure) {
        self.lock().failures.push((prefix.to_string(), failure));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Log lines of every call made so far
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Scan configurations accepted by `submit_scan`
    pub fn submitted(&self) -> Vec<ScanConfig> {
        self.lock().submitted.clone()
    }

    /// Record the call and return the injected failure, if any
    fn record(&self, call: String) -> ClientApiResult<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        let failure = state
            .failures
            .iter()
            .find(|(prefix, _)| call.starts_with(prefix.as_str()))
            .map(|(_, failure)| ClientApiError::from(failure));
        state.calls.push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    fn find_source(state: &MockState, id: i64) -> ClientApiResult<usize> {
        state
            .data_sources
            .iter()
            .position(|source| source.id == id)
            .ok_or_else(|| ClientApiError::Server("Data source not found.".into()))
    }

    /// Fixture used by the console's `--demo` mode
    pub fn demo() -> Self {
        let source = |id: i64, name: &str, source_type: &str, conn: &str| DataSource {
            id,
            name: name.into(),
            source_type: source_type.into(),
            connection_string: conn.into(),
            is_active: true,
            environment: "dev".into(),
            tags: vec![],
            host: None,
            port: None,
            connection_status: None,
        };

        let job_created = parse_lenient_datetime("2025-08-09T12:00:00").unwrap_or_default();
        MockClient::new()
            .with_user(User {
                id: 1,
                email: "admin@example.com".into(),
                name: Some("Demo Admin".into()),
                role: Some("admin".into()),
                is_active: Some(true),
            })
            .with_data_sources(vec![
                source(1, "warehouse", "postgres", "postgresql://demo@localhost/warehouse"),
                source(2, "events", "mongodb", "mongodb://localhost:27017"),
                source(3, "local", "sqlite", "sqlite:///tmp/local.db"),
            ])
            .with_databases(1, &["public", "sales", "INFORMATION_SCHEMA"])
            .with_databases(2, &["analytics"])
            .with_artifacts(1, "public", "tables", json!({"tables": ["users", "orders", "order_items"]}))
            .with_artifacts(1, "public", "views", json!({"views": ["active_users"]}))
            .with_artifacts(1, "sales", "tables", json!([{"name": "invoices", "row_count": 1200}]))
            .with_artifacts(1, "sales", "functions", json!(["monthly_total"]))
            .with_artifacts(2, "analytics", "collections", json!({"collections": ["events", "sessions"]}))
            .with_quick_scan(1, json!({"tables": ["users", "orders"], "views": ["active_users"]}))
            .with_jobs(vec![ScanJob {
                id: 11,
                data_source_id: 1,
                db_names: vec!["public".into()],
                artifact_types: vec!["users".into(), "orders".into()],
                status: ScanJobStatus::Completed,
                created_at: job_created,
                finished_at: Some(job_created),
                metadata_result_id: Some("11".into()),
                scheduled_time: None,
                scheduled_cron: None,
            }])
            .with_result(ScanJobResult {
                scan_job_id: 11,
                metadata_json: Some(Value::String(
                    json!({
                        "source_type": "postgres",
                        "objects": [
                            {"name": "users", "fields": [
                                {"name": "id", "types": ["integer"], "nullable": false, "primary_key": true},
                                {"name": "email", "types": ["varchar"], "nullable": false, "primary_key": false},
                                {"name": "nickname", "types": ["varchar"], "nullable": true, "primary_key": false}
                            ]},
                            {"name": "orders", "fields": [
                                {"name": "id", "types": ["integer"], "nullable": false, "primary_key": true},
                                {"name": "user_id", "types": ["integer"], "nullable": false},
                                {"name": "total", "types": ["numeric"], "nullable": true}
                            ]}
                        ]
                    })
                    .to_string(),
                )),
                data_source: "warehouse".into(),
                scan_timestamp: "2025-08-09T12:00:00".into(),
                databases: vec![],
            })
            .with_rag_answer(RagQueryResponse {
                answer: "users.email holds contact data.".into(),
                sources: vec![RagSourceRef {
                    id: 1,
                    object_type: "column".into(),
                    object_id: "users.email".into(),
                    title: Some("users.email".into()),
                }],
            })
    }
}

#[async_trait]
impl ClientApi for MockClient {
    async fn login(&self, _request: &LoginRequest) -> ClientApiResult<TokenResponse> {
        self.record("POST /users/login".into())?;
        Ok(TokenResponse {
            access_token: "mock-token".into(),
            token_type: Some("bearer".into()),
        })
    }

    async fn current_user(&self) -> ClientApiResult<User> {
        let state = self.record("GET /users/me".into())?;
        state
            .user
            .clone()
            .ok_or_else(|| ClientApiError::Server("User not found".into()))
    }

    async fn list_data_sources(&self) -> ClientApiResult<Vec<DataSource>> {
        let state = self.record("GET /api/data-sources".into())?;
        Ok(state.data_sources.clone())
    }

    async fn create_data_source(&self, draft: &DataSourceDraft) -> ClientApiResult<DataSource> {
        let mut state = self.record("POST /admin/data-sources".into())?;
        let draft = draft.trimmed();
        state.next_id += 1;
        let source = DataSource {
            id: state.next_id,
            name: draft.name,
            source_type: draft.source_type,
            connection_string: draft.connection_string,
            is_active: draft.is_active,
            environment: String::new(),
            tags: vec![],
            host: None,
            port: None,
            connection_status: None,
        };
        state.data_sources.push(source.clone());
        Ok(source)
    }

    async fn update_data_source(
        &self,
        id: i64,
        draft: &DataSourceDraft,
    ) -> ClientApiResult<DataSource> {
        let mut state = self.record(format!("PATCH /admin/data-sources/{}", id))?;
        let index = Self::find_source(&state, id)?;
        let draft = draft.trimmed();
        let source = &mut state.data_sources[index];
        source.name = draft.name;
        source.source_type = draft.source_type;
        source.connection_string = draft.connection_string;
        source.is_active = draft.is_active;
        Ok(source.clone())
    }

    async fn delete_data_source(&self, id: i64) -> ClientApiResult<()> {
        let mut state = self.record(format!("DELETE /admin/data-sources/{}", id))?;
        let index = Self::find_source(&state, id)?;
        state.data_sources.remove(index);
        Ok(())
    }

    async fn test_connection(&self, id: i64) -> ClientApiResult<ConnectionTestResponse> {
        let state = self.record(format!("POST /admin/data-sources/{}/test-connection", id))?;
        Self::find_source(&state, id)?;
        Ok(ConnectionTestResponse { detail: "ok".into() })
    }

    async fn quick_scan(&self, id: i64) -> ClientApiResult<QuickScanResponse> {
        let state = self.record(format!("POST /admin/data-sources/{}/scan", id))?;
        Self::find_source(&state, id)?;
        Ok(QuickScanResponse {
            metadata: state.quick_scans.get(&id).cloned().unwrap_or(Value::Null),
        })
    }

    async fn list_databases(&self, data_source_id: i64) -> ClientApiResult<Vec<Database>> {
        let state = self.record(format!("GET /api/data-sources/{}/databases", data_source_id))?;
        Ok(state.databases.get(&data_source_id).cloned().unwrap_or_default())
    }

    async fn fetch_artifacts(
        &self,
        data_source_id: i64,
        db: &str,
        artifact_type: &str,
    ) -> ClientApiResult<Value> {
        let state = self.record(format!(
            "GET /api/data-sources/{}/artifacts?db={}&artifact_type={}",
            data_source_id, db, artifact_type
        ))?;
        Ok(state
            .artifacts
            .get(&(data_source_id, db.to_string(), artifact_type.to_string()))
            .cloned()
            .unwrap_or_else(|| json!([])))
    }

    async fn submit_scan(&self, config: &ScanConfig) -> ClientApiResult<CreateScanResponse> {
        let mut state = self.record("POST /api/scan".into())?;
        state.next_id += 1;
        let job_id = state.next_id.to_string();
        state.submitted.push(config.clone());
        Ok(CreateScanResponse {
            job_id,
            status: Some("queued".into()),
        })
    }

    async fn list_scan_jobs(&self) -> ClientApiResult<Vec<ScanJob>> {
        let state = self.record("GET /api/scan-jobs".into())?;
        Ok(state.jobs.clone())
    }

    async fn get_scan_result(&self, job_id: i64) -> ClientApiResult<ScanJobResult> {
        let state = self.record(format!("GET /api/scan-jobs/{}/result", job_id))?;
        state
            .results
            .get(&job_id)
            .cloned()
            .ok_or_else(|| ClientApiError::Server("Scan job not found".into()))
    }

    async fn ask(&self, _request: &AiAskRequest) -> ClientApiResult<AiAskResponse> {
        let state = self.record("POST /agentic-ai/ask".into())?;
        Ok(state.ask_answer.clone().unwrap_or(AiAskResponse {
            answer: "No answer available.".into(),
            context_summary: None,
        }))
    }

    async fn rag_query(&self, _request: &RagQueryRequest) -> ClientApiResult<RagQueryResponse> {
        let state = self.record("POST /ai/rag/query".into())?;
        Ok(state.rag_answer.clone().unwrap_or(RagQueryResponse {
            answer: String::new(),
            sources: vec![],
        }))
    }
}
