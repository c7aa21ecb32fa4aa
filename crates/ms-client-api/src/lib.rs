//! Client API trait for the metascan console

pub mod session;

pub use session::{SessionContext, SessionState};

use async_trait::async_trait;
use ms_rest_api_contract::*;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientApiError {
    #[error("server error: {0}")]
    Server(String),
    #[error("session expired")]
    Unauthorized,
    #[error("invalid response: {0}")]
    Schema(String),
    #[error("unexpected: {0}")]
    Unexpected(String),
}

pub type ClientApiResult<T> = Result<T, ClientApiError>;

#[async_trait]
pub trait ClientApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> ClientApiResult<TokenResponse>;
    async fn current_user(&self) -> ClientApiResult<User>;

    async fn list_data_sources(&self) -> ClientApiResult<Vec<DataSource>>;
    async fn create_data_source(&self, draft: &DataSourceDraft) -> ClientApiResult<DataSource>;
    async fn update_data_source(
        &self,
        id: i64,
        draft: &DataSourceDraft,
    ) -> ClientApiResult<DataSource>;
    async fn delete_data_source(&self, id: i64) -> ClientApiResult<()>;
    async fn test_connection(&self, id: i64) -> ClientApiResult<ConnectionTestResponse>;
    async fn quick_scan(&self, id: i64) -> ClientApiResult<QuickScanResponse>;

    async fn list_databases(&self, data_source_id: i64) -> ClientApiResult<Vec<Database>>;
    /// Raw artifact listing; callers normalize the shape
    async fn fetch_artifacts(
        &self,
        data_source_id: i64,
        db: &str,
        artifact_type: &str,
    ) -> ClientApiResult<Value>;
    async fn submit_scan(&self, config: &ScanConfig) -> ClientApiResult<CreateScanResponse>;
    async fn list_scan_jobs(&self) -> ClientApiResult<Vec<ScanJob>>;
    async fn get_scan_result(&self, job_id: i64) -> ClientApiResult<ScanJobResult>;

    async fn ask(&self, request: &AiAskRequest) -> ClientApiResult<AiAskResponse>;
    async fn rag_query(&self, request: &RagQueryRequest) -> ClientApiResult<RagQueryResponse>;
}
