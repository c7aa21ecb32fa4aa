//! REST API client for the metascan backend
//!
//! Bearer-token HTTP client over the data-source, scan, history and assistant
//! endpoints. The token is read from a shared [`SessionContext`] on every
//! request, and a 401 on an authenticated request expires that session.

pub mod auth;
pub mod client;
pub mod error;

pub use auth::*;
pub use client::*;
pub use error::*;

use async_trait::async_trait;
use ms_client_api::{ClientApi, ClientApiResult};
use ms_rest_api_contract::*;
use serde_json::Value;

#[async_trait]
impl ClientApi for client::RestClient {
    async fn login(&self, request: &LoginRequest) -> ClientApiResult<TokenResponse> {
        Ok(self.login(request).await?)
    }

    async fn current_user(&self) -> ClientApiResult<User> {
        Ok(self.current_user().await?)
    }

    async fn list_data_sources(&self) -> ClientApiResult<Vec<DataSource>> {
        Ok(self.list_data_sources().await?)
    }

    async fn create_data_source(&self, draft: &DataSourceDraft) -> ClientApiResult<DataSource> {
        Ok(self.create_data_source(draft).await?)
    }

    async fn update_data_source(
        &self,
        id: i64,
        draft: &DataSourceDraft,
    ) -> ClientApiResult<DataSource> {
        Ok(self.update_data_source(id, draft).await?)
    }

    async fn delete_data_source(&self, id: i64) -> ClientApiResult<()> {
        Ok(self.delete_data_source(id).await?)
    }

    async fn test_connection(&self, id: i64) -> ClientApiResult<ConnectionTestResponse> {
        Ok(self.test_connection(id).await?)
    }

    async fn quick_scan(&self, id: i64) -> ClientApiResult<QuickScanResponse> {
        Ok(self.quick_scan(id).await?)
    }

    async fn list_databases(&self, data_source_id: i64) -> ClientApiResult<Vec<Database>> {
        Ok(self.list_databases(data_source_id).await?)
    }

    async fn fetch_artifacts(
        &self,
        data_source_id: i64,
        db: &str,
        artifact_type: &str,
    ) -> ClientApiResult<Value> {
        Ok(self.fetch_artifacts(data_source_id, db, artifact_type).await?)
    }

    async fn submit_scan(&self, config: &ScanConfig) -> ClientApiResult<CreateScanResponse> {
        Ok(self.submit_scan(config).await?)
    }

    async fn list_scan_jobs(&self) -> ClientApiResult<Vec<ScanJob>> {
        Ok(self.list_scan_jobs().await?)
    }

    async fn get_scan_result(&self, job_id: i64) -> ClientApiResult<ScanJobResult> {
        Ok(self.get_scan_result(job_id).await?)
    }

    async fn ask(&self, request: &AiAskRequest) -> ClientApiResult<AiAskResponse> {
        Ok(self.ask(request).await?)
    }

    async fn rag_query(&self, request: &RagQueryRequest) -> ClientApiResult<RagQueryResponse> {
        Ok(self.rag_query(request).await?)
    }
}

