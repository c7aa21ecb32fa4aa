//! Main REST API client implementation

use ms_client_api::SessionContext;
use ms_rest_api_contract::validation::{
    validate_ask_request, validate_data_source_draft, validate_login_request,
    validate_rag_request,
};
use ms_rest_api_contract::*;
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::AuthMethod;
use crate::error::{RestClientError, RestClientResult};

/// REST API client for the metascan backend
#[derive(Debug, Clone)]
pub struct RestClient {
    http_client: HttpClient,
    base_url: Url,
    session: SessionContext,
}

impl RestClient {
    /// Create a new REST client sharing the given session
    pub fn new(base_url: Url, session: SessionContext) -> RestClientResult<Self> {
        let http_client = HttpClient::builder()
            .user_agent(concat!("metascan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            session,
        })
    }

    /// Create a client from a base URL string
    pub fn from_url(base_url: &str, session: SessionContext) -> RestClientResult<Self> {
        let base_url = Url::parse(base_url)?;
        Self::new(base_url, session)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Exchange credentials for an access token
    pub async fn login(&self, request: &LoginRequest) -> RestClientResult<TokenResponse> {
        validate_login_request(request)?;
        self.post("/users/login", request).await
    }

    /// Profile of the authenticated user
    pub async fn current_user(&self) -> RestClientResult<User> {
        self.get("/users/me").await
    }

    /// List active data sources
    pub async fn list_data_sources(&self) -> RestClientResult<Vec<DataSource>> {
        self.get("/api/data-sources").await
    }

    pub async fn create_data_source(&self, draft: &DataSourceDraft) -> RestClientResult<DataSource> {
        validate_data_source_draft(draft)?;
        self.post("/admin/data-sources", &draft.trimmed()).await
    }

    pub async fn update_data_source(
        &self,
        id: i64,
        draft: &DataSourceDraft,
    ) -> RestClientResult<DataSource> {
        validate_data_source_draft(draft)?;
        let path = format!("/admin/data-sources/{}", id);
        self.request(Method::PATCH, &path, Some(&draft.trimmed())).await
    }

    pub async fn delete_data_source(&self, id: i64) -> RestClientResult<()> {
        let path = format!("/admin/data-sources/{}", id);
        self.send(Method::DELETE, &path, None::<&()>).await?;
        Ok(())
    }

    /// Ask the server to test connectivity of a data source
    pub async fn test_connection(&self, id: i64) -> RestClientResult<ConnectionTestResponse> {
        let path = format!("/admin/data-sources/{}/test-connection", id);
        self.request(Method::POST, &path, None::<&()>).await
    }

    /// Run an immediate metadata scan of a data source
    pub async fn quick_scan(&self, id: i64) -> RestClientResult<QuickScanResponse> {
        let path = format!("/admin/data-sources/{}/scan", id);
        self.request(Method::POST, &path, None::<&()>).await
    }

    /// List databases of a data source
    pub async fn list_databases(&self, data_source_id: i64) -> RestClientResult<Vec<Database>> {
        let path = format!("/api/data-sources/{}/databases", data_source_id);
        self.get(&path).await
    }

    /// Raw artifact listing of one database and category
    pub async fn fetch_artifacts(
        &self,
        data_source_id: i64,
        db: &str,
        artifact_type: &str,
    ) -> RestClientResult<Value> {
        let url = self.artifacts_url(data_source_id, db, artifact_type)?;
        self.get(url.as_str()).await
    }

    fn artifacts_url(&self, data_source_id: i64, db: &str, artifact_type: &str) -> RestClientResult<Url> {
        let mut url = self
            .base_url
            .join(&format!("/api/data-sources/{}/artifacts", data_source_id))?;
        url.query_pairs_mut()
            .append_pair("db", db)
            .append_pair("artifact_type", artifact_type);
        Ok(url)
    }

    /// Submit a scan; returns the created job id
    pub async fn submit_scan(&self, config: &ScanConfig) -> RestClientResult<CreateScanResponse> {
        self.post("/api/scan", config).await
    }

    pub async fn list_scan_jobs(&self) -> RestClientResult<Vec<ScanJob>> {
        self.get("/api/scan-jobs").await
    }

    pub async fn get_scan_result(&self, job_id: i64) -> RestClientResult<ScanJobResult> {
        let path = format!("/api/scan-jobs/{}/result", job_id);
        self.get(&path).await
    }

    /// Scan-context question to the agentic assistant
    pub async fn ask(&self, request: &AiAskRequest) -> RestClientResult<AiAskResponse> {
        validate_ask_request(request)?;
        self.post("/agentic-ai/ask", request).await
    }

    /// Retrieval-augmented question
    pub async fn rag_query(&self, request: &RagQueryRequest) -> RestClientResult<RagQueryResponse> {
        validate_rag_request(request)?;
        self.post("/ai/rag/query", request).await
    }

    // Private helper methods

    async fn get<T: DeserializeOwned>(&self, path: &str) -> RestClientResult<T> {
        self.request(Method::GET, path, None::<&()>).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> RestClientResult<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> RestClientResult<T> {
        let text = self.send(method, path, body).await?;
        serde_json::from_str(&text).map_err(|e| RestClientError::Schema {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Send a request and return the body of a successful response
    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> RestClientResult<String> {
        let url = if path.starts_with("http") {
            Url::parse(path)?
        } else {
            self.base_url.join(path)?
        };
        debug!(%method, %url, "sending request");

        let mut request = self
            .http_client
            .request(method, url)
            .headers(AuthMethod::from_session(&self.session).headers()?);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn handle_response(&self, response: Response) -> RestClientResult<String> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        if status == StatusCode::UNAUTHORIZED && self.session.expire() {
            return Err(RestClientError::Unauthorized);
        }

        let message = match serde_json::from_str::<ErrorDetail>(&text) {
            Ok(detail) => detail.message(),
            Err(_) => format!("{} {}", status, text).trim_end().to_string(),
        };
        debug!(%status, %message, "request failed");
        Err(RestClientError::ServerError { status, message })
    }
}
