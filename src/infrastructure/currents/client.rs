use async_trait::async_trait;
use reqwest::{header, Client as ReqwestClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::requester::Requester;
use crate::domain::errors::ApiError;
use crate::domain::models::{
    Config, Envelope, HistoryPage, HistoryQuery, InstanceDetails, RunDetails, RunPage, RunQuery,
    SignatureData, SignatureRequest,
};
use crate::domain::ports::ResultsApi;

/// Configuration for the results service HTTP client
#[derive(Debug, Clone)]
pub struct CurrentsClientConfig {
    /// Bearer token
    pub api_key: String,

    /// Base URL, without a trailing slash
    pub base_url: String,

    /// Project the signatures and run listings belong to
    pub project_id: String,

    /// Timeout for ordinary requests, in seconds
    pub timeout_secs: u64,

    /// Timeout for instance requests, whose payloads are large
    pub instance_timeout_secs: u64,
}

impl From<&Config> for CurrentsClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            api_key: config.api.api_key.clone(),
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            project_id: config.api.project_id.clone(),
            timeout_secs: config.api.timeout_secs,
            instance_timeout_secs: config.api.instance_timeout_secs,
        }
    }
}

/// HTTP client for the test results service
///
/// All requests go through the shared [`Requester`], so clones of the
/// requester handed to several clients still share one rate budget.
#[derive(Debug, Clone)]
pub struct CurrentsClient {
    http_client: ReqwestClient,
    base_url: String,
    project_id: String,
    timeout: Duration,
    instance_timeout: Duration,
    requester: Requester,
}

impl CurrentsClient {
    /// Create a new client
    ///
    /// # Example
    /// ```no_run
    /// use rundiff::domain::models::Config;
    /// use rundiff::infrastructure::currents::{CurrentsClient, CurrentsClientConfig, Requester};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = Config::default();
    /// let requester = Requester::from_config(&config.retry, &config.rate_limit);
    /// let client = CurrentsClient::new(CurrentsClientConfig::from(&config), requester)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: CurrentsClientConfig, requester: Requester) -> Result<Self, ApiError> {
        let api_key_scrubbed = if config.api_key.len() > 8 {
            format!(
                "{}...[REDACTED]",
                config.api_key.chars().take(4).collect::<String>()
            )
        } else {
            "[REDACTED]".to_string()
        };

        info!(
            base_url = %config.base_url,
            project_id = %config.project_id,
            timeout_secs = config.timeout_secs,
            api_key = %api_key_scrubbed,
            "Initializing results API client"
        );

        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .default_headers(headers)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            http_client,
            base_url: config.base_url,
            project_id: config.project_id,
            timeout: Duration::from_secs(config.timeout_secs),
            instance_timeout: Duration::from_secs(config.instance_timeout_secs),
            requester,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send through the requester and decode the body as `T`
    async fn fetch<T, F>(&self, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let response = self.requester.execute(|| build().send()).await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl ResultsApi for CurrentsClient {
    #[instrument(skip(self))]
    async fn get_run(&self, run_id: &str) -> Result<RunDetails, ApiError> {
        let url = self.url(&format!("/v1/runs/{run_id}"));
        let envelope: Envelope<RunDetails> = self
            .fetch(|| self.http_client.get(&url).timeout(self.timeout))
            .await?;
        debug!(specs = envelope.data.specs.len(), "Fetched run details");
        Ok(envelope.data)
    }

    #[instrument(skip(self))]
    async fn get_instance(&self, instance_id: &str) -> Result<InstanceDetails, ApiError> {
        let url = self.url(&format!("/v1/instances/{instance_id}"));
        let envelope: Envelope<InstanceDetails> = self
            .fetch(|| self.http_client.get(&url).timeout(self.instance_timeout))
            .await?;
        Ok(envelope.data)
    }

    #[instrument(skip(self, query), fields(cursor = ?query.ending_after))]
    async fn list_project_runs(&self, query: &RunQuery) -> Result<RunPage, ApiError> {
        let url = self.url(&format!("/v1/projects/{}/runs", self.project_id));
        let params = query.to_params();
        self.fetch(|| {
            self.http_client
                .get(&url)
                .query(&params)
                .timeout(self.timeout)
        })
        .await
    }

    #[instrument(skip(self, request), fields(spec = %request.spec_file_path))]
    async fn resolve_signature(
        &self,
        request: &SignatureRequest,
    ) -> Result<Option<String>, ApiError> {
        let url = self.url("/v1/signature/test");
        let envelope: Envelope<Option<SignatureData>> = self
            .fetch(|| self.http_client.post(&url).json(request).timeout(self.timeout))
            .await?;
        Ok(envelope.data.and_then(|data| data.signature))
    }

    #[instrument(skip(self, query), fields(cursor = ?query.starting_after))]
    async fn get_test_results(
        &self,
        signature: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, ApiError> {
        let url = self.url(&format!("/v1/test-results/{signature}"));
        let params = query.to_params();
        self.fetch(|| {
            self.http_client
                .get(&url)
                .query(&params)
                .timeout(self.timeout)
        })
        .await
    }

    fn project_id(&self) -> &str {
        &self.project_id
    }
}
