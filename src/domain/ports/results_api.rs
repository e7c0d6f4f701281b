use async_trait::async_trait;

use crate::domain::errors::ApiError;
use crate::domain::models::{
    HistoryPage, HistoryQuery, InstanceDetails, RunDetails, RunPage, RunQuery, SignatureRequest,
};

/// Read access to the test results service.
///
/// One method per endpoint. Implementations own transport concerns (auth,
/// retry, rate limiting); callers only see decoded payloads.
#[async_trait]
pub trait ResultsApi: Send + Sync {
    /// `GET /v1/runs/{runId}`
    async fn get_run(&self, run_id: &str) -> Result<RunDetails, ApiError>;

    /// `GET /v1/instances/{instanceId}`
    async fn get_instance(&self, instance_id: &str) -> Result<InstanceDetails, ApiError>;

    /// `GET /v1/projects/{projectId}/runs`
    async fn list_project_runs(&self, query: &RunQuery) -> Result<RunPage, ApiError>;

    /// `POST /v1/signature/test`; `Ok(None)` when the response carries no signature
    async fn resolve_signature(
        &self,
        request: &SignatureRequest,
    ) -> Result<Option<String>, ApiError>;

    /// `GET /v1/test-results/{signature}`
    async fn get_test_results(
        &self,
        signature: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, ApiError>;

    /// Project the signatures are resolved against
    fn project_id(&self) -> &str;
}
