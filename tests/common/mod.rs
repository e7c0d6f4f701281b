//! Common test utilities for integration tests
//!
//! Provides an in-memory `ResultsApi` and payload builders shared by the
//! fetcher, diff and pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use rundiff::domain::models::{
    CommitInfo, HistoryPage, HistoryQuery, HistoryRecord, InstanceDetails, InstanceResults,
    InstanceTest, PageMeta, RunDetails, RunMeta, RunPage, RunQuery, SignatureRequest, SpecRef,
    TestStatus, TestTitle,
};
use rundiff::{ApiError, ResultsApi};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// In-memory results service
///
/// History is keyed by signature; every signature maps to a single page.
/// Signatures are derived from `spec::title` unless listed in
/// `unresolvable`.
#[derive(Default)]
pub struct FakeResultsApi {
    pub runs: HashMap<String, RunDetails>,
    pub instances: HashMap<String, InstanceDetails>,
    pub run_pages: Vec<RunPage>,
    pub history: HashMap<String, Vec<HistoryRecord>>,
    pub unresolvable: Vec<String>,
    pub failing_history: Vec<String>,
    pub signature_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub instance_calls: AtomicUsize,
    pub run_list_calls: AtomicUsize,
    pub signature_requests: Mutex<Vec<SignatureRequest>>,
}

impl FakeResultsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run with one instance per spec, each holding the given tests
    pub fn with_run(mut self, run: RunDetails, instances: Vec<(String, InstanceDetails)>) -> Self {
        let mut run = run;
        run.specs = instances
            .iter()
            .map(|(id, _)| SpecRef {
                instance_id: Some(id.clone()),
            })
            .collect();
        self.runs.insert(run.run_id.clone(), run);
        self.instances.extend(instances);
        self
    }

    pub fn with_history(mut self, spec: &str, title: &str, records: Vec<HistoryRecord>) -> Self {
        self.history.insert(signature_for(spec, title), records);
        self
    }

    pub fn with_run_pages(mut self, pages: Vec<RunPage>) -> Self {
        self.run_pages = pages;
        self
    }
}

pub fn signature_for(spec: &str, title: &str) -> String {
    format!("{spec}::{title}")
}

#[async_trait]
impl ResultsApi for FakeResultsApi {
    async fn get_run(&self, run_id: &str) -> Result<RunDetails, ApiError> {
        self.runs.get(run_id).cloned().ok_or_else(|| ApiError::TransientNetwork {
            attempts: 5,
            message: format!("run {run_id} unavailable"),
        })
    }

    async fn get_instance(&self, instance_id: &str) -> Result<InstanceDetails, ApiError> {
        self.instance_calls.fetch_add(1, Ordering::SeqCst);
        self.instances
            .get(instance_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: format!("instance {instance_id} unavailable"),
            })
    }

    async fn list_project_runs(&self, _query: &RunQuery) -> Result<RunPage, ApiError> {
        let index = self.run_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.run_pages.get(index).cloned().unwrap_or_default())
    }

    async fn resolve_signature(
        &self,
        request: &SignatureRequest,
    ) -> Result<Option<String>, ApiError> {
        self.signature_calls.fetch_add(1, Ordering::SeqCst);
        self.signature_requests.lock().unwrap().push(request.clone());

        let signature = signature_for(&request.spec_file_path, &request.test_title);
        if self.unresolvable.contains(&signature) {
            return Ok(None);
        }
        Ok(Some(signature))
    }

    async fn get_test_results(
        &self,
        signature: &str,
        _query: &HistoryQuery,
    ) -> Result<HistoryPage, ApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_history.iter().any(|s| s == signature) {
            return Err(ApiError::TransientNetwork {
                attempts: 5,
                message: "history endpoint down".to_string(),
            });
        }

        Ok(HistoryPage {
            data: self.history.get(signature).cloned().unwrap_or_default(),
            meta: PageMeta::default(),
        })
    }

    fn project_id(&self) -> &str {
        "test-project"
    }
}

pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

pub fn run(run_id: &str, author: Option<&str>) -> RunDetails {
    RunDetails {
        run_id: run_id.to_string(),
        created_at: Some("2024-03-10T12:00:00.000Z".to_string()),
        tags: vec!["merge".to_string()],
        meta: RunMeta {
            commit: CommitInfo {
                sha: Some(format!("sha-{run_id}")),
                author_name: author.map(str::to_string),
                branch: Some("main".to_string()),
            },
        },
        cursor: Some(format!("cursor-{run_id}")),
        ..RunDetails::default()
    }
}

pub fn instance_test(test_id: &str, state: TestStatus) -> InstanceTest {
    InstanceTest {
        title: TestTitle::Single(test_id.to_string()),
        test_id: Some(test_id.to_string()),
        state,
        attempts: 1,
    }
}

pub fn instance(spec: &str, tests: Vec<InstanceTest>) -> InstanceDetails {
    InstanceDetails {
        group_id: Some("chrome".to_string()),
        spec: Some(spec.to_string()),
        results: Some(InstanceResults { tests }),
    }
}

/// Newest-first history records, one hour apart, ending just before the reference time
pub fn history(statuses: &[TestStatus]) -> Vec<HistoryRecord> {
    statuses
        .iter()
        .enumerate()
        .map(|(i, status)| HistoryRecord {
            status: *status,
            created_at: reference_time() - chrono::Duration::hours(i64::try_from(i).unwrap() + 1),
            commit: CommitInfo {
                sha: Some(format!("commit-{i}")),
                author_name: Some(format!("author-{i}")),
                branch: Some("main".to_string()),
            },
            tags: vec!["merge".to_string()],
            group_id: Some("chrome".to_string()),
        })
        .collect()
}
