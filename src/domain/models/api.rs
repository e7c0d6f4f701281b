//! Payloads exchanged with the test results service.
//!
//! Every response is wrapped in a `{ "data": ... }` envelope; list endpoints add
//! a `meta.next_cursor` pagination field.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::history::{CommitInfo, HistoryRecord};
use super::outcome::{TestStatus, TestTitle};

/// `{ "data": T }` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Pagination metadata on list responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Reference from a run to one of its spec instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecRef {
    #[serde(default)]
    pub instance_id: Option<String>,
}

/// Run-level metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    #[serde(default)]
    pub commit: CommitInfo,
}

/// Run details (`GET /v1/runs/{runId}`) and project run list entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDetails {
    pub run_id: String,

    /// Raw creation timestamp; kept unparsed since history lookups normalize it
    #[serde(default, deserialize_with = "string_or_none")]
    pub created_at: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub meta: RunMeta,

    #[serde(default)]
    pub specs: Vec<SpecRef>,

    /// Pagination cursor, present on project run listings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl RunDetails {
    pub fn author(&self) -> Option<&str> {
        self.meta.commit.author_name.as_deref()
    }

    pub fn branch(&self) -> Option<&str> {
        self.meta.commit.branch.as_deref()
    }

    /// Instance ids of the run, skipping entries without one.
    pub fn instance_ids(&self) -> Vec<String> {
        self.specs
            .iter()
            .filter_map(|spec| spec.instance_id.clone())
            .collect()
    }
}

/// One test entry inside an instance result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceTest {
    #[serde(default)]
    pub title: TestTitle,

    #[serde(default)]
    pub test_id: Option<String>,

    #[serde(default, deserialize_with = "status_or_other")]
    pub state: TestStatus,

    #[serde(default, deserialize_with = "attempt_count")]
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InstanceResults {
    #[serde(default)]
    pub tests: Vec<InstanceTest>,
}

/// Spec instance details (`GET /v1/instances/{instanceId}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDetails {
    #[serde(default)]
    pub group_id: Option<String>,

    #[serde(default)]
    pub spec: Option<String>,

    #[serde(default)]
    pub results: Option<InstanceResults>,
}

impl InstanceDetails {
    pub fn tests(&self) -> &[InstanceTest] {
        self.results
            .as_ref()
            .map_or(&[][..], |results| results.tests.as_slice())
    }
}

/// Page of project runs (`GET /v1/projects/{projectId}/runs`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunPage {
    #[serde(default)]
    pub data: Vec<RunDetails>,

    #[serde(default)]
    pub meta: PageMeta,

    #[serde(default)]
    pub has_more: bool,
}

/// Query for a page of project runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunQuery {
    pub limit: u32,
    pub tags: Vec<String>,
    pub branches: Vec<String>,
    pub ending_after: Option<String>,
}

impl RunQuery {
    /// Query string pairs, repeating `tags[]` and `branches[]`.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("limit".to_string(), self.limit.to_string())];
        params.extend(self.tags.iter().map(|tag| ("tags[]".to_string(), tag.clone())));
        params.extend(
            self.branches
                .iter()
                .map(|branch| ("branches[]".to_string(), branch.clone())),
        );
        if let Some(cursor) = &self.ending_after {
            params.push(("ending_after".to_string(), cursor.clone()));
        }
        params
    }
}

/// Body of `POST /v1/signature/test`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub project_id: String,
    pub spec_file_path: String,
    pub test_title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignatureData {
    #[serde(default)]
    pub signature: Option<String>,
}

/// Page of history records (`GET /v1/test-results/{signature}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub data: Vec<HistoryRecord>,

    #[serde(default)]
    pub meta: PageMeta,
}

/// Window and cursor for one history page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
    pub starting_after: Option<String>,
}

impl HistoryQuery {
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("date_start".to_string(), format_timestamp(self.date_start)),
            ("date_end".to_string(), format_timestamp(self.date_end)),
        ];
        if let Some(cursor) = &self.starting_after {
            params.push(("starting_after".to_string(), cursor.clone()));
        }
        params
    }
}

/// ISO-8601 UTC timestamp with a trailing `Z`.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accept any JSON value, keeping it only when it is a string.
fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// A null state counts as [`TestStatus::Other`].
fn status_or_other<'de, D>(deserializer: D) -> Result<TestStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<TestStatus>::deserialize(deserializer)?.unwrap_or_default())
}

/// Attempts are reported either as a count or as the list of attempts.
fn attempt_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Attempts {
        Count(u32),
        List(Vec<serde_json::Value>),
    }

    Ok(match Option::<Attempts>::deserialize(deserializer)? {
        Some(Attempts::Count(count)) => count,
        Some(Attempts::List(list)) => u32::try_from(list.len()).unwrap_or(u32::MAX),
        None => 0,
    })
}
