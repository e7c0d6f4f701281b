//! Request-scoped state for one run comparison and its final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::api::RunDetails;
use super::diff::DiffResult;

/// Context of a single comparison, owned by the pipeline and passed by
/// reference to each stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonContext {
    /// Details of the run under evaluation
    pub current_run: RunDetails,

    /// Run the current one is compared against
    pub previous_run_id: String,

    /// When the comparison started
    pub started_at: DateTime<Utc>,
}

impl ComparisonContext {
    pub fn new(current_run: RunDetails, previous_run_id: impl Into<String>) -> Self {
        Self {
            current_run,
            previous_run_id: previous_run_id.into(),
            started_at: Utc::now(),
        }
    }

    pub fn current_run_id(&self) -> &str {
        &self.current_run.run_id
    }

    /// Author credited with failures introduced by the current run.
    pub fn run_author(&self) -> Option<&str> {
        self.current_run.author()
    }

    /// Raw creation timestamp of the current run, the history reference time.
    pub fn run_timestamp(&self) -> Option<&str> {
        self.current_run.created_at.as_deref()
    }
}

/// Input contract for the downstream summarizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub context: ComparisonContext,
    pub diff: DiffResult,
}
