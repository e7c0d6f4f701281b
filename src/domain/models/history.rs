//! Execution history for a single test signature.
//!
//! Records arrive newest-first from the results service. The streak summary
//! counts only prior executions; the failure currently being classified is
//! not part of the history window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::TestStatus;

/// Commit a historical execution ran against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    #[serde(default)]
    pub sha: Option<String>,

    #[serde(default)]
    pub author_name: Option<String>,

    #[serde(default)]
    pub branch: Option<String>,
}

/// One past execution of a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(default)]
    pub status: TestStatus,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub commit: CommitInfo,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub group_id: Option<String>,
}

/// Allow-lists applied to accumulated history records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Branch names; empty means any branch
    pub branches: Vec<String>,
    /// Tags; a record matches when it carries any of them. Empty means any.
    pub tags: Vec<String>,
    /// Group the record must belong to
    pub group_id: Option<String>,
}

impl HistoryFilter {
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        let branch_match = self.branches.is_empty()
            || record
                .commit
                .branch
                .as_ref()
                .is_some_and(|branch| self.branches.contains(branch));

        let tag_match =
            self.tags.is_empty() || self.tags.iter().any(|tag| record.tags.contains(tag));

        let group_match = self
            .group_id
            .as_ref()
            .is_none_or(|group| record.group_id.as_ref() == Some(group));

        branch_match && tag_match && group_match
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty() && self.tags.is_empty() && self.group_id.is_none()
    }
}

/// Streak statistics derived from newest-first history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreakSummary {
    /// Leading failures before the most recent pass (prior executions only)
    pub consecutive_failures: u32,
    pub last_pass_commit_sha: Option<String>,
    pub last_pass_date: Option<DateTime<Utc>>,
}

impl StreakSummary {
    /// Scan newest-first records until the first pass.
    ///
    /// Statuses other than passed/failed neither extend nor end the streak.
    pub fn from_records(records: &[HistoryRecord]) -> Self {
        let mut summary = Self::default();

        for record in records {
            match record.status {
                TestStatus::Failed => summary.consecutive_failures += 1,
                TestStatus::Passed => {
                    summary.last_pass_commit_sha = record.commit.sha.clone();
                    summary.last_pass_date = Some(record.created_at);
                    break;
                }
                TestStatus::Other => {}
            }
        }

        summary
    }
}

/// History of one test over the query window, plus derived statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHistory {
    pub signature: String,

    /// Records after filtering, newest-first
    pub records: Vec<HistoryRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_author: Option<String>,

    /// Prior consecutive failures, excluding the failure under evaluation
    pub consecutive_failures: u32,

    #[serde(rename = "lastPassCommitSHA", skip_serializing_if = "Option::is_none")]
    pub last_pass_commit_sha: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pass_date: Option<DateTime<Utc>>,

    #[serde(rename = "firstFailureCommitSHA", skip_serializing_if = "Option::is_none")]
    pub first_failure_commit_sha: Option<String>,
}

impl TestHistory {
    /// Derive statistics from filtered, newest-first records.
    pub fn from_records(signature: impl Into<String>, records: Vec<HistoryRecord>) -> Self {
        let streak = StreakSummary::from_records(&records);
        let latest_author = records
            .first()
            .and_then(|record| record.commit.author_name.clone());

        let mut history = Self {
            signature: signature.into(),
            records,
            latest_author,
            consecutive_failures: streak.consecutive_failures,
            last_pass_commit_sha: streak.last_pass_commit_sha,
            last_pass_date: streak.last_pass_date,
            first_failure_commit_sha: None,
        };

        if history.consecutive_failures > 1 {
            history.first_failure_commit_sha = history.earliest_commit_sha();
        }

        history
    }

    /// Commit of the chronologically earliest record in the window.
    pub fn earliest_commit_sha(&self) -> Option<String> {
        self.records
            .iter()
            .min_by_key(|record| record.created_at)
            .and_then(|record| record.commit.sha.clone())
    }
}
