//! Test outcome domain model.
//!
//! A run snapshot is the flat list of test outcomes produced by one CI run,
//! keyed by the test id the results service assigns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Separator used to join hierarchical title segments into a display name.
pub const TITLE_SEPARATOR: &str = " > ";

/// Final state of a single test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Test passed
    Passed,
    /// Test failed
    Failed,
    /// Any other state (pending, skipped, unknown)
    #[serde(other)]
    Other,
}

impl Default for TestStatus {
    fn default() -> Self {
        Self::Other
    }
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test title as reported by the results service: either a single string or
/// the describe-block path down to the test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestTitle {
    Path(Vec<String>),
    Single(String),
}

impl Default for TestTitle {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl TestTitle {
    /// Join the title segments into a display name.
    pub fn display_name(&self) -> String {
        match self {
            Self::Path(segments) => segments.join(TITLE_SEPARATOR),
            Self::Single(title) => title.clone(),
        }
    }

    /// Title segments, a single-string title counting as one segment.
    pub fn segments(&self) -> Vec<String> {
        match self {
            Self::Path(segments) => segments.clone(),
            Self::Single(title) => vec![title.clone()],
        }
    }
}

/// Outcome of one test in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    /// Identity of the test within a run snapshot
    pub test_id: String,

    /// Hierarchical title joined with [`TITLE_SEPARATOR`]
    pub name: String,

    /// Raw title segments
    #[serde(default)]
    pub title: Vec<String>,

    pub status: TestStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    /// Spec file path the test lives in
    pub spec: String,

    /// Number of attempts recorded for the test
    #[serde(default)]
    pub attempts: u32,
}

impl TestOutcome {
    /// Convenience constructor used by the fetchers and tests.
    pub fn new(
        test_id: impl Into<String>,
        title: &TestTitle,
        status: TestStatus,
        spec: impl Into<String>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            name: title.display_name(),
            title: title.segments(),
            status,
            group_id: None,
            spec: spec.into(),
            attempts: 0,
        }
    }

    #[must_use]
    pub fn with_group(mut self, group_id: Option<String>) -> Self {
        self.group_id = group_id;
        self
    }

    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Immutable set of test outcomes fetched for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    run_id: String,
    outcomes: Vec<TestOutcome>,
}

impl RunSnapshot {
    /// Build a snapshot, keeping the last outcome when a test id repeats.
    pub fn new(run_id: impl Into<String>, outcomes: Vec<TestOutcome>) -> Self {
        let run_id = run_id.into();
        let total = outcomes.len();

        let mut position: HashMap<String, usize> = HashMap::with_capacity(total);
        let mut deduped: Vec<TestOutcome> = Vec::with_capacity(total);
        for outcome in outcomes {
            if let Some(&idx) = position.get(&outcome.test_id) {
                deduped[idx] = outcome;
            } else {
                position.insert(outcome.test_id.clone(), deduped.len());
                deduped.push(outcome);
            }
        }

        if deduped.len() != total {
            tracing::warn!(
                run_id = %run_id,
                duplicates = total - deduped.len(),
                "duplicate test ids in run snapshot, keeping last occurrence"
            );
        }

        Self {
            run_id,
            outcomes: deduped,
        }
    }

    /// Snapshot with no outcomes.
    pub fn empty(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            outcomes: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Index outcomes by test id.
    pub fn by_test_id(&self) -> HashMap<&str, &TestOutcome> {
        self.outcomes
            .iter()
            .map(|outcome| (outcome.test_id.as_str(), outcome))
            .collect()
    }
}
