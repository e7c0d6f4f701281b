//! Classification buckets produced by comparing two run snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::TestHistory;
use super::outcome::TestOutcome;

/// One of the four mutually exclusive classification buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    /// Failed previously, passes now
    Resolved,
    /// Part of an ongoing failure streak
    #[serde(rename = "Still Failing")]
    StillFailing,
    /// Failing now, streak of one (or unknown)
    #[serde(rename = "New Failures")]
    NewFailures,
    /// Not present in the previous run
    #[serde(rename = "New Tests")]
    NewTests,
}

impl Bucket {
    pub const ALL: [Self; 4] = [
        Self::Resolved,
        Self::StillFailing,
        Self::NewFailures,
        Self::NewTests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolved => "Resolved",
            Self::StillFailing => "Still Failing",
            Self::NewFailures => "New Failures",
            Self::NewTests => "New Tests",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test outcome plus whatever history enrichment applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTestOutcome {
    #[serde(flatten)]
    pub outcome: TestOutcome,

    /// Streak length including the current failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consecutive_failures: Option<u32>,

    #[serde(rename = "lastPassCommitSHA", skip_serializing_if = "Option::is_none")]
    pub last_pass_commit_sha: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pass_date: Option<DateTime<Utc>>,

    #[serde(rename = "firstFailureCommitSHA", skip_serializing_if = "Option::is_none")]
    pub first_failure_commit_sha: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Set when history could not be fetched; the streak is then unknown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<TestHistory>,
}

impl EnrichedTestOutcome {
    pub fn test_id(&self) -> &str {
        self.outcome.test_id.as_str()
    }

    pub fn name(&self) -> &str {
        self.outcome.name.as_str()
    }
}

impl From<TestOutcome> for EnrichedTestOutcome {
    fn from(outcome: TestOutcome) -> Self {
        Self {
            outcome,
            consecutive_failures: None,
            last_pass_commit_sha: None,
            last_pass_date: None,
            first_failure_commit_sha: None,
            author: None,
            history_error: None,
            history: None,
        }
    }
}

/// Per-bucket sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketCounts {
    pub resolved: usize,
    pub still_failing: usize,
    pub new_failures: usize,
    pub new_tests: usize,
}

impl BucketCounts {
    pub const fn total(&self) -> usize {
        self.resolved + self.still_failing + self.new_failures + self.new_tests
    }
}

/// The four classification buckets, each sorted by test name.
///
/// Built once per comparison through [`DiffResultBuilder`]; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    #[serde(rename = "Resolved")]
    resolved: Vec<EnrichedTestOutcome>,

    #[serde(rename = "Still Failing")]
    still_failing: Vec<EnrichedTestOutcome>,

    #[serde(rename = "New Failures")]
    new_failures: Vec<EnrichedTestOutcome>,

    #[serde(rename = "New Tests")]
    new_tests: Vec<EnrichedTestOutcome>,
}

impl DiffResult {
    pub fn builder() -> DiffResultBuilder {
        DiffResultBuilder::default()
    }

    pub fn resolved(&self) -> &[EnrichedTestOutcome] {
        &self.resolved
    }

    pub fn still_failing(&self) -> &[EnrichedTestOutcome] {
        &self.still_failing
    }

    pub fn new_failures(&self) -> &[EnrichedTestOutcome] {
        &self.new_failures
    }

    pub fn new_tests(&self) -> &[EnrichedTestOutcome] {
        &self.new_tests
    }

    pub fn bucket(&self, bucket: Bucket) -> &[EnrichedTestOutcome] {
        match bucket {
            Bucket::Resolved => &self.resolved,
            Bucket::StillFailing => &self.still_failing,
            Bucket::NewFailures => &self.new_failures,
            Bucket::NewTests => &self.new_tests,
        }
    }

    /// Find which bucket holds a test, if any.
    pub fn locate(&self, test_id: &str) -> Option<Bucket> {
        Bucket::ALL.into_iter().find(|&bucket| {
            self.bucket(bucket)
                .iter()
                .any(|outcome| outcome.test_id() == test_id)
        })
    }

    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            resolved: self.resolved.len(),
            still_failing: self.still_failing.len(),
            new_failures: self.new_failures.len(),
            new_tests: self.new_tests.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }
}

/// Accumulates bucket entries; `build` applies the final name sort.
#[derive(Debug, Default)]
pub struct DiffResultBuilder {
    result: DiffResult,
}

impl DiffResultBuilder {
    pub fn push(&mut self, bucket: Bucket, outcome: EnrichedTestOutcome) -> &mut Self {
        match bucket {
            Bucket::Resolved => self.result.resolved.push(outcome),
            Bucket::StillFailing => self.result.still_failing.push(outcome),
            Bucket::NewFailures => self.result.new_failures.push(outcome),
            Bucket::NewTests => self.result.new_tests.push(outcome),
        }
        self
    }

    pub fn build(self) -> DiffResult {
        let mut result = self.result;
        sort_by_name(&mut result.resolved);
        sort_by_name(&mut result.still_failing);
        sort_by_name(&mut result.new_failures);
        sort_by_name(&mut result.new_tests);
        result
    }
}

/// Stable sort by test name.
pub fn sort_by_name(outcomes: &mut [EnrichedTestOutcome]) {
    outcomes.sort_by(|a, b| a.name().cmp(b.name()));
}
