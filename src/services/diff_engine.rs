//! Two-run comparison with history-driven reclassification.
//!
//! The status pair of a test across the two snapshots is only a cheap
//! pre-filter. Every test that fails in the current run becomes a failure
//! candidate, and its final bucket is decided by the length of its failure
//! streak once history has been fetched.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::fan_out::fan_out;
use super::history_fetcher::{normalize_reference_time, HistoryFetcher};
use crate::domain::errors::DiffError;
use crate::domain::models::{
    Bucket, DiffResult, EnrichedTestOutcome, RunSnapshot, TestHistory, TestOutcome, TestStatus,
};

/// Outcome of comparing one test id across the two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreClassification {
    /// Not reported
    Drop,
    /// Failed before, passes now
    Resolved,
    /// Only present in the current run
    NewTest,
    /// Fails now; the bucket depends on its history
    FailureCandidate,
}

/// Status-pair pre-filter
///
/// `previous` is `None` when the test is absent from the previous run.
pub const fn pre_classify(previous: Option<TestStatus>, current: TestStatus) -> PreClassification {
    match (previous, current) {
        (None, _) => PreClassification::NewTest,
        (Some(TestStatus::Failed), TestStatus::Passed) => PreClassification::Resolved,
        (Some(_), TestStatus::Failed) => PreClassification::FailureCandidate,
        (Some(_), _) => PreClassification::Drop,
    }
}

/// Final bucket of a failure candidate given its streak including the current failure
pub const fn reclassify(consecutive_failures: u32) -> Bucket {
    if consecutive_failures > 1 {
        Bucket::StillFailing
    } else {
        Bucket::NewFailures
    }
}

/// Classifies two snapshots into the four buckets.
pub struct DiffEngine {
    history: Arc<HistoryFetcher>,
    history_workers: usize,
}

impl DiffEngine {
    pub fn new(history: Arc<HistoryFetcher>, history_workers: usize) -> Self {
        Self {
            history,
            history_workers: history_workers.max(1),
        }
    }

    /// Compare `previous` and `current`
    ///
    /// `run_author` and `run_timestamp` describe the current run. The
    /// timestamp anchors the history window of every failure candidate.
    #[instrument(
        skip(self, previous, current),
        fields(previous_run = %previous.run_id(), current_run = %current.run_id())
    )]
    pub async fn diff(
        &self,
        previous: &RunSnapshot,
        current: &RunSnapshot,
        run_author: Option<&str>,
        run_timestamp: Option<&str>,
    ) -> DiffResult {
        let previous_by_id = previous.by_test_id();
        let current_by_id = current.by_test_id();

        let all_ids: BTreeSet<&str> = previous_by_id
            .keys()
            .chain(current_by_id.keys())
            .copied()
            .collect();

        let mut builder = DiffResult::builder();
        let mut candidates: Vec<TestOutcome> = Vec::new();
        let mut submitted = HashSet::new();

        for test_id in all_ids {
            // Only in previous
            let Some(curr) = current_by_id.get(test_id) else {
                continue;
            };
            let prev_status = previous_by_id.get(test_id).map(|prev| prev.status);

            match pre_classify(prev_status, curr.status) {
                PreClassification::Drop => {}
                PreClassification::Resolved => {
                    builder.push(Bucket::Resolved, EnrichedTestOutcome::from((*curr).clone()));
                }
                PreClassification::NewTest => {
                    let mut enriched = EnrichedTestOutcome::from((*curr).clone());
                    enriched.author = run_author.map(str::to_string);
                    builder.push(Bucket::NewTests, enriched);
                }
                PreClassification::FailureCandidate => {
                    if submitted.insert(test_id) {
                        candidates.push((*curr).clone());
                    }
                }
            }
        }

        if !candidates.is_empty() {
            let reference = normalize_reference_time(run_timestamp);
            for (bucket, enriched) in self.enrich(candidates, reference, run_author).await {
                builder.push(bucket, enriched);
            }
        }

        let result = builder.build();
        let counts = result.counts();
        info!(
            resolved = counts.resolved,
            still_failing = counts.still_failing,
            new_failures = counts.new_failures,
            new_tests = counts.new_tests,
            "diff complete"
        );
        result
    }

    /// Fetch history for every candidate, then assign the final buckets
    async fn enrich(
        &self,
        candidates: Vec<TestOutcome>,
        reference: DateTime<Utc>,
        run_author: Option<&str>,
    ) -> Vec<(Bucket, EnrichedTestOutcome)> {
        debug!(
            candidates = candidates.len(),
            width = self.history_workers,
            "fetching failure history"
        );

        let requests: Vec<(String, String, Option<String>)> = candidates
            .iter()
            .map(|c| (c.spec.clone(), c.name.clone(), c.group_id.clone()))
            .collect();

        let results = fan_out(requests, self.history_workers, |(spec, title, group_id)| {
            let history = self.history.clone();
            async move {
                history
                    .fetch_at(&spec, &title, reference, group_id.as_deref())
                    .await
            }
        })
        .await;

        candidates
            .into_iter()
            .zip(results)
            .map(|(candidate, result)| {
                let history = match result {
                    Ok(Ok(history)) => Ok(history),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(join_err) => Err(join_err.to_string()),
                };
                apply_history(candidate, history, run_author)
            })
            .collect()
    }
}

/// Attach history to a failure candidate and pick its bucket
fn apply_history(
    candidate: TestOutcome,
    history: Result<TestHistory, String>,
    run_author: Option<&str>,
) -> (Bucket, EnrichedTestOutcome) {
    let mut enriched = EnrichedTestOutcome::from(candidate);

    match history {
        Ok(history) => {
            // History counts prior failures only
            let streak = history.consecutive_failures + 1;

            enriched.author = run_author
                .map(str::to_string)
                .or_else(|| history.latest_author.clone());
            enriched.consecutive_failures = Some(streak);
            enriched.last_pass_commit_sha = history.last_pass_commit_sha.clone();
            enriched.last_pass_date = history.last_pass_date;
            if streak > 1 {
                enriched.first_failure_commit_sha = history.earliest_commit_sha();
            }
            enriched.history = Some(history);

            (reclassify(streak), enriched)
        }
        Err(reason) => {
            let err = DiffError::PartialEnrichment {
                test_id: enriched.test_id().to_string(),
                reason,
            };
            warn!(error = %err, "history unavailable, defaulting to new failure");

            enriched.author = run_author.map(str::to_string);
            enriched.history_error = Some(err.to_string());

            (Bucket::NewFailures, enriched)
        }
    }
}
