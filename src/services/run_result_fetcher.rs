use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::fan_out::fan_out;
use crate::domain::errors::{DiffError, DomainResult};
use crate::domain::models::{
    ConcurrencyConfig, InstanceDetails, InstanceTest, RunDetails, RunSnapshot, TestOutcome,
};
use crate::domain::ports::ResultsApi;

/// Fetches every spec instance of a run and flattens them into a snapshot.
///
/// Instance failures are isolated: the failing instance is logged and left
/// out, the rest of the run still comes back.
pub struct RunResultFetcher {
    api: Arc<dyn ResultsApi>,
    max_workers: usize,
    parallel_mapping_threshold: usize,
}

impl RunResultFetcher {
    pub fn new(api: Arc<dyn ResultsApi>, config: &ConcurrencyConfig) -> Self {
        Self {
            api,
            max_workers: config.max_workers.max(1),
            parallel_mapping_threshold: config.parallel_mapping_threshold,
        }
    }

    /// Fetch run details, then the snapshot of every instance
    ///
    /// Failing to fetch the run itself is fatal for the comparison.
    #[instrument(skip(self))]
    pub async fn fetch(&self, run_id: &str) -> DomainResult<RunSnapshot> {
        let run = self
            .api
            .get_run(run_id)
            .await
            .map_err(|source| DiffError::SnapshotUnavailable {
                run_id: run_id.to_string(),
                source,
            })?;

        Ok(self.fetch_for_run(&run).await)
    }

    /// Build the snapshot of a run whose details are already known
    #[instrument(skip(self, run), fields(run_id = %run.run_id))]
    pub async fn fetch_for_run(&self, run: &RunDetails) -> RunSnapshot {
        let instance_ids = run.instance_ids();

        if instance_ids.is_empty() {
            let missing = DiffError::MissingData(format!("run {} has no spec instances", run.run_id));
            warn!(error = %missing, "returning empty snapshot");
            return RunSnapshot::empty(run.run_id.clone());
        }

        let width = self.max_workers.min(instance_ids.len());
        debug!(instances = instance_ids.len(), width, "fetching instances");

        let results = fan_out(instance_ids, width, |instance_id| {
            let api = self.api.clone();
            async move {
                let result = api.get_instance(&instance_id).await;
                (instance_id, result)
            }
        })
        .await;

        let mut outcomes = Vec::new();
        let mut failed_instances = 0_usize;

        for result in results {
            match result {
                Ok((instance_id, Ok(instance))) => {
                    let mapped = self.map_instance(&instance_id, instance).await;
                    outcomes.extend(mapped);
                }
                Ok((instance_id, Err(err))) => {
                    failed_instances += 1;
                    warn!(%instance_id, error = %err, "instance fetch failed, excluding it");
                }
                // Already logged by the fan-out
                Err(_) => failed_instances += 1,
            }
        }

        let snapshot = RunSnapshot::new(run.run_id.clone(), outcomes);
        info!(
            tests = snapshot.len(),
            failed_instances, "run snapshot fetched"
        );
        snapshot
    }

    /// Map an instance's tests, in parallel chunks above the threshold
    async fn map_instance(&self, instance_id: &str, instance: InstanceDetails) -> Vec<TestOutcome> {
        let spec = instance.spec.clone().unwrap_or_default();
        let group_id = instance.group_id.clone();
        let tests = instance.tests();

        if tests.is_empty() {
            let missing = DiffError::MissingData(format!("instance {instance_id} has no tests"));
            debug!(error = %missing, "instance contributes nothing");
            return Vec::new();
        }

        if tests.len() <= self.parallel_mapping_threshold {
            return map_tests(tests, &spec, group_id.as_ref());
        }

        let chunk_size = tests.len().div_ceil(self.max_workers);
        let chunks: Vec<Vec<InstanceTest>> =
            tests.chunks(chunk_size).map(<[InstanceTest]>::to_vec).collect();
        let width = chunks.len();

        let mapped = fan_out(chunks, width, |chunk| {
            let spec = spec.clone();
            let group_id = group_id.clone();
            async move { map_tests(&chunk, &spec, group_id.as_ref()) }
        })
        .await;

        mapped.into_iter().flatten().flatten().collect()
    }
}

fn map_tests(tests: &[InstanceTest], spec: &str, group_id: Option<&String>) -> Vec<TestOutcome> {
    tests
        .iter()
        .filter_map(|test| map_test(test, spec, group_id))
        .collect()
}

/// Convert one instance test; tests without an id cannot be compared
fn map_test(test: &InstanceTest, spec: &str, group_id: Option<&String>) -> Option<TestOutcome> {
    let Some(test_id) = test.test_id.as_deref() else {
        debug!(title = %test.title.display_name(), "skipping test without testId");
        return None;
    };

    Some(
        TestOutcome::new(test_id, &test.title, test.state, spec)
            .with_group(group_id.cloned())
            .with_attempts(test.attempts),
    )
}
