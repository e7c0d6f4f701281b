//! Fixed comparison pipeline.
//!
//! current run details -> previous run -> both snapshots (concurrently)
//! -> diff and enrichment -> [`ComparisonReport`]

use std::sync::Arc;
use tracing::{error, info, instrument};

use super::diff_engine::DiffEngine;
use super::history_fetcher::HistoryFetcher;
use super::run_locator::RunLocator;
use super::run_result_fetcher::RunResultFetcher;
use crate::domain::errors::{DiffError, DomainResult};
use crate::domain::models::{ComparisonContext, ComparisonReport, Config};
use crate::domain::ports::ResultsApi;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::currents::{CurrentsClient, CurrentsClientConfig, Requester};

/// Runs one comparison end to end
pub struct Comparison {
    api: Arc<dyn ResultsApi>,
    run_fetcher: RunResultFetcher,
    locator: RunLocator,
    diff_engine: DiffEngine,
}

impl Comparison {
    /// Wire the pipeline stages over any [`ResultsApi`]
    pub fn new(api: Arc<dyn ResultsApi>, config: &Config) -> Self {
        let history = Arc::new(HistoryFetcher::new(api.clone(), &config.history));

        Self {
            run_fetcher: RunResultFetcher::new(api.clone(), &config.concurrency),
            locator: RunLocator::new(api.clone(), &config.previous_run),
            diff_engine: DiffEngine::new(history, config.concurrency.history_workers),
            api,
        }
    }

    /// Pipeline over the HTTP client, sharing one requester across all stages
    ///
    /// The configuration is validated first, so limits that the requester
    /// cannot honor come back as an error.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        ConfigLoader::validate(config)?;
        let requester = Requester::from_config(&config.retry, &config.rate_limit);
        let client = CurrentsClient::new(CurrentsClientConfig::from(config), requester)?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// Compare `current_run_id` with `previous_run_id`, or with the run
    /// preceding it in the project listing when no id is given
    #[instrument(skip(self))]
    pub async fn run(
        &self,
        current_run_id: &str,
        previous_run_id: Option<&str>,
    ) -> DomainResult<ComparisonReport> {
        let result = self.execute(current_run_id, previous_run_id).await;
        if let Err(err) = &result {
            error!(error = %err, fatal = err.is_fatal(), "comparison aborted");
        }
        result
    }

    async fn execute(
        &self,
        current_run_id: &str,
        previous_run_id: Option<&str>,
    ) -> DomainResult<ComparisonReport> {
        let current_run = self
            .api
            .get_run(current_run_id)
            .await
            .map_err(|source| DiffError::SnapshotUnavailable {
                run_id: current_run_id.to_string(),
                source,
            })?;

        // A listing entry may omit spec instances, so only its id is kept
        let previous_run_id = match previous_run_id {
            Some(run_id) => run_id.to_string(),
            None => self.locator.previous_run(current_run_id).await?.run_id,
        };

        let context = ComparisonContext::new(current_run, previous_run_id);
        info!(
            current_run = %context.current_run_id(),
            previous_run = %context.previous_run_id,
            "comparing runs"
        );

        let (current, previous) = tokio::join!(
            self.run_fetcher.fetch_for_run(&context.current_run),
            self.run_fetcher.fetch(&context.previous_run_id),
        );
        let previous = previous?;

        let diff = self
            .diff_engine
            .diff(
                &previous,
                &current,
                context.run_author(),
                context.run_timestamp(),
            )
            .await;

        Ok(ComparisonReport { context, diff })
    }
}
