use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::domain::errors::{DiffError, DomainResult};
use crate::domain::models::{PreviousRunConfig, RunDetails, RunQuery};
use crate::domain::ports::ResultsApi;

/// Finds the run that preceded a reference run in the project run listing.
///
/// Runs are listed newest first. The previous run is the first run after
/// the reference run that carries every required tag and comes from an
/// allowed branch.
pub struct RunLocator {
    api: Arc<dyn ResultsApi>,
    tags: Vec<String>,
    branches: Vec<String>,
    page_size: u32,
    max_pages: u32,
}

impl RunLocator {
    pub fn new(api: Arc<dyn ResultsApi>, config: &PreviousRunConfig) -> Self {
        Self {
            api,
            tags: config.tags.clone(),
            branches: config.branches.clone(),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
        }
    }

    /// Locate the run listed right after `reference_run_id`
    #[instrument(skip(self))]
    pub async fn previous_run(&self, reference_run_id: &str) -> DomainResult<RunDetails> {
        let mut query = RunQuery {
            limit: self.page_size,
            tags: self.tags.clone(),
            branches: self.branches.clone(),
            ending_after: None,
        };
        let mut seen_reference = false;

        for page_number in 1..=self.max_pages {
            let page = self.api.list_project_runs(&query).await?;
            let Some(last_cursor) = page.data.last().map(|run| run.cursor.clone()) else {
                break;
            };

            for run in page.data.into_iter().filter(|run| self.accepts(run)) {
                if run.run_id == reference_run_id {
                    seen_reference = true;
                } else if seen_reference {
                    info!(previous_run = %run.run_id, page_number, "previous run located");
                    return Ok(run);
                }
            }

            if !page.has_more {
                break;
            }
            let Some(cursor) = last_cursor else {
                break;
            };
            debug!(page_number, %cursor, seen_reference, "following run listing cursor");
            query.ending_after = Some(cursor);
        }

        Err(DiffError::PreviousRunNotFound(reference_run_id.to_string()))
    }

    /// All required tags present and the branch allowed
    fn accepts(&self, run: &RunDetails) -> bool {
        let tags_ok = self.tags.iter().all(|tag| run.tags.contains(tag));
        let branch_ok = self.branches.is_empty()
            || run
                .branch()
                .is_some_and(|branch| self.branches.iter().any(|b| b == branch));
        tags_ok && branch_ok
    }
}
