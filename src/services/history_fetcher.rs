use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::errors::{DiffError, DomainResult};
use crate::domain::models::{
    HistoryConfig, HistoryFilter, HistoryQuery, HistoryRecord, SignatureRequest, TestHistory,
};
use crate::domain::ports::ResultsApi;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a run timestamp, falling back to the current time
///
/// Accepts RFC 3339 and naive ISO-8601 timestamps (a trailing `Z` is
/// stripped and the value read as UTC). Missing or unparsable input is
/// logged and replaced by `Utc::now()`.
pub fn normalize_reference_time(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty() && *raw != "unknown") else {
        warn!("run timestamp missing, using the current time");
        return Utc::now();
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }

    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, format) {
            return parsed.and_utc();
        }
    }

    warn!(timestamp = %raw, "run timestamp is not ISO-8601, using the current time");
    Utc::now()
}

/// Resolves a test's signature and summarizes its recent executions.
pub struct HistoryFetcher {
    api: Arc<dyn ResultsApi>,
    window: chrono::Duration,
    branches: Vec<String>,
    tags: Vec<String>,
    match_group: bool,
    max_pages: u32,
}

impl HistoryFetcher {
    pub fn new(api: Arc<dyn ResultsApi>, config: &HistoryConfig) -> Self {
        Self {
            api,
            window: chrono::Duration::days(i64::from(config.window_days)),
            branches: config.branches.clone(),
            tags: config.tags.clone(),
            match_group: config.match_group,
            max_pages: config.max_pages.max(1),
        }
    }

    /// History of a test around a raw run timestamp
    pub async fn fetch(
        &self,
        spec: &str,
        title: &str,
        run_timestamp: Option<&str>,
        group_id: Option<&str>,
    ) -> DomainResult<TestHistory> {
        let reference = normalize_reference_time(run_timestamp);
        self.fetch_at(spec, title, reference, group_id).await
    }

    /// History of a test in the window ending at `reference`
    ///
    /// `consecutive_failures` on the result counts prior executions only.
    #[instrument(skip(self), fields(reference = %reference))]
    pub async fn fetch_at(
        &self,
        spec: &str,
        title: &str,
        reference: DateTime<Utc>,
        group_id: Option<&str>,
    ) -> DomainResult<TestHistory> {
        let signature = self.resolve_signature(spec, title).await?;

        let query = HistoryQuery {
            date_start: reference - self.window,
            date_end: reference,
            starting_after: None,
        };
        let records = self.fetch_all_pages(&signature, query).await?;
        let fetched = records.len();

        let filter = self.filter_for(group_id);
        let records: Vec<HistoryRecord> = if filter.is_empty() {
            records
        } else {
            records.into_iter().filter(|record| filter.matches(record)).collect()
        };

        debug!(
            %signature,
            fetched,
            kept = records.len(),
            "history records collected"
        );

        Ok(TestHistory::from_records(signature, records))
    }

    async fn resolve_signature(&self, spec: &str, title: &str) -> DomainResult<String> {
        let request = SignatureRequest {
            project_id: self.api.project_id().to_string(),
            spec_file_path: spec.to_string(),
            test_title: title.to_string(),
        };

        match self.api.resolve_signature(&request).await? {
            Some(signature) if !signature.is_empty() => Ok(signature),
            _ => Err(DiffError::SignatureResolution {
                spec: spec.to_string(),
                title: title.to_string(),
            }),
        }
    }

    /// Follow `next_cursor` until a page is empty or carries no cursor
    async fn fetch_all_pages(
        &self,
        signature: &str,
        mut query: HistoryQuery,
    ) -> DomainResult<Vec<HistoryRecord>> {
        let mut records = Vec::new();
        let mut seen_cursors = HashSet::new();

        for page_number in 1..=self.max_pages {
            let page = self.api.get_test_results(signature, &query).await?;

            if page.data.is_empty() {
                break;
            }
            records.extend(page.data);

            let Some(cursor) = page.meta.next_cursor.filter(|cursor| !cursor.is_empty()) else {
                break;
            };

            if !seen_cursors.insert(cursor.clone()) {
                warn!(%signature, %cursor, "history cursor repeated, stopping pagination");
                break;
            }

            if page_number == self.max_pages {
                warn!(%signature, max_pages = self.max_pages, "history page cap reached");
            }
            query.starting_after = Some(cursor);
        }

        Ok(records)
    }

    fn filter_for(&self, group_id: Option<&str>) -> HistoryFilter {
        HistoryFilter {
            branches: self.branches.clone(),
            tags: self.tags.clone(),
            group_id: group_id
                .filter(|_| self.match_group)
                .map(str::to_string),
        }
    }
}
