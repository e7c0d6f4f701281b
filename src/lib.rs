//! Rundiff - CI run comparison engine
//!
//! Compares the test outcomes of two CI runs and classifies every test of the
//! current run into one of four buckets: Resolved, Still Failing, New
//! Failures and New Tests. Failing tests are enriched with their recent
//! execution history, and the length of their failure streak decides
//! between Still Failing and New Failures.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, error taxonomy and the `ResultsApi` port
//! - **Service Layer** (`services`): run fetching, history, diffing and the pipeline
//! - **Infrastructure Layer** (`infrastructure`): HTTP client, configuration, logging
//!
//! # Example
//!
//! ```no_run
//! use rundiff::{Comparison, ConfigLoader, LoggerImpl};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let _logger = LoggerImpl::init(&config.logging)?;
//!
//!     let comparison = Comparison::from_config(&config)?;
//!     let report = comparison.run("current-run-id", None).await?;
//!     println!("{}", serde_json::to_string_pretty(&report.diff)?);
//!     Ok(())
//! }
//! ```

pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Bucket, ComparisonContext, ComparisonReport, Config, DiffResult, EnrichedTestOutcome,
    RunSnapshot, TestHistory, TestOutcome, TestStatus,
};
pub use domain::ports::ResultsApi;
pub use domain::{ApiError, DiffError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::currents::{CurrentsClient, CurrentsClientConfig, Requester};
pub use infrastructure::logging::LoggerImpl;
pub use services::{Comparison, DiffEngine, HistoryFetcher, RunLocator, RunResultFetcher};
