pub mod api;
pub mod comparison;
pub mod config;
pub mod diff;
pub mod history;
pub mod outcome;

pub use api::{
    Envelope, HistoryPage, HistoryQuery, InstanceDetails, InstanceResults, InstanceTest, PageMeta,
    RunDetails, RunMeta, RunPage, RunQuery, SignatureData, SignatureRequest, SpecRef,
};
pub use comparison::{ComparisonContext, ComparisonReport};
pub use config::{
    ApiConfig, ConcurrencyConfig, Config, HistoryConfig, LoggingConfig, PreviousRunConfig,
    RateLimitConfig, RetryConfig,
};
pub use diff::{Bucket, BucketCounts, DiffResult, DiffResultBuilder, EnrichedTestOutcome};
pub use history::{CommitInfo, HistoryFilter, HistoryRecord, StreakSummary, TestHistory};
pub use outcome::{RunSnapshot, TestOutcome, TestStatus, TestTitle};
