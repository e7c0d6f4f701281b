//! Service layer: the fetch, history and diff stages and the pipeline that
//! runs them in a fixed order.

pub mod comparison;
pub mod diff_engine;
pub mod fan_out;
pub mod history_fetcher;
pub mod run_locator;
pub mod run_result_fetcher;

pub use comparison::Comparison;
pub use diff_engine::{pre_classify, reclassify, DiffEngine, PreClassification};
pub use history_fetcher::{normalize_reference_time, HistoryFetcher};
pub use run_locator::RunLocator;
pub use run_result_fetcher::RunResultFetcher;
