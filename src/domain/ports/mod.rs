//! Port trait definitions (Hexagonal Architecture)
//!
//! - `ResultsApi`: read access to the test results service
//!
//! The services depend on these traits only, so fetch and diff logic can run
//! against the HTTP client or an in-memory fake.

pub mod results_api;

pub use results_api::ResultsApi;
