//! Client for the test results service
//!
//! - `client`: endpoint wrappers implementing [`ResultsApi`](crate::domain::ports::ResultsApi)
//! - `requester`: retry, backoff and rate-limit handling shared by every request
//! - `rate_limiter`: token bucket consulted before each attempt

pub mod client;
pub mod rate_limiter;
pub mod requester;

pub use client::{CurrentsClient, CurrentsClientConfig};
pub use rate_limiter::TokenBucketRateLimiter;
pub use requester::{Requester, RetryPolicy};
