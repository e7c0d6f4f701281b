//! Outbound request execution with bounded retry and rate-limit handling.
//!
//! Every call to the results service goes through [`Requester::execute`].
//! Retry state is local to one call; the token bucket and the connection cap
//! are shared by all clones.

use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::rate_limiter::TokenBucketRateLimiter;
use crate::domain::errors::ApiError;
use crate::domain::models::{RateLimitConfig, RetryConfig};

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Attempt budget and backoff timing
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    max_attempts: u32,
    /// Backoff unit; attempt `n` sleeps a uniform `[1, 2^n]` units
    backoff_unit: Duration,
    /// Lower bound on a rate-limit wait
    min_rate_limit_wait: Duration,
}

impl RetryPolicy {
    /// # Panics
    /// Panics if `max_attempts` is 0; [`ConfigLoader::validate`] rejects such configs.
    ///
    /// [`ConfigLoader::validate`]: crate::infrastructure::config::ConfigLoader::validate
    pub fn new(max_attempts: u32, backoff_unit: Duration, min_rate_limit_wait: Duration) -> Self {
        assert!(max_attempts > 0, "max_attempts must be greater than 0");

        Self {
            max_attempts,
            backoff_unit,
            min_rate_limit_wait,
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Jittered exponential backoff for a failed attempt (0-indexed)
    ///
    /// Uniform in `[1, 2^attempt]` backoff units.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let upper = 2_f64.powi(i32::try_from(attempt.min(16)).unwrap_or(16));
        let factor = rand::thread_rng().gen_range(1.0..=upper);
        self.backoff_unit.mul_f64(factor)
    }

    /// Wait until the advertised reset time, clamped to the minimum wait
    fn rate_limit_wait(&self, reset_epoch_secs: Option<f64>) -> Duration {
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        let until_reset = reset_epoch_secs.map_or(0.0, |reset| reset - now);
        Duration::from_secs_f64(until_reset.max(0.0)).max(self.min_rate_limit_wait)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1), Duration::from_secs(1))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_unit_ms),
            Duration::from_millis(config.min_rate_limit_wait_ms),
        )
    }
}

/// Rate-limit headers of a 429 response
#[derive(Debug, Clone, Copy, PartialEq)]
struct RateLimitHeaders {
    /// Requests left in the window; a missing header counts as exhausted
    remaining: u64,
    /// Reset time in epoch seconds
    reset: Option<f64>,
}

impl RateLimitHeaders {
    fn parse(headers: &HeaderMap) -> Self {
        let value = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        };

        Self {
            remaining: value(RATE_LIMIT_REMAINING)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            reset: value(RATE_LIMIT_RESET).and_then(|v| v.parse().ok()),
        }
    }
}

/// Outcome of a single attempt
enum Attempt {
    Success(Response),
    RateLimited(RateLimitHeaders),
    Failed(ApiError),
}

/// Executes requests with the shared limiter, connection cap and retry policy
#[derive(Debug, Clone)]
pub struct Requester {
    policy: RetryPolicy,
    rate_limiter: TokenBucketRateLimiter,
    connections: Arc<Semaphore>,
}

impl Requester {
    /// # Panics
    /// Panics if `max_connections` is 0.
    pub fn new(
        policy: RetryPolicy,
        rate_limiter: TokenBucketRateLimiter,
        max_connections: usize,
    ) -> Self {
        assert!(max_connections > 0, "max_connections must be greater than 0");

        Self {
            policy,
            rate_limiter,
            connections: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// # Panics
    /// Panics on zero attempts, zero connections or a non-positive rate,
    /// all of which `ConfigLoader::validate` rejects.
    pub fn from_config(retry: &RetryConfig, rate_limit: &RateLimitConfig) -> Self {
        Self::new(
            RetryPolicy::from(retry),
            TokenBucketRateLimiter::new(rate_limit.requests_per_second),
            rate_limit.max_connections,
        )
    }

    /// Run `request_fn` until it yields a 2xx response or the budget is spent
    ///
    /// # Returns
    /// * `Ok(Response)` - Successful response; the caller decodes the payload
    /// * `Err(ApiError::RateLimited)` - The last attempt was rate limited
    /// * `Err(ApiError::TransientNetwork)` - Any other failure on the last attempt
    pub async fn execute<F, Fut>(&self, mut request_fn: F) -> Result<Response, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Response, reqwest::Error>>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = None;

        for attempt in 0..max_attempts {
            self.rate_limiter.acquire().await;

            let outcome = {
                let _permit = self
                    .connections
                    .acquire()
                    .await
                    .map_err(|_| ApiError::InvalidRequest("connection pool closed".to_string()))?;

                match request_fn().await {
                    Ok(response) => Self::classify(response).await,
                    Err(err) => Attempt::Failed(ApiError::Network(err)),
                }
            };

            let is_last = attempt + 1 >= max_attempts;

            match outcome {
                Attempt::Success(response) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "request succeeded after retries");
                    }
                    return Ok(response);
                }
                Attempt::RateLimited(limits) if limits.remaining == 0 => {
                    let wait = self.policy.rate_limit_wait(limits.reset);
                    warn!(
                        attempt = attempt + 1,
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "rate limit reached, waiting for reset"
                    );
                    last_error = Some(ApiError::RateLimited {
                        attempts: max_attempts,
                    });
                    if !is_last {
                        sleep(wait).await;
                    }
                }
                Attempt::RateLimited(_) => {
                    let err = ApiError::Status {
                        status: StatusCode::TOO_MANY_REQUESTS,
                        body: "rate limited".to_string(),
                    };
                    last_error = Some(err);
                    self.back_off(attempt, is_last, last_error.as_ref()).await;
                }
                Attempt::Failed(err) => {
                    last_error = Some(err);
                    self.back_off(attempt, is_last, last_error.as_ref()).await;
                }
            }
        }

        Err(match last_error {
            Some(ApiError::RateLimited { attempts }) => ApiError::RateLimited { attempts },
            Some(err) => {
                warn!(attempts = max_attempts, error = %err, "max retries reached");
                ApiError::TransientNetwork {
                    attempts: max_attempts,
                    message: err.to_string(),
                }
            }
            None => ApiError::TransientNetwork {
                attempts: max_attempts,
                message: "no attempt was made".to_string(),
            },
        })
    }

    async fn back_off(&self, attempt: u32, is_last: bool, err: Option<&ApiError>) {
        if is_last {
            return;
        }

        let backoff = self.policy.backoff(attempt);
        warn!(
            attempt = attempt + 1,
            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            error = err.map(ToString::to_string).unwrap_or_default(),
            "request failed, retrying"
        );
        sleep(backoff).await;
    }

    async fn classify(response: Response) -> Attempt {
        let status = response.status();

        if status.is_success() {
            return Attempt::Success(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::RateLimited(RateLimitHeaders::parse(response.headers()));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());
        Attempt::Failed(ApiError::Status { status, body })
    }
}
