use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Token bucket rate limiter shared by every outbound request
///
/// Clones share the same bucket, so concurrent fetch stages draw from one
/// budget instead of tripping the server limit independently.
#[derive(Clone)]
pub struct TokenBucketRateLimiter {
    /// Current number of available tokens and the time they were last refilled
    state: Arc<Mutex<BucketState>>,
    /// Maximum token capacity (equals refill_rate for one second of burst)
    capacity: f64,
    /// Tokens added per second
    refill_rate: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketRateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `rate_limit_rps` - Requests per second allowed (e.g., 10.0 for 10 requests/sec)
    ///
    /// # Example
    /// ```
    /// use rundiff::infrastructure::currents::rate_limiter::TokenBucketRateLimiter;
    ///
    /// let rate_limiter = TokenBucketRateLimiter::new(10.0);
    /// ```
    ///
    /// # Panics
    /// Panics if `rate_limit_rps` is not positive.
    pub fn new(rate_limit_rps: f64) -> Self {
        assert!(rate_limit_rps > 0.0, "Rate limit must be positive");

        Self {
            state: Arc::new(Mutex::new(BucketState {
                tokens: rate_limit_rps,
                last_refill: Instant::now(),
            })),
            capacity: rate_limit_rps,
            refill_rate: rate_limit_rps,
        }
    }

    /// Acquire a token from the bucket, waiting if necessary
    pub async fn acquire(&self) {
        loop {
            let wait_duration = {
                let mut state = self.state.lock().await;

                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                let available = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
                state.last_refill = now;

                if available >= 1.0 {
                    state.tokens = available - 1.0;
                    return;
                }

                state.tokens = available;
                let tokens_needed = 1.0 - available;
                Duration::from_secs_f64((tokens_needed / self.refill_rate).max(0.01))
            };

            // Lock released before sleeping
            sleep(wait_duration).await;
        }
    }

    /// Current number of available tokens (for testing/monitoring)
    pub async fn available_tokens(&self) -> f64 {
        let state = self.state.lock().await;
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        (state.tokens + elapsed * self.refill_rate).min(self.capacity)
    }
}

impl std::fmt::Debug for TokenBucketRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketRateLimiter")
            .field("capacity", &self.capacity)
            .field("refill_rate", &self.refill_rate)
            .finish_non_exhaustive()
    }
}
