//! Error taxonomy for the comparison engine.
//!
//! [`ApiError`] covers a single outbound request. [`DiffError`] covers the
//! pipeline stages; most of its variants are recovered locally and only
//! surface as annotations on the result.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors from one call to the results service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection errors, timeouts and non-2xx responses, after the retry budget ran out
    #[error("Request failed after {attempts} attempts: {message}")]
    TransientNetwork { attempts: u32, message: String },

    /// HTTP 429 on every attempt of the budget
    #[error("Rate limited on all {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Non-success status from a single attempt
    #[error("Unexpected status ({status}): {body}")]
    Status { status: StatusCode, body: String },

    /// Connection-level failure from a single attempt
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the expected payload
    #[error("Malformed response payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Request could not be built (bad header value, bad URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors raised by the fetch, history and diff stages
#[derive(Error, Debug)]
pub enum DiffError {
    /// The signature lookup returned no signature
    #[error("No signature for '{title}' in {spec}")]
    SignatureResolution { spec: String, title: String },

    /// A run or instance carried no specs or tests
    #[error("Missing data: {0}")]
    MissingData(String),

    /// History enrichment failed for one failure candidate
    #[error("History unavailable for test {test_id}: {reason}")]
    PartialEnrichment { test_id: String, reason: String },

    /// One side of the comparison could not be fetched at all
    #[error("Run {run_id} could not be fetched: {source}")]
    SnapshotUnavailable {
        run_id: String,
        #[source]
        source: ApiError,
    },

    /// No earlier run matched the lookup filters
    #[error("Previous run not found for {0}")]
    PreviousRunNotFound(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl DiffError {
    /// Returns true for conditions that end the comparison
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SnapshotUnavailable { .. } | Self::PreviousRunNotFound(_)
        )
    }
}

pub type DomainResult<T> = Result<T, DiffError>;
