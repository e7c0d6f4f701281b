//! Domain layer for rundiff
//!
//! Models, error taxonomy and ports. Nothing in here performs I/O.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{ApiError, DiffError, DomainResult};
