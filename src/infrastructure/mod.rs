//! Infrastructure layer module
//!
//! - Results service HTTP client, request retry and rate limiting
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod currents;
pub mod logging;
