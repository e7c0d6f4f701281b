//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber, with JSON or
//! pretty stdout output and an optional daily rolling JSON file.

pub mod logger;

pub use logger::LoggerImpl;
