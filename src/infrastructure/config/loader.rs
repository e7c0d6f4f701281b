use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project configuration file
pub const CONFIG_FILE: &str = "rundiff.yaml";

/// Local override file, usually kept out of version control
pub const LOCAL_CONFIG_FILE: &str = "rundiff.local.yaml";

/// Prefix of nested environment overrides (`RUNDIFF_RETRY__MAX_ATTEMPTS`)
pub const ENV_PREFIX: &str = "RUNDIFF_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("API key cannot be empty (set api.api_key or CURRENTS_API_KEY)")]
    EmptyApiKey,

    #[error("Project id cannot be empty (set api.project_id or CURRENTS_PROJECT_ID)")]
    EmptyProjectId,

    #[error("Invalid base URL: {0}. Must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(usize),

    #[error("Invalid max_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error("Invalid {name}: {value}. Must be at least 1")]
    InvalidWorkers { name: &'static str, value: usize },

    #[error("Invalid window_days: {0}. Must be at least 1")]
    InvalidWindow(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `rundiff.yaml`
    /// 3. `rundiff.local.yaml`
    /// 4. `RUNDIFF_*` environment variables
    /// 5. `CURRENTS_API_KEY`, `CURRENTS_PROJECT_ID`, `FILTER_BRANCHES`, `FILTER_TAGS`
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring environment overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Self::compat_env())
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(CONFIG_FILE))
            .merge(Yaml::file(LOCAL_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Self::compat_env())
    }

    /// Unprefixed variables the CI workflow already exports
    fn compat_env() -> Env {
        Env::raw()
            .only(&[
                "CURRENTS_API_KEY",
                "CURRENTS_PROJECT_ID",
                "FILTER_BRANCHES",
                "FILTER_TAGS",
            ])
            .map(|key| match key.as_str().to_ascii_uppercase().as_str() {
                "CURRENTS_API_KEY" => "api.api_key".into(),
                "CURRENTS_PROJECT_ID" => "api.project_id".into(),
                "FILTER_BRANCHES" => "history.branches".into(),
                "FILTER_TAGS" => "history.tags".into(),
                _ => key.into(),
            })
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.api.api_key.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }

        if config.api.project_id.trim().is_empty() {
            return Err(ConfigError::EmptyProjectId);
        }

        let base_url = &config.api.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.clone()));
        }

        if config.api.timeout_secs == 0 || config.api.instance_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "request timeouts must be at least 1 second".to_string(),
            ));
        }

        if config.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.retry.max_attempts));
        }

        if config.rate_limit.requests_per_second <= 0.0
            || !config.rate_limit.requests_per_second.is_finite()
        {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_second,
            ));
        }

        if config.rate_limit.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.rate_limit.max_connections,
            ));
        }

        if config.concurrency.max_workers == 0 {
            return Err(ConfigError::InvalidWorkers {
                name: "max_workers",
                value: config.concurrency.max_workers,
            });
        }

        if config.concurrency.history_workers == 0 {
            return Err(ConfigError::InvalidWorkers {
                name: "history_workers",
                value: config.concurrency.history_workers,
            });
        }

        if config.history.window_days == 0 {
            return Err(ConfigError::InvalidWindow(config.history.window_days));
        }

        if config.history.max_pages == 0 {
            return Err(ConfigError::ValidationFailed(
                "history.max_pages must be at least 1".to_string(),
            ));
        }

        if config.previous_run.page_size == 0 || config.previous_run.max_pages == 0 {
            return Err(ConfigError::ValidationFailed(
                "previous_run.page_size and previous_run.max_pages must be at least 1"
                    .to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
