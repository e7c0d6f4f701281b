use serde::{Deserialize, Deserializer, Serialize};

/// Main configuration structure for rundiff
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Results service connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Rate limiting and connection cap
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Fan-out widths
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// History window and allow-lists
    #[serde(default)]
    pub history: HistoryConfig,

    /// Previous-run lookup filters
    #[serde(default)]
    pub previous_run: PreviousRunConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Results service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiConfig {
    /// Base URL of the results API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token
    #[serde(default)]
    pub api_key: String,

    /// Project the runs belong to
    #[serde(default)]
    pub project_id: String,

    /// Timeout for run, signature, history and listing requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for instance detail requests (larger payloads)
    #[serde(default = "default_instance_timeout_secs")]
    pub instance_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.currents.dev".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_instance_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            project_id: String::new(),
            timeout_secs: default_timeout_secs(),
            instance_timeout_secs: default_instance_timeout_secs(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total attempts per request, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Unit of the jittered backoff: attempt `n` sleeps `[1, 2^n]` units
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Lower bound on the wait after an exhausted rate limit
    #[serde(default = "default_min_rate_limit_wait_ms")]
    pub min_rate_limit_wait_ms: u64,
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_backoff_unit_ms() -> u64 {
    1000
}

const fn default_min_rate_limit_wait_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
            min_rate_limit_wait_ms: default_min_rate_limit_wait_ms(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed across all callers
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Maximum concurrent outbound HTTP exchanges
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

const fn default_requests_per_second() -> f64 {
    10.0
}

const fn default_max_connections() -> usize {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            max_connections: default_max_connections(),
        }
    }
}

/// Fan-out widths for the fetch stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConcurrencyConfig {
    /// Upper bound on concurrent instance fetches per run
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Concurrent history fetches during enrichment
    #[serde(default = "default_history_workers")]
    pub history_workers: usize,

    /// Instances with more tests than this map them in parallel
    #[serde(default = "default_parallel_mapping_threshold")]
    pub parallel_mapping_threshold: usize,
}

const fn default_max_workers() -> usize {
    5
}

const fn default_history_workers() -> usize {
    5
}

const fn default_parallel_mapping_threshold() -> usize {
    10
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            history_workers: default_history_workers(),
            parallel_mapping_threshold: default_parallel_mapping_threshold(),
        }
    }
}

/// History lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HistoryConfig {
    /// Days before the reference time covered by the query window
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Branch allow-list; empty keeps every branch
    #[serde(default, deserialize_with = "string_list")]
    pub branches: Vec<String>,

    /// Tag allow-list; a record matches when it carries any listed tag
    #[serde(default, deserialize_with = "string_list")]
    pub tags: Vec<String>,

    /// Only keep records from the same group as the failing test
    #[serde(default = "default_true")]
    pub match_group: bool,

    /// Safety cap on pages followed per signature
    #[serde(default = "default_history_max_pages")]
    pub max_pages: u32,
}

const fn default_window_days() -> u32 {
    5
}

const fn default_true() -> bool {
    true
}

const fn default_history_max_pages() -> u32 {
    100
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            branches: Vec::new(),
            tags: Vec::new(),
            match_group: default_true(),
            max_pages: default_history_max_pages(),
        }
    }
}

/// Filters used to find the run preceding the current one
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PreviousRunConfig {
    /// Tags a candidate run must carry (all of them)
    #[serde(default = "default_previous_tags", deserialize_with = "string_list")]
    pub tags: Vec<String>,

    /// Branches a candidate run may come from
    #[serde(default = "default_previous_branches", deserialize_with = "string_list")]
    pub branches: Vec<String>,

    /// Runs requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Safety cap on pages scanned
    #[serde(default = "default_previous_max_pages")]
    pub max_pages: u32,
}

fn default_previous_tags() -> Vec<String> {
    vec!["merge".to_string()]
}

fn default_previous_branches() -> Vec<String> {
    vec!["main".to_string(), "refs/heads/main".to_string()]
}

const fn default_page_size() -> u32 {
    50
}

const fn default_previous_max_pages() -> u32 {
    20
}

impl Default for PreviousRunConfig {
    fn default() -> Self {
        Self {
            tags: default_previous_tags(),
            branches: default_previous_branches(),
            page_size: default_page_size(),
            max_pages: default_previous_max_pages(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for daily rolling JSON log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Accept a list either as a sequence or as a comma-separated string,
/// the form allow-lists take in environment variables.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match ListOrString::deserialize(deserializer)? {
        ListOrString::List(items) => items,
        ListOrString::Csv(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    })
}
