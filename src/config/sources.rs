//! Import source and sink configuration loading from config.toml
//!
//! This module defines the shape of the `config.toml` file that drives the
//! import workers: global import settings (dedup window, retry policy,
//! timeouts), an optional sink for mirroring committed entries to an external
//! finance tool, and one `[[sources]]` entry per external account to poll.

use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Global import behavior shared by all sources
    #[serde(default)]
    pub import: ImportSettings,
    /// Optional external finance tool to mirror committed entries into
    pub sink: Option<SinkConfig>,
    /// External accounts to poll
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Global import settings with sensible defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct ImportSettings {
    /// Half-width of the semantic duplicate window in hours (±N hours)
    #[serde(default = "default_dedup_window_hours")]
    pub dedup_window_hours: i64,
    /// How many times a failed source fetch is attempted before the cycle
    /// step is abandoned
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base delay between retry attempts; the delay grows linearly with the
    /// attempt number
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    /// Per-request HTTP timeout for adapter calls
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// How long stop/stop_all waits for workers to acknowledge cancellation
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

fn default_dedup_window_hours() -> i64 {
    12
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_secs() -> u64 {
    5
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_stop_timeout_secs() -> u64 {
    10
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            dedup_window_hours: default_dedup_window_hours(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_secs: default_retry_backoff_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

/// Sink (external finance tool) connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    /// Provider tag resolved by the adapter factory (e.g. "firefly")
    pub provider: String,
    /// Base URL of the sink API
    pub endpoint: String,
    /// API token
    pub token: String,
    /// Account identifier on the sink side
    pub account: String,
}

/// Configuration for a single import source.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Worker name, unique per source
    pub name: String,
    /// Provider tag resolved by the adapter factory (e.g. "esplora",
    /// "gocardless")
    pub provider: String,
    /// Base URL of the source API
    pub endpoint: String,
    /// Account identifier on the source side (address, account id, ...)
    pub account: String,
    /// API token, for providers that need one
    #[serde(default)]
    pub token: Option<String>,
    /// Name of the local wallet imported transactions are booked against
    pub wallet: String,
    /// Name of the category used for incoming activity
    pub income_category: String,
    /// Name of the category used for outgoing activity
    pub expense_category: String,
    /// Polling interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Maximum number of records fetched per cycle
    #[serde(default)]
    pub limit: Option<u32>,
    /// Explicit lower bound for imports; overrides the stored watermark
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
}

fn default_interval_secs() -> u64 {
    300
}

/// Loads the application configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the application configuration from the default location (./config.toml)
pub fn load_default_config() -> Result<AppConfig> {
    load_config("config.toml")
}
