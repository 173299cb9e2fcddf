//! Configuration data structures for gemcache.
//!
//! This module defines the schema for the application settings: the Gemini
//! endpoints, explicit-cache thresholds, local working directories and logging.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Upstream Gemini API settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Explicit/implicit caching thresholds and defaults.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Local directories used for downloads and exports.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the upstream Gemini API connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL for the Gemini REST API.
    /// Default: `https://generativelanguage.googleapis.com/v1beta`
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL for media uploads to the Files API.
    /// Default: `https://generativelanguage.googleapis.com/upload/v1beta`
    #[serde(default = "default_upload_base_url")]
    pub upload_base_url: String,

    /// Model used when none is given on the command line.
    /// Default: `models/gemini-2.0-flash-001`
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Request timeout in seconds.
    /// Default: `300` (5 minutes)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum attempts for retryable calls (count, get, create).
    /// Default: `3`
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Extra attempts for list calls before giving up with an empty listing.
    /// Default: `2`
    #[serde(default = "default_list_retries")]
    pub list_retries: u32,

    /// Delay between list attempts, in milliseconds.
    /// Default: `700`
    #[serde(default = "default_list_retry_delay_ms")]
    pub list_retry_delay_ms: u64,

    /// Interval between state polls while an uploaded file is processing.
    /// Default: `2`
    #[serde(default = "default_file_poll_interval")]
    pub file_poll_interval_secs: u64,

    /// Give up waiting for file processing after this many seconds.
    /// Default: `300`
    #[serde(default = "default_file_poll_timeout")]
    pub file_poll_timeout_secs: u64,
}

/// Thresholds and defaults for explicit cache creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Minimum token count the API accepts for an explicit cache.
    /// Default: `4096`
    #[serde(default = "default_min_tokens")]
    pub min_tokens_for_cache: u32,

    /// TTL applied to new caches when none is given.
    /// Default: `3600`
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: u64,

    /// Smallest TTL accepted when creating or updating a cache.
    /// Default: `60`
    #[serde(default = "default_min_ttl")]
    pub min_ttl_seconds: u64,

    /// Display name applied to new caches when none is given.
    /// Default: `my-new-cache`
    #[serde(default = "default_display_name")]
    pub default_display_name: String,

    /// Fraction of the input price saved for each token served from cache.
    /// Default: `0.75`
    #[serde(default = "default_cached_discount")]
    pub cached_token_discount: f64,

    /// How long a file/cache listing is reused before it is fetched again.
    /// Default: `60`
    #[serde(default = "default_listing_ttl")]
    pub listing_ttl_seconds: u64,
}

/// Local directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Where files fetched from URLs are stored before upload.
    /// Default: `./temp_downloads`
    #[serde(default = "default_download_dir")]
    pub download_dir: String,

    /// Where response exports are written.
    /// Default: `.`
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `warn`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`, `compact`).
    /// Default: `compact`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            upload_base_url: default_upload_base_url(),
            default_model: default_model(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            list_retries: default_list_retries(),
            list_retry_delay_ms: default_list_retry_delay_ms(),
            file_poll_interval_secs: default_file_poll_interval(),
            file_poll_timeout_secs: default_file_poll_timeout(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            min_tokens_for_cache: default_min_tokens(),
            default_ttl_seconds: default_ttl(),
            min_ttl_seconds: default_min_ttl(),
            default_display_name: default_display_name(),
            cached_token_discount: default_cached_discount(),
            listing_ttl_seconds: default_listing_ttl(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            export_dir: default_export_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults
fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_upload_base_url() -> String {
    "https://generativelanguage.googleapis.com/upload/v1beta".to_string()
}

fn default_model() -> String {
    "models/gemini-2.0-flash-001".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_list_retries() -> u32 {
    2
}

fn default_list_retry_delay_ms() -> u64 {
    700
}

fn default_file_poll_interval() -> u64 {
    2
}

fn default_file_poll_timeout() -> u64 {
    300
}

fn default_min_tokens() -> u32 {
    crate::cache::MIN_CACHE_TOKENS
}

fn default_ttl() -> u64 {
    3600
}

fn default_min_ttl() -> u64 {
    60
}

fn default_display_name() -> String {
    "my-new-cache".to_string()
}

fn default_cached_discount() -> f64 {
    0.75
}

fn default_listing_ttl() -> u64 {
    60
}

fn default_download_dir() -> String {
    "./temp_downloads".to_string()
}

fn default_export_dir() -> String {
    ".".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}
