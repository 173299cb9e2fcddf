//! Structured logging and credential-scrubbing utilities.
//!
//! This module configures the `tracing` ecosystem for the application,
//! supporting multiple output formats and providing a helper that keeps
//! Gemini API keys out of log lines and error bodies.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Google API keys: `AIza` followed by 35 URL-safe characters.
static API_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"AIza[0-9A-Za-z_\-]{10,}").expect("valid regex"));

/// Initializes the global tracing subscriber for the application.
///
/// Supports three output formats:
/// - `json`: Structured JSON logs.
/// - `pretty`: Human-readable, multi-line output.
/// - `compact` (default): One line per event, suited to an interactive terminal.
///
/// Logs go to stderr so they never interleave with exported reports on stdout.
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

/// Replaces every Google API key found in `input` with `[REDACTED_API_KEY]`.
///
/// Vendor error bodies sometimes echo the request URL, key included.
pub fn sanitize(input: &str) -> String {
    API_KEY_PATTERN
        .replace_all(input, "[REDACTED_API_KEY]")
        .into_owned()
}
