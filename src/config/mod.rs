// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod credentials;
mod models;

pub use credentials::{ApiKey, API_KEY_ENV};
pub use models::*;

use crate::error::{GemCacheError, Result};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. CLI arguments (highest, applied by the caller)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest)
    pub fn load() -> Result<Self> {
        Self::build(&Self::default_config_path(), false)
    }

    /// Same as [`AppConfig::load`] with an explicit config file path,
    /// which must exist.
    pub fn load_from(path: &str) -> Result<Self> {
        if !Path::new(path).is_file() {
            return Err(GemCacheError::Config(format!(
                "config file {} does not exist",
                path
            )));
        }
        Self::build(path, true)
    }

    fn build(path: &str, required: bool) -> Result<Self> {
        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            // The default location is optional; an explicit path is not
            .add_source(File::with_name(path).required(required))
            // Override with environment variables (e.g. GEMCACHE_CACHE__MIN_TOKENS_FOR_CACHE)
            .add_source(
                Environment::with_prefix("GEMCACHE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| GemCacheError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| GemCacheError::Config(e.to_string()))
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gemcache")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}
