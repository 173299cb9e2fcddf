// gemcache - Command-line control panel for Gemini files and context caches
// Author: kelexine (https://github.com/kelexine)

use anyhow::{Context, Result};
use clap::Parser;
use gemcache::cli::{self, Args};
use gemcache::config::AppConfig;
use gemcache::utils::logging;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(&path.to_string_lossy())
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AppConfig::load()?,
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting gemcache v{}", env!("CARGO_PKG_VERSION"));

    // Phase 3: Run the requested command or the interactive shell
    cli::run(args, config).await?;

    Ok(())
}
