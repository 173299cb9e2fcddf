//! CLI argument definitions using clap

// Author: kelexine (https://github.com/kelexine)

use crate::config::API_KEY_ENV;
use crate::error::{GemCacheError, Result};
use crate::sources::ContentSource;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// gemcache - control panel for Gemini files and context caches
#[derive(Parser, Debug)]
#[command(name = "gemcache", version, about, long_about = None)]
pub struct Args {
    /// Gemini API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Model id, e.g. models/gemini-2.0-flash-001
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Config file (default: ~/.gemcache/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Without a subcommand the interactive shell starts
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Upload a local file to the Files API
    Upload {
        path: PathBuf,
        #[arg(long)]
        display_name: Option<String>,
    },

    /// Count the tokens a source would occupy
    Count {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Create an explicit cache, falling back to implicit caching for small content
    CreateCache {
        #[command(flatten)]
        source: SourceArgs,
        /// Cache display name
        #[arg(long)]
        display_name: Option<String>,
        /// Time-to-live in seconds
        #[arg(long)]
        ttl: Option<u64>,
        /// Override the default system instruction
        #[arg(long)]
        system_instruction: Option<String>,
        /// Fail instead of falling back when content is below the cache minimum
        #[arg(long)]
        require_explicit: bool,
    },

    /// Run one or more prompts
    Query {
        /// Explicit cache to query (cachedContents/...)
        #[arg(long, conflicts_with = "implicit")]
        cache: Option<String>,
        /// Send the source as a shared prefix and rely on implicit caching
        #[arg(long)]
        implicit: bool,
        #[command(flatten)]
        source: SourceArgs,
        /// Prompt text (repeatable)
        #[arg(long = "prompt", short = 'p')]
        prompts: Vec<String>,
        /// File with one prompt per line
        #[arg(long)]
        prompts_file: Option<PathBuf>,
        /// Write the combined report to this file
        #[arg(long)]
        export: Option<PathBuf>,
        /// Write one file per response into this directory
        #[arg(long)]
        export_each: Option<PathBuf>,
    },

    /// Manage cached contents
    Caches {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage uploaded files
    Files {
        #[command(subcommand)]
        action: FileAction,
    },

    /// Interactive step-by-step session
    Shell,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// List caches
    List {
        /// Case-insensitive display name filter
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show one cache
    Get { name: String },
    /// Set a new TTL, counted from now
    Ttl { name: String, seconds: u64 },
    /// Set an absolute expiry time (RFC 3339)
    Expire { name: String, time: String },
    /// Delete caches
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum FileAction {
    /// List files
    List {
        /// Case-insensitive display name filter
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show one file
    Get { name: String },
    /// Delete files
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

/// Where content comes from. At most one may be given.
#[derive(ClapArgs, Debug, Clone, Default)]
#[group(multiple = false)]
pub struct SourceArgs {
    /// Local file to upload
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// URL to download, or a YouTube link
    #[arg(long)]
    pub url: Option<String>,
    /// Inline text
    #[arg(long)]
    pub text: Option<String>,
    /// Read inline text from a file
    #[arg(long)]
    pub text_file: Option<PathBuf>,
}

impl SourceArgs {
    pub fn to_source(&self) -> Result<Option<ContentSource>> {
        if let Some(path) = &self.file {
            return Ok(Some(ContentSource::File(path.clone())));
        }
        if let Some(url) = &self.url {
            return Ok(Some(ContentSource::Url(url.clone())));
        }
        if let Some(text) = &self.text {
            return Ok(Some(ContentSource::Text(text.clone())));
        }
        if let Some(path) = &self.text_file {
            return Ok(Some(ContentSource::Text(std::fs::read_to_string(path)?)));
        }
        Ok(None)
    }

    pub fn require_source(&self) -> Result<ContentSource> {
        self.to_source()?.ok_or_else(|| {
            GemCacheError::InvalidInput(
                "A source is required: --file, --url, --text or --text-file".to_string(),
            )
        })
    }
}
