// gemcache - Command-line control panel for Gemini files and context caches
// Author: kelexine (https://github.com/kelexine)

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod flows;
pub mod gemini;
pub mod models;
pub mod session;
pub mod sources;
pub mod utils;
