// CLI module for gemcache
// Author: kelexine (https://github.com/kelexine)

mod args;
mod commands;
pub mod output;
mod shell;

pub use args::{Args, CacheAction, Command, FileAction, SourceArgs};
pub use commands::{qualify, run};
