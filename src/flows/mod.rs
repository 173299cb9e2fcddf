//! Operator workflows.
//!
//! - `create`: count tokens, then create an explicit cache or fall back
//! - `query`: run prompt batches in no-cache, explicit or implicit mode
//! - `manage`: cached listings, filtering and deletion of files and caches
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod create;
pub mod manage;
pub mod query;

pub use create::{create_cache, CreateCacheOptions, CreationOutcome, CreationReport};
pub use manage::{filter_by_display_name, list_caches_or_empty, list_files_or_empty, Listing};
pub use query::{
    model_for_cache, run_queries, split_prompts, ImplicitContext, QueryBatch, QueryFailure, QueryMode,
};
