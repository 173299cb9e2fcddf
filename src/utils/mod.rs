//! Utility functions and helpers for gemcache.
//!
//! This module provides cross-cutting concerns like structured logging,
//! key redaction, retry logic with backoff and display formatting.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and API key redaction.
//! - `retry`: Retry mechanisms that respect upstream API hints.
//! - `format`: Timestamp, size and text formatting for terminal output.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod format;
pub mod logging;
pub mod retry;
