//! Token accounting for query responses.
//!
//! Every generation call returns a usage breakdown. [`TokenUsage`] normalizes
//! it so that `total == input + output` and `cached <= input` hold for every
//! recorded query, and [`UsageLedger`] sums those records for the session.

// Author: kelexine (https://github.com/kelexine)

use crate::models::gemini::UsageMetadata;
use serde::Serialize;
use std::fmt::Write as _;
use tracing::{debug, warn};

/// Normalized usage of a single query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    /// Prompt tokens, cached ones included.
    pub input_tokens: u64,
    /// Portion of `input_tokens` served from a cache.
    pub cached_tokens: u64,
    /// Response tokens, thinking included.
    pub output_tokens: u64,
    /// Always `input_tokens + output_tokens`.
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Build a usage record, clamping `cached` to `input`.
    pub fn new(input: u64, cached: u64, output: u64) -> Self {
        if cached > input {
            warn!(
                "Cached token count {} exceeds input token count {}; clamping",
                cached, input
            );
        }
        Self {
            input_tokens: input,
            cached_tokens: cached.min(input),
            output_tokens: output,
            total_tokens: input + output,
        }
    }

    pub fn from_metadata(meta: &UsageMetadata) -> Self {
        let count = |v: Option<u32>| u64::from(v.unwrap_or(0));

        let input = count(meta.prompt_token_count) + count(meta.tool_use_prompt_token_count);
        let output = count(meta.candidates_token_count) + count(meta.thoughts_token_count);
        let usage = Self::new(input, count(meta.cached_content_token_count), output);

        if let Some(reported) = meta.total_token_count {
            if u64::from(reported) != usage.total_tokens {
                debug!(
                    "API total {} differs from input+output {}",
                    reported, usage.total_tokens
                );
            }
        }

        usage
    }

    /// Input tokens billed at the full rate.
    pub fn uncached_input(&self) -> u64 {
        self.input_tokens - self.cached_tokens
    }
}

/// Estimated effect of caching across the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSavings {
    pub cached_tokens: u64,
    /// Cached tokens weighted by the discount, in full-price input-token equivalents.
    pub saved_token_equivalents: f64,
    /// Share of input tokens served from cache, 0..=100.
    pub cached_share_pct: f64,
}

/// Running totals for the session.
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    totals: TokenUsage,
    queries: usize,
    unmetered: usize,
    cache_hits: usize,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, usage: &TokenUsage) {
        self.totals.input_tokens += usage.input_tokens;
        self.totals.cached_tokens += usage.cached_tokens;
        self.totals.output_tokens += usage.output_tokens;
        self.totals.total_tokens += usage.total_tokens;
        self.queries += 1;
        if usage.cached_tokens > 0 {
            self.cache_hits += 1;
        }
    }

    /// Count a query whose response carried no usage metadata.
    pub fn record_unmetered(&mut self) {
        self.queries += 1;
        self.unmetered += 1;
    }

    /// Count one answered query, with or without usage metadata.
    pub fn record_optional(&mut self, usage: Option<&TokenUsage>) {
        match usage {
            Some(usage) => self.record(usage),
            None => self.record_unmetered(),
        }
    }

    pub fn totals(&self) -> TokenUsage {
        self.totals
    }

    pub fn queries(&self) -> usize {
        self.queries
    }

    pub fn unmetered(&self) -> usize {
        self.unmetered
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits
    }

    pub fn estimated_savings(&self, discount: f64) -> CacheSavings {
        let cached = self.totals.cached_tokens;
        let share = if self.totals.input_tokens == 0 {
            0.0
        } else {
            cached as f64 / self.totals.input_tokens as f64 * 100.0
        };

        CacheSavings {
            cached_tokens: cached,
            saved_token_equivalents: cached as f64 * discount.clamp(0.0, 1.0),
            cached_share_pct: share,
        }
    }

    /// Plain-text usage summary, as appended to exported reports.
    pub fn summary(&self, discount: f64) -> String {
        let totals = self.totals;
        let savings = self.estimated_savings(discount);

        let mut out = String::new();
        let _ = writeln!(out, "## Usage summary");
        if self.unmetered > 0 {
            let _ = writeln!(
                out,
                "Queries: {} ({} without usage data)",
                self.queries, self.unmetered
            );
        } else {
            let _ = writeln!(out, "Queries: {}", self.queries);
        }
        let _ = writeln!(out, "Input tokens: {}", totals.input_tokens);
        let _ = writeln!(
            out,
            "Cached tokens: {} ({:.1}% of input, {} queries hit a cache)",
            totals.cached_tokens, savings.cached_share_pct, self.cache_hits
        );
        let _ = writeln!(out, "Output tokens: {}", totals.output_tokens);
        let _ = writeln!(out, "Total tokens: {}", totals.total_tokens);
        let _ = write!(
            out,
            "Estimated savings: ~{:.0} input-token equivalents at a {:.0}% cached discount",
            savings.saved_token_equivalents,
            discount.clamp(0.0, 1.0) * 100.0
        );
        out
    }
}
