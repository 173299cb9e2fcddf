//! Explicit-cache eligibility.
//!
//! The Gemini API refuses to create an explicit cache for content below a
//! minimum token count. Content under the threshold is routed to the
//! implicit path instead, where the provider may reuse a shared prompt
//! prefix on its own.

// Author: kelexine (https://github.com/kelexine)

use crate::config::CacheSettings;
use crate::error::{GemCacheError, Result};

/// Smallest token count accepted for an explicit cache.
pub const MIN_CACHE_TOKENS: u32 = 4096;

/// Minimum token count for an explicit cache on `model_id`.
///
/// Versioned `-001` models and the 2.5 family share the same floor today.
pub fn min_cache_token_requirement(_model_id: &str) -> u32 {
    MIN_CACHE_TOKENS
}

/// Rough token estimate (~4 characters per token) over whitespace-collapsed text.
pub fn estimate_tokens_from_text(text: &str) -> u32 {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return 0;
    }
    ((collapsed.chars().count() / 4) as u32).max(1)
}

/// Which caching strategy a piece of content should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePlan {
    /// Large enough: create an explicit cache.
    Explicit { tokens: u32 },
    /// Too small: skip explicit creation and rely on implicit prefix reuse.
    Implicit { tokens: u32, required: u32 },
}

impl CachePlan {
    pub fn decide(tokens: u32, required: u32) -> Self {
        if tokens < required {
            CachePlan::Implicit { tokens, required }
        } else {
            CachePlan::Explicit { tokens }
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, CachePlan::Explicit { .. })
    }

    pub fn tokens(&self) -> u32 {
        match self {
            CachePlan::Explicit { tokens } | CachePlan::Implicit { tokens, .. } => *tokens,
        }
    }
}

/// Thresholds applied when creating or updating caches.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub min_tokens: u32,
    pub min_ttl_seconds: u64,
}

impl CachePolicy {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            min_tokens: settings.min_tokens_for_cache,
            min_ttl_seconds: settings.min_ttl_seconds,
        }
    }

    /// Threshold for `model_id`: the larger of the configured and the model floor.
    pub fn required_tokens(&self, model_id: &str) -> u32 {
        self.min_tokens.max(min_cache_token_requirement(model_id))
    }

    pub fn plan(&self, model_id: &str, tokens: u32) -> CachePlan {
        CachePlan::decide(tokens, self.required_tokens(model_id))
    }

    /// Reject TTLs below the configured minimum.
    pub fn validate_ttl(&self, ttl_seconds: u64) -> Result<()> {
        if ttl_seconds < self.min_ttl_seconds {
            return Err(GemCacheError::InvalidInput(format!(
                "TTL must be at least {} seconds (got {})",
                self.min_ttl_seconds, ttl_seconds
            )));
        }
        Ok(())
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}

/// TTL in the API's duration format, e.g. `"300s"`.
pub fn format_ttl(ttl_seconds: u64) -> String {
    format!("{}s", ttl_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens_from_text(""), 0);
        assert_eq!(estimate_tokens_from_text("   \n\t "), 0);
        assert_eq!(estimate_tokens_from_text("hi"), 1);
        assert_eq!(estimate_tokens_from_text("abcd efgh"), 2);
        // Whitespace runs collapse to a single space
        assert_eq!(
            estimate_tokens_from_text("abcd     \n\n   efgh"),
            estimate_tokens_from_text("abcd efgh")
        );
    }

    #[test]
    fn test_min_requirement() {
        assert_eq!(min_cache_token_requirement("models/gemini-2.0-flash-001"), 4096);
        assert_eq!(min_cache_token_requirement("models/gemini-2.5-pro"), 4096);
    }

    #[test]
    fn test_below_threshold_routes_to_implicit() {
        let policy = CachePolicy::default();
        assert_eq!(
            policy.plan("models/gemini-2.0-flash-001", 4095),
            CachePlan::Implicit {
                tokens: 4095,
                required: 4096
            }
        );
        assert!(policy.plan("models/gemini-2.0-flash-001", 4096).is_explicit());
        assert!(policy.plan("models/gemini-2.0-flash-001", 100_000).is_explicit());
    }

    #[test]
    fn test_configured_threshold_cannot_go_below_floor() {
        let policy = CachePolicy {
            min_tokens: 1024,
            min_ttl_seconds: 60,
        };
        assert_eq!(policy.required_tokens("models/gemini-2.5-flash"), 4096);
    }

    #[test]
    fn test_ttl_validation() {
        let policy = CachePolicy::default();
        assert!(policy.validate_ttl(60).is_ok());
        assert!(policy.validate_ttl(3600).is_ok());
        assert!(matches!(
            policy.validate_ttl(59),
            Err(GemCacheError::InvalidInput(_))
        ));
        assert_eq!(format_ttl(300), "300s");
    }
}
