//! API credential handling.
//!
//! The Gemini API key is held only in memory. It is zeroized when dropped and
//! never printed through `Debug`.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::error::{GemCacheError, Result};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Environment variable consulted when no key is given explicitly.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// A Gemini API key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting empty or whitespace-only values.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(GemCacheError::MissingApiKey);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Resolve the key to use. Preference order:
    /// 1. Explicit value (CLI flag or the interactive session)
    /// 2. `GEMINI_API_KEY` from the environment
    pub fn resolve(explicit: Option<&str>) -> Result<Self> {
        if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
            return Self::new(key);
        }

        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(key),
            _ => Err(GemCacheError::MissingApiKey),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_wins() {
        let key = ApiKey::resolve(Some("  AIzaExplicit  ")).unwrap();
        assert_eq!(key.expose(), "AIzaExplicit");
    }

    #[test]
    fn test_blank_key_rejected() {
        assert!(matches!(ApiKey::new("   "), Err(GemCacheError::MissingApiKey)));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = ApiKey::new("AIzaSecret").unwrap();
        let printed = format!("{:?}", key);
        assert!(!printed.contains("AIzaSecret"));
        assert!(printed.contains("REDACTED"));
    }
}
