// In-memory operator session: credential, model, query history and usage
// Author: kelexine (https://github.com/kelexine)

pub mod report;
mod usage;

pub use usage::{CacheSavings, TokenUsage, UsageLedger};

use crate::config::{ApiKey, AppConfig, GeminiConfig};
use crate::error::{GemCacheError, Result};
use crate::flows::manage::Listing;
use crate::flows::query::{ImplicitContext, QueryBatch};
use crate::gemini::GeminiClient;
use crate::models::gemini::{CachedContent, GeminiFile};
use crate::sources::PreparedSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Which caching mode produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    #[serde(rename = "none")]
    NoCache,
    Explicit,
    Implicit,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::NoCache => "none",
            QueryKind::Explicit => "explicit",
            QueryKind::Implicit => "implicit",
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One answered prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    pub prompt: String,
    /// `None` when the model returned no text.
    pub answer: Option<String>,
    pub mode: QueryKind,
    /// `None` when the response carried no usage metadata.
    pub usage: Option<TokenUsage>,
}

impl QueryRecord {
    pub fn answer_text(&self) -> String {
        self.answer
            .clone()
            .unwrap_or_else(|| report::NO_TEXT.to_string())
    }
}

/// State of one interactive run. Nothing here is written to disk except
/// through an explicit report export.
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    client: Option<GeminiClient>,
    pub model: String,
    /// Last prepared content source, reused as the implicit prefix.
    pub source: Option<PreparedSource>,
    /// Cache created or picked most recently; default for explicit queries.
    pub active_cache: Option<String>,
    /// Context handed back by a creation fallback.
    pub implicit_context: Option<ImplicitContext>,
    records: Vec<QueryRecord>,
    ledger: UsageLedger,
    pub files: Listing<GeminiFile>,
    pub caches: Listing<CachedContent>,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        let listing_ttl = Duration::from_secs(config.cache.listing_ttl_seconds);
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            client: None,
            model: config.gemini.default_model.clone(),
            source: None,
            active_cache: None,
            implicit_context: None,
            records: Vec::new(),
            ledger: UsageLedger::new(),
            files: Listing::new(listing_ttl),
            caches: Listing::new(listing_ttl),
        }
    }

    /// Build the API client for `key`, replacing any previous one.
    pub fn connect(&mut self, config: &GeminiConfig, key: ApiKey) -> Result<()> {
        self.client = Some(GeminiClient::new(config, key)?);
        self.invalidate_listings();
        Ok(())
    }

    pub fn client(&self) -> Result<&GeminiClient> {
        self.client.as_ref().ok_or(GemCacheError::MissingApiKey)
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Drop the client and with it the in-memory key.
    pub fn disconnect(&mut self) {
        self.client = None;
        self.active_cache = None;
        self.invalidate_listings();
        info!("API key cleared for session {}", self.id);
    }

    /// YouTube URL of the current source, if it is a video.
    pub fn video_source(&self) -> Option<&str> {
        self.source.as_ref().and_then(PreparedSource::video_url)
    }

    pub fn invalidate_listings(&mut self) {
        self.files.invalidate();
        self.caches.invalidate();
    }

    /// Append a batch's answers and fold their usage into the ledger.
    pub fn record_batch(&mut self, batch: &QueryBatch) {
        for record in &batch.records {
            self.ledger.record_optional(record.usage.as_ref());
            self.records.push(record.clone());
        }
    }

    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Forget answers and totals, keeping credential, model and source.
    pub fn reset_history(&mut self) {
        self.records.clear();
        self.ledger = UsageLedger::new();
    }

    pub fn render_report(&self, discount: f64) -> String {
        report::render(&self.records, &self.ledger, discount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::query::QueryFailure;

    fn batch() -> QueryBatch {
        QueryBatch {
            records: vec![
                QueryRecord {
                    prompt: "one".to_string(),
                    answer: Some("first".to_string()),
                    mode: QueryKind::Explicit,
                    usage: Some(TokenUsage::new(5000, 4096, 20)),
                },
                QueryRecord {
                    prompt: "two".to_string(),
                    answer: None,
                    mode: QueryKind::Explicit,
                    usage: None,
                },
            ],
            failures: vec![QueryFailure {
                prompt: "three".to_string(),
                error: "boom".to_string(),
            }],
        }
    }

    #[test]
    fn test_record_batch_accumulates() {
        let mut session = Session::new(&AppConfig::default());
        session.record_batch(&batch());
        session.record_batch(&batch());

        assert_eq!(session.records().len(), 4);
        assert_eq!(session.ledger().queries(), 4);
        assert_eq!(session.ledger().unmetered(), 2);
        assert_eq!(session.ledger().totals().cached_tokens, 8192);

        session.reset_history();
        assert!(session.records().is_empty());
        assert_eq!(session.ledger().queries(), 0);
    }

    #[test]
    fn test_connect_and_disconnect() {
        let config = AppConfig::default();
        let mut session = Session::new(&config);
        assert!(matches!(session.client(), Err(GemCacheError::MissingApiKey)));

        session
            .connect(&config.gemini, ApiKey::new("AIzaTestKey123456").unwrap())
            .unwrap();
        assert!(session.is_connected());

        session.active_cache = Some("cachedContents/abc".to_string());
        session.disconnect();
        assert!(!session.is_connected());
        assert!(session.active_cache.is_none());
    }

    #[test]
    fn test_video_source() {
        let mut session = Session::new(&AppConfig::default());
        assert_eq!(session.video_source(), None);

        session.source = Some(PreparedSource::Video {
            url: "https://youtu.be/abc".to_string(),
        });
        assert_eq!(session.video_source(), Some("https://youtu.be/abc"));
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&QueryKind::NoCache).unwrap(), "\"none\"");
        assert_eq!(serde_json::to_string(&QueryKind::Implicit).unwrap(), "\"implicit\"");
    }
}
