// Error types for gemcache
// Author: kelexine (https://github.com/kelexine)

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GemCacheError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GEMINI_API_KEY is not set. Pass --api-key or export GEMINI_API_KEY")]
    MissingApiKey,

    #[error("Gemini API error: {0}")]
    GeminiApi(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    TooManyRequests(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Content has {tokens} tokens, below the {required} required for an explicit cache")]
    BelowCacheThreshold { tokens: u32, required: u32 },

    #[error("File processing failed: {0}")]
    FileProcessing(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Prompt error: {0}")]
    Interaction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GemCacheError {
    /// Map a non-success HTTP response from the Gemini API to an error variant.
    ///
    /// The vendor's `error.message` is preferred over the raw body when present.
    pub fn from_status(status: u16, body: &str, operation: &str) -> Self {
        let message = extract_error_message(body).unwrap_or_else(|| body.to_string());
        match status {
            404 => GemCacheError::NotFound(format!("{}: {}", operation, message)),
            429 => GemCacheError::TooManyRequests(format!("{}: {}", operation, message)),
            503 | 504 => {
                GemCacheError::ServiceUnavailable(format!("{}: {}", operation, message))
            }
            _ => GemCacheError::GeminiApi(format!("{} (HTTP {}): {}", operation, status, message)),
        }
    }

    /// Whether retrying the same call later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GemCacheError::TooManyRequests(_) | GemCacheError::ServiceUnavailable(_) => true,
            GemCacheError::GeminiApi(msg) => msg.contains("(HTTP 5"),
            GemCacheError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<dialoguer::Error> for GemCacheError {
    fn from(e: dialoguer::Error) -> Self {
        GemCacheError::Interaction(e.to_string())
    }
}

/// Extract error message from API response JSON
pub fn extract_error_message(response_text: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct ErrorResponse {
        error: Option<ErrorDetail>,
    }

    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
        status: Option<String>,
    }

    if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(response_text) {
        if let Some(error) = error_resp.error {
            return error.message.or(error.status);
        }
    }
    None
}

pub type Result<T> = std::result::Result<T, GemCacheError>;
