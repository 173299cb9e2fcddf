//! Cache creation flow.
//!
//! Counts the tokens of a prepared source and either creates an explicit
//! cache or, when the content is below the explicit-cache minimum, returns
//! the implicit context that later queries should reuse instead.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use super::query::ImplicitContext;
use crate::cache::{estimate_tokens_from_text, format_ttl, normalize_model, CachePlan, CachePolicy, ModelProfile};
use crate::config::CacheSettings;
use crate::error::Result;
use crate::gemini::GeminiClient;
use crate::models::gemini::{CachedContent, Content, CreateCachedContentRequest, SystemInstruction};
use crate::sources::PreparedSource;
use tracing::{info, warn};

/// Operator choices for a new cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCacheOptions {
    pub model: String,
    pub display_name: String,
    pub ttl_seconds: u64,
    /// Overrides the source's default instruction.
    pub system_instruction: Option<String>,
}

impl CreateCacheOptions {
    pub fn with_defaults(model: impl Into<String>, settings: &CacheSettings) -> Self {
        Self {
            model: model.into(),
            display_name: settings.default_display_name.clone(),
            ttl_seconds: settings.default_ttl_seconds,
            system_instruction: None,
        }
    }
}

/// What the flow did.
#[derive(Debug, Clone, PartialEq)]
pub enum CreationOutcome {
    Created {
        cache: CachedContent,
        tokens: u32,
    },
    /// Below the threshold; no cache was created.
    Fallback {
        tokens: u32,
        required: u32,
        context: ImplicitContext,
    },
}

impl CreationOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, CreationOutcome::Fallback { .. })
    }
}

/// Outcome plus operator-facing warnings about the chosen model.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationReport {
    pub outcome: CreationOutcome,
    pub warnings: Vec<String>,
}

/// Count the tokens `source` would occupy in a cache.
///
/// Text falls back to a local estimate when the remote count fails.
pub async fn count_source_tokens(
    client: &GeminiClient,
    model: &str,
    source: &PreparedSource,
) -> Result<u32> {
    let contents = vec![Content::user(source.parts()?)];

    match (client.count_tokens(model, contents).await, source) {
        (Ok(tokens), _) => Ok(tokens),
        (Err(e), PreparedSource::Text(text)) => {
            let estimate = estimate_tokens_from_text(text);
            warn!("Token count failed ({}); using local estimate of {}", e, estimate);
            Ok(estimate)
        }
        (Err(e), _) => Err(e),
    }
}

/// Create an explicit cache for `source`, or fall back to implicit mode.
pub async fn create_cache(
    client: &GeminiClient,
    policy: &CachePolicy,
    source: &PreparedSource,
    options: &CreateCacheOptions,
) -> Result<CreationReport> {
    let model = normalize_model(&options.model);
    let profile = ModelProfile::for_model(&model);
    let required = policy.required_tokens(&model);
    let system_instruction = options
        .system_instruction
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| source.default_system_instruction());

    let fallback_context = || -> Result<ImplicitContext> {
        Ok(ImplicitContext {
            system_instruction: system_instruction.clone(),
            prefix: source.parts()?,
        })
    };

    // A bare video URL cannot back an explicit cache.
    if source.video_url().is_some() {
        info!("Video source: using implicit caching");
        return Ok(CreationReport {
            outcome: CreationOutcome::Fallback {
                tokens: 0,
                required,
                context: fallback_context()?,
            },
            warnings: profile.implicit_warning(&model).into_iter().collect(),
        });
    }

    let tokens = count_source_tokens(client, &model, source).await?;

    match CachePlan::decide(tokens, required) {
        CachePlan::Implicit { tokens, required } => {
            info!(
                "{} tokens is below the explicit cache minimum of {}; falling back to implicit caching",
                tokens, required
            );
            Ok(CreationReport {
                outcome: CreationOutcome::Fallback {
                    tokens,
                    required,
                    context: fallback_context()?,
                },
                warnings: profile.implicit_warning(&model).into_iter().collect(),
            })
        }
        CachePlan::Explicit { tokens } => {
            policy.validate_ttl(options.ttl_seconds)?;

            let display_name = Some(options.display_name.trim())
                .filter(|name| !name.is_empty())
                .map(str::to_string);
            let request = CreateCachedContentRequest {
                model: model.clone(),
                display_name,
                system_instruction: Some(SystemInstruction::text(system_instruction.clone())),
                contents: vec![Content::user(source.parts()?)],
                ttl: Some(format_ttl(options.ttl_seconds)),
            };

            let cache = client.create_cache(&request).await?;
            info!("Created {} ({} tokens, ttl {}s)", cache.name, tokens, options.ttl_seconds);

            Ok(CreationReport {
                outcome: CreationOutcome::Created { cache, tokens },
                warnings: profile.explicit_warning(&model).into_iter().collect(),
            })
        }
    }
}
