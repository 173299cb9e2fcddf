// Query flow: send prompts with no cache, an explicit cache or an implicit prefix
// Author: kelexine (https://github.com/kelexine)

use crate::error::Result;
use crate::gemini::GeminiClient;
use crate::cache::normalize_model;
use crate::models::gemini::{
    CachedContent, Content, GenerateContentRequest, Part, SystemInstruction,
};
use crate::session::{QueryKind, QueryRecord, TokenUsage};
use crate::sources::{PreparedSource, DEFAULT_IMPLICIT_INSTRUCTION};
use tracing::{debug, info, warn};

/// Shared leading content for implicit-mode prompts.
///
/// Every prompt is sent as `prefix + prompt` with the same system instruction,
/// so consecutive requests share an identical prefix the provider can reuse.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplicitContext {
    pub system_instruction: String,
    pub prefix: Vec<Part>,
}

impl ImplicitContext {
    /// Context built from the session's current source, if any.
    pub fn from_source(source: Option<&PreparedSource>) -> Result<Self> {
        match source {
            Some(source) => Ok(Self {
                system_instruction: match source {
                    PreparedSource::Video { .. } => source.default_system_instruction(),
                    _ => DEFAULT_IMPLICIT_INSTRUCTION.to_string(),
                },
                prefix: source.parts()?,
            }),
            None => Ok(Self::bare()),
        }
    }

    /// No shared content, only the default instruction.
    pub fn bare() -> Self {
        Self {
            system_instruction: DEFAULT_IMPLICIT_INSTRUCTION.to_string(),
            prefix: Vec::new(),
        }
    }
}

/// How a prompt is sent.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryMode {
    /// Prompt only.
    NoCache,
    /// Reference a server-side cache by name.
    Explicit { cache_name: String },
    /// Repeat a shared prefix and let the provider reuse it.
    Implicit { context: ImplicitContext },
}

impl QueryMode {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryMode::NoCache => QueryKind::NoCache,
            QueryMode::Explicit { .. } => QueryKind::Explicit,
            QueryMode::Implicit { .. } => QueryKind::Implicit,
        }
    }

    /// Request body for `prompt` in this mode.
    ///
    /// A cache reference and a system instruction are never sent together;
    /// the instruction already lives in the cache.
    pub fn build_request(&self, prompt: &str) -> GenerateContentRequest {
        match self {
            QueryMode::NoCache => GenerateContentRequest {
                contents: vec![Content::user_text(prompt)],
                ..Default::default()
            },
            QueryMode::Explicit { cache_name } => GenerateContentRequest {
                contents: vec![Content::user_text(prompt)],
                system_instruction: None,
                cached_content: Some(cache_name.clone()),
            },
            QueryMode::Implicit { context } => {
                let mut parts = context.prefix.clone();
                parts.push(Part::text(prompt));
                GenerateContentRequest {
                    contents: vec![Content::user(parts)],
                    system_instruction: Some(SystemInstruction::text(
                        context.system_instruction.clone(),
                    )),
                    cached_content: None,
                }
            }
        }
    }
}

/// A prompt that could not be answered.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFailure {
    pub prompt: String,
    pub error: String,
}

/// Outcome of a batch, in prompt order.
#[derive(Debug, Clone, Default)]
pub struct QueryBatch {
    pub records: Vec<QueryRecord>,
    pub failures: Vec<QueryFailure>,
}

impl QueryBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.failures.is_empty()
    }
}

/// Model to query an explicit cache with. A cache only answers on the model
/// it was created for, so its own model wins; the warning says so when the
/// requested one differs.
pub fn model_for_cache(cache: &CachedContent, requested: &str) -> (String, Option<String>) {
    let requested = normalize_model(requested);
    match cache.model.as_deref().map(normalize_model) {
        Some(model) if model != requested => {
            let warning = format!(
                "{} was created for {}; querying with {} instead of {}",
                cache.name, model, model, requested
            );
            (model, Some(warning))
        }
        Some(model) => (model, None),
        None => (requested, None),
    }
}

/// One prompt per non-blank line, trimmed.
pub fn split_prompts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Send every prompt in order. A failed prompt is recorded and the batch
/// moves on to the next one.
pub async fn run_queries(
    client: &GeminiClient,
    model: &str,
    mode: &QueryMode,
    prompts: &[String],
) -> QueryBatch {
    let kind = mode.kind();
    let mut batch = QueryBatch::default();

    info!("Running {} prompt(s) in {} mode on {}", prompts.len(), kind, model);

    for (index, prompt) in prompts.iter().enumerate() {
        debug!("Prompt {}/{}: {}", index + 1, prompts.len(), prompt);
        let request = mode.build_request(prompt);

        match client.generate_content(model, &request).await {
            Ok(response) => {
                let usage = response.usage_metadata.as_ref().map(TokenUsage::from_metadata);
                if usage.is_none() {
                    warn!("No usage metadata returned for prompt {}", index + 1);
                }
                batch.records.push(QueryRecord {
                    prompt: prompt.clone(),
                    answer: response.text(),
                    mode: kind,
                    usage,
                });
            }
            Err(e) => {
                warn!("Prompt {} failed: {}", index + 1, e);
                batch.failures.push(QueryFailure {
                    prompt: prompt.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Batch finished: {} answered, {} failed",
        batch.records.len(),
        batch.failures.len()
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_prompts() {
        let prompts = split_prompts("  first  \n\n\tsecond\n   \nthird");
        assert_eq!(prompts, vec!["first", "second", "third"]);
        assert!(split_prompts(" \n \n").is_empty());
    }

    #[test]
    fn test_explicit_request_has_no_system_instruction() {
        let mode = QueryMode::Explicit {
            cache_name: "cachedContents/abc".to_string(),
        };
        let request = mode.build_request("hello");

        assert_eq!(request.cached_content.as_deref(), Some("cachedContents/abc"));
        assert!(request.system_instruction.is_none());
        assert_eq!(request.contents, vec![Content::user_text("hello")]);
    }

    #[test]
    fn test_implicit_prefix_comes_first() {
        let context = ImplicitContext {
            system_instruction: "be brief".to_string(),
            prefix: vec![Part::file("https://youtu.be/abc", None)],
        };
        let request = QueryMode::Implicit { context }.build_request("what happens?");

        let parts = &request.contents[0].parts;
        assert_eq!(parts[0], Part::file("https://youtu.be/abc", None));
        assert_eq!(parts[1], Part::text("what happens?"));
        assert!(request.cached_content.is_none());
        assert_eq!(request.system_instruction, Some(SystemInstruction::text("be brief")));
    }

    #[test]
    fn test_no_cache_request_is_prompt_only() {
        let request = QueryMode::NoCache.build_request("hi");
        assert!(request.cached_content.is_none());
        assert!(request.system_instruction.is_none());
        assert_eq!(request.contents.len(), 1);
    }

    #[test]
    fn test_context_from_video_source() {
        let source = PreparedSource::Video {
            url: "https://www.youtube.com/watch?v=abc&t=5s".to_string(),
        };
        let context = ImplicitContext::from_source(Some(&source)).unwrap();
        assert!(context
            .system_instruction
            .contains("https://www.youtube.com/watch?v=abc"));
        assert_eq!(context.prefix.len(), 1);

        let bare = ImplicitContext::from_source(None).unwrap();
        assert!(bare.prefix.is_empty());
        assert_eq!(bare.system_instruction, DEFAULT_IMPLICIT_INSTRUCTION);
    }

    fn cache_on(model: Option<&str>) -> CachedContent {
        CachedContent {
            name: "cachedContents/abc".to_string(),
            display_name: None,
            model: model.map(str::to_string),
            create_time: None,
            update_time: None,
            expire_time: None,
            usage_metadata: None,
        }
    }

    #[test]
    fn test_model_for_cache_prefers_cache_model() {
        let (model, warning) =
            model_for_cache(&cache_on(Some("models/gemini-2.5-flash")), "gemini-2.0-flash-001");
        assert_eq!(model, "models/gemini-2.5-flash");
        assert!(warning.unwrap().contains("models/gemini-2.5-flash"));

        let (model, warning) =
            model_for_cache(&cache_on(Some("models/gemini-2.0-flash-001")), "gemini-2.0-flash-001");
        assert_eq!(model, "models/gemini-2.0-flash-001");
        assert!(warning.is_none());

        let (model, warning) = model_for_cache(&cache_on(None), "gemini-2.0-flash-001");
        assert_eq!(model, "models/gemini-2.0-flash-001");
        assert!(warning.is_none());
    }
}
