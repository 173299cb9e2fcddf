//! Wire types for the Gemini REST API.
//!
//! Files, cached contents, token counting and content generation all share
//! the camelCase JSON shapes defined in `gemini`.

// Author: kelexine (https://github.com/kelexine)

pub mod gemini;

pub use gemini::{CachedContent, Content, GeminiFile, GenerateContentRequest, GenerateContentResponse, Part};
