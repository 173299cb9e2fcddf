//! Content sources for caches and implicit prompts.
//!
//! An operator can point gemcache at a local file, a block of text or a URL.
//! Local files and downloadable URLs end up in the Files API; YouTube links
//! are never downloaded and are referenced by URL instead.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::WorkspaceConfig;
use crate::error::{GemCacheError, Result};
use crate::gemini::GeminiClient;
use crate::models::gemini::{GeminiFile, Part};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::info;

/// Instruction used for uploaded files and pasted text.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an expert content analyzer. When answering \
questions about the provided file, be precise, thorough, and helpful.";

/// Instruction used for implicit-mode queries without a video source.
pub const DEFAULT_IMPLICIT_INSTRUCTION: &str = "You are a helpful content analyzer.";

static YOUTUBE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?://)?([a-z0-9-]+\.)*(youtube\.com/|youtu\.be/)").expect("valid regex")
});

/// Where content comes from, as given by the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSource {
    File(PathBuf),
    Text(String),
    Url(String),
}

/// A source that is ready to be referenced in a request.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedSource {
    /// Uploaded to the Files API.
    File(GeminiFile),
    /// Sent inline.
    Text(String),
    /// A YouTube link, referenced by URL only.
    Video { url: String },
}

impl PreparedSource {
    /// Parts that carry this source in a request.
    pub fn parts(&self) -> Result<Vec<Part>> {
        match self {
            PreparedSource::File(file) => {
                let uri = file.uri.clone().ok_or_else(|| {
                    GemCacheError::InvalidInput(format!("{} has no URI yet", file.name))
                })?;
                Ok(vec![Part::file(uri, file.mime_type.clone())])
            }
            PreparedSource::Text(text) => Ok(vec![Part::text(text.clone())]),
            PreparedSource::Video { url } => Ok(vec![Part::file(url.clone(), None)]),
        }
    }

    /// Default system instruction for this kind of source.
    pub fn default_system_instruction(&self) -> String {
        match self {
            PreparedSource::Video { url } => {
                build_video_system_instruction(&youtube_base_url(url))
            }
            _ => DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            PreparedSource::File(file) => format!("{} ({})", file.label(), file.name),
            PreparedSource::Text(text) => format!("text ({} chars)", text.chars().count()),
            PreparedSource::Video { url } => format!("video {}", url),
        }
    }

    pub fn video_url(&self) -> Option<&str> {
        match self {
            PreparedSource::Video { url } => Some(url),
            _ => None,
        }
    }
}

pub fn is_youtube_url(url: &str) -> bool {
    YOUTUBE_URL.is_match(url.trim())
}

/// Drop extra query parameters (`&list=...`, `&t=...`) from a YouTube link.
pub fn youtube_base_url(url: &str) -> String {
    url.split('&').next().unwrap_or(url).to_string()
}

/// Last path segment of a URL, query string removed.
pub fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let without_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);

    without_scheme
        .split_once('/')
        .and_then(|(_, path)| path.trim_end_matches('/').rsplit('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "downloaded_file".to_string())
}

/// Instruction asking the model to cite clickable timestamps into the video.
pub fn build_video_system_instruction(base_url: &str) -> String {
    format!(
        "You are an expert video analyzer.\n\
         The user has provided a video from the URL: {base_url}\n\n\
         When you identify a key moment in the video, you MUST embed a clickable timestamp in your response.\n\
         Format each timestamp as a Markdown link like: `[MM:SS](URL&t=XXs)` where `XX` is total seconds from start.\n\n\
         Example: `[01:23]({base_url}&t=83s)` and `[12:05]({base_url}&t=725s)`.\n\
         Answer the user's question while providing precise, clickable timestamps as evidence."
    )
}

/// Turn an operator-supplied source into something a request can reference.
///
/// Files are uploaded, plain URLs are downloaded into the workspace and then
/// uploaded, text is kept inline and YouTube links are kept as URLs.
pub async fn prepare(
    source: &ContentSource,
    client: &GeminiClient,
    workspace: &WorkspaceConfig,
    display_name: Option<&str>,
) -> Result<PreparedSource> {
    match source {
        ContentSource::Text(text) => {
            if text.trim().is_empty() {
                return Err(GemCacheError::InvalidInput("Text content is empty".to_string()));
            }
            Ok(PreparedSource::Text(text.clone()))
        }
        ContentSource::File(path) => {
            let file = client.upload_file(path, display_name).await?;
            Ok(PreparedSource::File(file))
        }
        ContentSource::Url(url) if is_youtube_url(url) => {
            info!("YouTube URL detected, referencing it without upload");
            Ok(PreparedSource::Video { url: url.trim().to_string() })
        }
        ContentSource::Url(url) => {
            let dest = Path::new(&workspace.download_dir).join(file_name_from_url(url));
            let path = client.download(url, &dest).await?;
            let file = client.upload_file(&path, display_name).await?;
            Ok(PreparedSource::File(file))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_detection() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=abc"));
        assert!(is_youtube_url("https://youtu.be/abc"));
        assert!(is_youtube_url("youtube.com/watch?v=abc"));
        assert!(is_youtube_url("https://m.youtube.com/watch?v=abc"));
        assert!(!is_youtube_url("https://example.com/video.mp4"));
        assert!(!is_youtube_url("https://example.com/?ref=youtube.com/"));
    }

    #[test]
    fn test_youtube_base_url() {
        assert_eq!(
            youtube_base_url("https://www.youtube.com/watch?v=abc&t=42s&list=xyz"),
            "https://www.youtube.com/watch?v=abc"
        );
        assert_eq!(youtube_base_url("https://youtu.be/abc"), "https://youtu.be/abc");
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(file_name_from_url("https://example.com/a/b/report.pdf?x=1"), "report.pdf");
        assert_eq!(file_name_from_url("https://example.com/"), "downloaded_file");
        assert_eq!(file_name_from_url("https://example.com"), "downloaded_file");
    }

    #[test]
    fn test_video_instruction_contains_links() {
        let base = "https://www.youtube.com/watch?v=abc";
        let instruction = build_video_system_instruction(base);
        assert!(instruction.contains(&format!("[01:23]({}&t=83s)", base)));
        assert!(instruction.contains(&format!("[12:05]({}&t=725s)", base)));
        assert!(instruction.contains("video analyzer"));
    }

    #[test]
    fn test_prepared_parts() {
        let video = PreparedSource::Video {
            url: "https://youtu.be/abc".to_string(),
        };
        let parts = video.parts().unwrap();
        assert_eq!(parts, vec![Part::file("https://youtu.be/abc", None)]);
        assert!(video.default_system_instruction().contains("https://youtu.be/abc"));

        let text = PreparedSource::Text("hello".to_string());
        assert_eq!(text.parts().unwrap(), vec![Part::text("hello")]);
        assert_eq!(text.default_system_instruction(), DEFAULT_SYSTEM_INSTRUCTION);
    }
}
