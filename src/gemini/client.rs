// Gemini REST client for files, cached contents and generation
// Author: kelexine (https://github.com/kelexine)

use crate::cache::{format_ttl, normalize_model};
use crate::config::{ApiKey, GeminiConfig};
use crate::error::{GemCacheError, Result};
use crate::models::gemini::{
    CachedContent, Content, CountTokensRequest, CountTokensResponse, CreateCachedContentRequest,
    FileState, GenerateContentRequest, GenerateContentResponse, GeminiFile,
    ListCachedContentsResponse, ListFilesResponse, UpdateCachedContentRequest, UploadFileResponse,
};
use crate::utils::logging::sanitize;
use crate::utils::retry::{with_retry, RetryPolicy};
use futures::StreamExt;
use reqwest::multipart::{Form, Part as FormPart};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";
const PAGE_SIZE: u32 = 100;

/// Client for the Gemini REST API.
///
/// One method per endpoint the control panel needs:
/// - Files API (upload, get, list, delete)
/// - Cached contents (create, get, list, update, delete)
/// - Token counting and content generation
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    config: GeminiConfig,
    api_key: ApiKey,
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub fn new(config: &GeminiConfig, api_key: ApiKey) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .use_rustls_tls()
            .build()
            .map_err(|e| GemCacheError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        debug!("Created HTTP client for {}", config.api_base_url);

        Ok(Self {
            http_client,
            config: config.clone(),
            api_key,
        })
    }

    /// Get the API base_url
    pub fn base_url(&self) -> &str {
        self.config.api_base_url.trim_end_matches('/')
    }

    fn upload_url(&self) -> String {
        format!("{}/files", self.config.upload_base_url.trim_end_matches('/'))
    }

    fn resource_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url(), name.trim_start_matches('/'))
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{}", self.base_url(), normalize_model(model), method)
    }

    fn default_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.config.max_retries)
    }

    fn list_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.config.list_retries,
            Duration::from_millis(self.config.list_retry_delay_ms),
        )
    }

    /// Send a JSON request through the retry loop and decode the body.
    async fn request_with_retry<B, T>(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        body: Option<&B>,
        policy: RetryPolicy,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let method = &method;
        with_retry(operation, policy, || async move {
            let mut request = self
                .http_client
                .request(method.clone(), url)
                .header(API_KEY_HEADER, self.api_key.expose());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| (500, format!("HTTP error: {}", e)))?;

            let status = response.status();
            let response_text = response.text().await.unwrap_or_default();

            if !status.is_success() {
                return Err((status.as_u16(), response_text));
            }

            serde_json::from_str(&response_text)
                .map_err(|e| (500, format!("Invalid response: {}", e)))
        })
        .await
        .map_err(|(status, body)| {
            let body = sanitize(&body);
            error!("{} failed: HTTP {} - {}", operation, status, body);
            GemCacheError::from_status(status, &body, operation)
        })
    }

    /// Send a request once, returning the raw response on success.
    async fn request_once<B>(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self
            .http_client
            .request(method, url)
            .header(API_KEY_HEADER, self.api_key.expose());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GemCacheError::GeminiApi(format!("{}: HTTP error: {}", operation, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = sanitize(&response.text().await.unwrap_or_default());
            error!("{} failed: HTTP {} - {}", operation, status, error_text);
            return Err(GemCacheError::from_status(status.as_u16(), &error_text, operation));
        }

        Ok(response)
    }

    // ---------------------------------------------------------------------
    // Tokens and generation
    // ---------------------------------------------------------------------

    /// Count tokens for `contents` as `model` would see them.
    pub async fn count_tokens(&self, model: &str, contents: Vec<Content>) -> Result<u32> {
        let url = self.model_url(model, "countTokens");
        debug!("Counting tokens for model: {}", model);

        let request = CountTokensRequest { contents };
        let response: CountTokensResponse = self
            .request_with_retry(
                "Count tokens",
                Method::POST,
                &url,
                Some(&request),
                self.default_policy(),
            )
            .await?;

        debug!("Token count: {}", response.total_tokens);
        Ok(response.total_tokens)
    }

    /// Call Gemini `generateContent` (blocking).
    ///
    /// Errors are returned immediately so a failing prompt in a batch does not
    /// stall the prompts after it.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = self.model_url(model, "generateContent");
        debug!(
            "Calling generateContent for model: {} (cache: {:?})",
            model, request.cached_content
        );

        let response = self
            .request_once("Generate content", Method::POST, &url, Some(request))
            .await?;

        let response_text = response
            .text()
            .await
            .map_err(|e| GemCacheError::GeminiApi(format!("Failed to read response body: {}", e)))?;

        debug!(
            "Raw Gemini response (first 500 chars): {}",
            response_text.chars().take(500).collect::<String>()
        );

        serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            GemCacheError::GeminiApi(format!("Response parsing error: {}", e))
        })
    }

    // ---------------------------------------------------------------------
    // Files API
    // ---------------------------------------------------------------------

    /// Upload a file and wait until it leaves the `PROCESSING` state.
    pub async fn upload_file(&self, path: &Path, display_name: Option<&str>) -> Result<GeminiFile> {
        if !path.is_file() {
            return Err(GemCacheError::InvalidInput(format!(
                "Path does not exist: {}",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                GemCacheError::InvalidInput(format!("Invalid filename: {}", path.display()))
            })?
            .to_string();

        let bytes = tokio::fs::read(path).await?;
        let mime = detect_mime_type(path);
        let display_name = display_name.unwrap_or(&file_name).to_string();

        info!(
            "Uploading '{}' ({} bytes, {})",
            file_name,
            bytes.len(),
            mime
        );

        let metadata = serde_json::json!({ "file": { "displayName": display_name } });
        let form = Form::new()
            .part(
                "metadata",
                FormPart::text(metadata.to_string())
                    .mime_str("application/json")
                    .map_err(|e| GemCacheError::Internal(format!("Invalid MIME type: {}", e)))?,
            )
            .part(
                "file",
                FormPart::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(mime)
                    .map_err(|e| GemCacheError::Internal(format!("Invalid MIME type: {}", e)))?,
            );

        let response = self
            .http_client
            .post(self.upload_url())
            .header(API_KEY_HEADER, self.api_key.expose())
            .header("X-Goog-Upload-Protocol", "multipart")
            .multipart(form)
            .send()
            .await
            .map_err(|e| GemCacheError::GeminiApi(format!("File upload: HTTP error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = sanitize(&response.text().await.unwrap_or_default());
            error!("File upload failed: HTTP {} - {}", status, error_text);
            return Err(GemCacheError::from_status(status.as_u16(), &error_text, "File upload"));
        }

        let uploaded: UploadFileResponse = response.json().await?;
        debug!(
            "Uploaded {} (state: {:?})",
            uploaded.file.name, uploaded.file.state
        );

        if uploaded.file.is_processing() {
            self.wait_until_active(&uploaded.file.name).await
        } else {
            Ok(uploaded.file)
        }
    }

    /// Poll a file until it is no longer processing.
    async fn wait_until_active(&self, name: &str) -> Result<GeminiFile> {
        let start = Instant::now();
        let timeout = Duration::from_secs(self.config.file_poll_timeout_secs);
        let interval = Duration::from_secs(self.config.file_poll_interval_secs);

        loop {
            let file = self.get_file(name).await?;
            match file.state {
                Some(FileState::Processing) => {
                    if start.elapsed() >= timeout {
                        return Err(GemCacheError::FileProcessing(format!(
                            "{} still processing after {}s",
                            name,
                            timeout.as_secs()
                        )));
                    }
                    debug!("{} still processing ({:?} elapsed)", name, start.elapsed());
                    tokio::time::sleep(interval).await;
                }
                Some(FileState::Failed) => {
                    return Err(GemCacheError::FileProcessing(format!(
                        "{} failed server-side processing",
                        name
                    )));
                }
                _ => {
                    debug!("{} is ready", name);
                    return Ok(file);
                }
            }
        }
    }

    /// Retrieve file metadata by name (`files/...`).
    pub async fn get_file(&self, name: &str) -> Result<GeminiFile> {
        let url = self.resource_url(name);
        self.request_with_retry::<(), _>("Get file", Method::GET, &url, None, self.default_policy())
            .await
    }

    /// List every file, following pagination.
    pub async fn list_files(&self) -> Result<Vec<GeminiFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = paged_url(&format!("{}/files", self.base_url()), page_token.as_deref());
            let page: ListFilesResponse = self
                .request_with_retry::<(), _>("List files", Method::GET, &url, None, self.list_policy())
                .await?;

            files.extend(page.files);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} files", files.len());
        Ok(files)
    }

    /// Delete a file. A file that is already gone counts as deleted.
    pub async fn delete_file(&self, name: &str) -> Result<()> {
        self.delete_resource("Delete file", name).await
    }

    // ---------------------------------------------------------------------
    // Cached contents
    // ---------------------------------------------------------------------

    /// Create a cached content entry.
    pub async fn create_cache(&self, request: &CreateCachedContentRequest) -> Result<CachedContent> {
        let url = format!("{}/cachedContents", self.base_url());
        debug!("Creating cache for model: {}", request.model);

        let cache: CachedContent = self
            .request_with_retry(
                "Create cache",
                Method::POST,
                &url,
                Some(request),
                self.default_policy().throttling_only(),
            )
            .await?;

        info!("Cache created: {}", cache.name);
        Ok(cache)
    }

    /// Retrieve cache metadata by name (`cachedContents/...`).
    pub async fn get_cache(&self, name: &str) -> Result<CachedContent> {
        let url = self.resource_url(name);
        self.request_with_retry::<(), _>("Get cache", Method::GET, &url, None, self.default_policy())
            .await
    }

    /// List every cache, following pagination.
    pub async fn list_caches(&self) -> Result<Vec<CachedContent>> {
        let mut caches = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = paged_url(
                &format!("{}/cachedContents", self.base_url()),
                page_token.as_deref(),
            );
            let page: ListCachedContentsResponse = self
                .request_with_retry::<(), _>(
                    "List caches",
                    Method::GET,
                    &url,
                    None,
                    self.list_policy(),
                )
                .await?;

            caches.extend(page.cached_contents);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} caches", caches.len());
        Ok(caches)
    }

    /// Set a new TTL, counted from now.
    pub async fn update_cache_ttl(&self, name: &str, ttl_seconds: u64) -> Result<CachedContent> {
        let body = UpdateCachedContentRequest {
            ttl: Some(format_ttl(ttl_seconds)),
            expire_time: None,
        };
        self.patch_cache(name, "ttl", &body).await
    }

    /// Set an absolute RFC 3339 expiry time.
    pub async fn update_cache_expire_time(
        &self,
        name: &str,
        expire_time: &str,
    ) -> Result<CachedContent> {
        let body = UpdateCachedContentRequest {
            ttl: None,
            expire_time: Some(expire_time.to_string()),
        };
        self.patch_cache(name, "expireTime", &body).await
    }

    async fn patch_cache(
        &self,
        name: &str,
        mask: &str,
        body: &UpdateCachedContentRequest,
    ) -> Result<CachedContent> {
        let url = format!("{}?updateMask={}", self.resource_url(name), mask);
        debug!("Updating {} of {}", mask, name);

        self.request_with_retry(
            "Update cache",
            Method::PATCH,
            &url,
            Some(body),
            self.default_policy(),
        )
        .await
    }

    /// Delete a cache. A cache that already expired counts as deleted.
    pub async fn delete_cache(&self, name: &str) -> Result<()> {
        self.delete_resource("Delete cache", name).await
    }

    async fn delete_resource(&self, operation: &str, name: &str) -> Result<()> {
        let url = self.resource_url(name);
        match self
            .request_once::<()>(operation, Method::DELETE, &url, None)
            .await
        {
            Ok(_) => {
                info!("Deleted {}", name);
                Ok(())
            }
            Err(GemCacheError::NotFound(_)) => {
                debug!("{} not found (already deleted or expired)", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ---------------------------------------------------------------------
    // Downloads
    // ---------------------------------------------------------------------

    /// Stream `url` to `dest`, creating parent directories.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("Downloading {} to {}", url, dest.display());

        let response = self
            .http_client
            .get(url)
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| GemCacheError::Download(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GemCacheError::Download(format!("{}: HTTP {}", url, status)));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| GemCacheError::Download(format!("{}: {}", url, e)))?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            warn!("Downloaded file {} is empty", dest.display());
        }
        debug!("Downloaded {} bytes", written);

        Ok(dest.to_path_buf())
    }
}

fn paged_url(base: &str, page_token: Option<&str>) -> String {
    match page_token {
        Some(token) => format!(
            "{}?pageSize={}&pageToken={}",
            base,
            PAGE_SIZE,
            urlencoding::encode(token)
        ),
        None => format!("{}?pageSize={}", base, PAGE_SIZE),
    }
}

/// Detects MIME type from file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
