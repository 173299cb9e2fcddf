// Gemini client tests against a mock HTTP server
// Author: kelexine (https://github.com/kelexine)

use gemcache::config::{ApiKey, GeminiConfig};
use gemcache::error::GemCacheError;
use gemcache::gemini::GeminiClient;
use gemcache::models::gemini::{Content, CreateCachedContentRequest, GenerateContentRequest};
use mockito::{Matcher, Server, ServerGuard};
use std::io::Write;

const KEY: &str = "AIzaTestKey1234567890";

fn client_for(server: &ServerGuard) -> GeminiClient {
    client_with(server, |_| {})
}

fn client_with(server: &ServerGuard, tweak: impl FnOnce(&mut GeminiConfig)) -> GeminiClient {
    let mut config = GeminiConfig {
        api_base_url: server.url(),
        upload_base_url: format!("{}/upload", server.url()),
        max_retries: 1,
        list_retries: 0,
        list_retry_delay_ms: 1,
        file_poll_interval_secs: 0,
        file_poll_timeout_secs: 5,
        ..GeminiConfig::default()
    };
    tweak(&mut config);
    GeminiClient::new(&config, ApiKey::new(KEY).unwrap()).unwrap()
}

#[tokio::test]
async fn test_count_tokens_sends_key_header() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-2.0-flash-001:countTokens")
        .match_query(Matcher::Any)
        .match_header("x-goog-api-key", KEY)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"totalTokens": 5120}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let tokens = client
        .count_tokens("gemini-2.0-flash-001", vec![Content::user_text("hello")])
        .await
        .unwrap();

    assert_eq!(tokens, 5120);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_caches_follows_pages() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/cachedContents")
        .match_query(Matcher::Exact("pageSize=100".to_string()))
        .with_status(200)
        .with_body(
            r#"{"cachedContents": [{"name": "cachedContents/a", "displayName": "alpha"}],
                "nextPageToken": "next"}"#,
        )
        .create_async()
        .await;
    let second = server
        .mock("GET", "/cachedContents")
        .match_query(Matcher::Exact("pageSize=100&pageToken=next".to_string()))
        .with_status(200)
        .with_body(r#"{"cachedContents": [{"name": "cachedContents/b"}]}"#)
        .create_async()
        .await;

    let caches = client_for(&server).list_caches().await.unwrap();
    let names: Vec<_> = caches.iter().map(|c| c.name.as_str()).collect();

    assert_eq!(names, vec!["cachedContents/a", "cachedContents/b"]);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_delete_missing_cache_is_ok() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/cachedContents/gone")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error": {"code": 404, "message": "not found", "status": "NOT_FOUND"}}"#)
        .create_async()
        .await;

    assert!(client_for(&server).delete_cache("cachedContents/gone").await.is_ok());
}

#[tokio::test]
async fn test_generate_error_carries_vendor_message() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-2.0-flash-001:generateContent")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(
            r#"{"error": {"code": 400, "message": "CachedContent can not be used with system_instruction"}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let request = GenerateContentRequest {
        contents: vec![Content::user_text("hi")],
        ..Default::default()
    };
    let err = client_for(&server)
        .generate_content("models/gemini-2.0-flash-001", &request)
        .await
        .unwrap_err();

    match err {
        GemCacheError::GeminiApi(msg) => {
            assert!(msg.contains("HTTP 400"));
            assert!(msg.contains("system_instruction"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_generate_parses_usage() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/models/gemini-2.5-flash:generateContent")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(serde_json::json!({
            "cachedContent": "cachedContents/abc"
        })))
        .with_status(200)
        .with_body(
            r#"{
                "candidates": [{"content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Answer"}
                ]}}],
                "usageMetadata": {
                    "promptTokenCount": 4200,
                    "cachedContentTokenCount": 4096,
                    "candidatesTokenCount": 3,
                    "totalTokenCount": 4203
                }
            }"#,
        )
        .create_async()
        .await;

    let request = GenerateContentRequest {
        contents: vec![Content::user_text("hi")],
        system_instruction: None,
        cached_content: Some("cachedContents/abc".to_string()),
    };
    let response = client_for(&server)
        .generate_content("gemini-2.5-flash", &request)
        .await
        .unwrap();

    assert_eq!(response.text().as_deref(), Some("Answer"));
    let usage = response.usage_metadata.unwrap();
    assert_eq!(usage.cached_content_token_count, Some(4096));
}

#[tokio::test]
async fn test_upload_file() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/upload/files")
        .match_query(Matcher::Any)
        .match_header("x-goog-upload-protocol", "multipart")
        .match_header("x-goog-api-key", KEY)
        .with_status(200)
        .with_body(
            r#"{"file": {
                "name": "files/abc",
                "displayName": "notes",
                "mimeType": "text/plain",
                "sizeBytes": "11",
                "uri": "https://example.com/files/abc",
                "state": "ACTIVE"
            }}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let mut tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    write!(tmp, "hello world").unwrap();

    let file = client_for(&server)
        .upload_file(tmp.path(), Some("notes"))
        .await
        .unwrap();

    assert_eq!(file.name, "files/abc");
    assert_eq!(file.size(), Some(11));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_polls_until_active() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/upload/files")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"file": {"name": "files/slow", "state": "PROCESSING"}}"#)
        .create_async()
        .await;
    let poll = server
        .mock("GET", "/files/slow")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"name": "files/slow", "state": "ACTIVE", "uri": "https://example.com/files/slow"}"#)
        .expect(1)
        .create_async()
        .await;

    let mut tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    write!(tmp, "data").unwrap();

    let file = client_for(&server).upload_file(tmp.path(), None).await.unwrap();
    assert!(!file.is_processing());
    poll.assert_async().await;
}

#[tokio::test]
async fn test_upload_missing_path() {
    let server = Server::new_async().await;
    let err = client_for(&server)
        .upload_file(std::path::Path::new("/definitely/not/here.pdf"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GemCacheError::InvalidInput(_)));
}

#[tokio::test]
async fn test_update_ttl_uses_update_mask() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PATCH", "/cachedContents/abc")
        .match_query(Matcher::UrlEncoded("updateMask".to_string(), "ttl".to_string()))
        .match_body(Matcher::Json(serde_json::json!({ "ttl": "600s" })))
        .with_status(200)
        .with_body(r#"{"name": "cachedContents/abc", "expireTime": "2025-01-01T00:10:00Z"}"#)
        .expect(1)
        .create_async()
        .await;

    let cache = client_for(&server)
        .update_cache_ttl("cachedContents/abc", 600)
        .await
        .unwrap();

    assert_eq!(cache.name, "cachedContents/abc");
    assert!(cache.expire_time.is_some());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_failed_processing() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/upload/files")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"file": {"name": "files/bad", "state": "PROCESSING"}}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/files/bad")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"name": "files/bad", "state": "FAILED"}"#)
        .create_async()
        .await;

    let mut tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    write!(tmp, "data").unwrap();

    let err = client_for(&server).upload_file(tmp.path(), None).await.unwrap_err();
    match err {
        GemCacheError::FileProcessing(msg) => assert!(msg.contains("files/bad")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_upload_gives_up_after_poll_timeout() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/upload/files")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"file": {"name": "files/stuck", "state": "PROCESSING"}}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/files/stuck")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"name": "files/stuck", "state": "PROCESSING"}"#)
        .create_async()
        .await;

    let mut tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    write!(tmp, "data").unwrap();

    let client = client_with(&server, |config| config.file_poll_timeout_secs = 0);
    let err = client.upload_file(tmp.path(), None).await.unwrap_err();
    match err {
        GemCacheError::FileProcessing(msg) => assert!(msg.contains("still processing")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_update_expire_time_uses_update_mask() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PATCH", "/cachedContents/abc")
        .match_query(Matcher::UrlEncoded(
            "updateMask".to_string(),
            "expireTime".to_string(),
        ))
        .match_body(Matcher::Json(serde_json::json!({
            "expireTime": "2025-01-31T12:00:00+00:00"
        })))
        .with_status(200)
        .with_body(r#"{"name": "cachedContents/abc", "expireTime": "2025-01-31T12:00:00Z"}"#)
        .expect(1)
        .create_async()
        .await;

    let cache = client_for(&server)
        .update_cache_expire_time("cachedContents/abc", "2025-01-31T12:00:00+00:00")
        .await
        .unwrap();

    assert!(cache.expire_time.is_some());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_cache_does_not_repeat_on_server_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/cachedContents")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body(r#"{"error": {"code": 500, "message": "internal"}}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_with(&server, |config| config.max_retries = 3);
    let request = CreateCachedContentRequest {
        model: "models/gemini-2.0-flash-001".to_string(),
        display_name: None,
        system_instruction: None,
        contents: vec![Content::user_text("hello")],
        ttl: Some("3600s".to_string()),
    };
    assert!(client.create_cache(&request).await.is_err());
    mock.assert_async().await;
}
