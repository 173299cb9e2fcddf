// Error handling tests
// Author: kelexine (https://github.com/kelexine)

use gemcache::error::{extract_error_message, GemCacheError};

#[test]
fn test_error_display_messages() {
    let errors = vec![
        GemCacheError::Config("bad file".to_string()),
        GemCacheError::MissingApiKey,
        GemCacheError::GeminiApi("API error".to_string()),
        GemCacheError::InvalidInput("Bad input".to_string()),
        GemCacheError::TooManyRequests("Rate limited".to_string()),
        GemCacheError::ServiceUnavailable("Service down".to_string()),
        GemCacheError::BelowCacheThreshold {
            tokens: 100,
            required: 4096,
        },
        GemCacheError::FileProcessing("failed".to_string()),
    ];

    for error in errors {
        let display = format!("{}", error);
        assert!(!display.is_empty(), "Error should have display message");
    }
}

#[test]
fn test_missing_key_mentions_env() {
    let error = GemCacheError::MissingApiKey;
    assert!(format!("{}", error).contains("GEMINI_API_KEY"));
}

#[test]
fn test_threshold_error_mentions_counts() {
    let error = GemCacheError::BelowCacheThreshold {
        tokens: 1200,
        required: 4096,
    };
    let display = format!("{}", error);
    assert!(display.contains("1200"));
    assert!(display.contains("4096"));
}

#[test]
fn test_from_status_mapping() {
    let body = r#"{"error": {"code": 404, "message": "cachedContents/x not found", "status": "NOT_FOUND"}}"#;
    match GemCacheError::from_status(404, body, "Get cache") {
        GemCacheError::NotFound(msg) => assert!(msg.contains("cachedContents/x not found")),
        other => panic!("unexpected: {:?}", other),
    }

    assert!(matches!(
        GemCacheError::from_status(429, "{}", "List files"),
        GemCacheError::TooManyRequests(_)
    ));
    assert!(matches!(
        GemCacheError::from_status(503, "", "Count tokens"),
        GemCacheError::ServiceUnavailable(_)
    ));

    match GemCacheError::from_status(400, "plain text body", "Create cache") {
        GemCacheError::GeminiApi(msg) => {
            assert!(msg.contains("Create cache"));
            assert!(msg.contains("HTTP 400"));
            assert!(msg.contains("plain text body"));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_transient_errors() {
    assert!(GemCacheError::TooManyRequests("x".to_string()).is_transient());
    assert!(GemCacheError::ServiceUnavailable("x".to_string()).is_transient());
    assert!(GemCacheError::from_status(500, "", "op").is_transient());
    assert!(!GemCacheError::from_status(400, "", "op").is_transient());
    assert!(!GemCacheError::InvalidInput("x".to_string()).is_transient());
}

#[test]
fn test_extract_error_message() {
    let with_message = r#"{"error": {"message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
    assert_eq!(extract_error_message(with_message).as_deref(), Some("Quota exceeded"));

    let status_only = r#"{"error": {"status": "PERMISSION_DENIED"}}"#;
    assert_eq!(extract_error_message(status_only).as_deref(), Some("PERMISSION_DENIED"));

    assert_eq!(extract_error_message("not json"), None);
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.txt");
    let error: GemCacheError = io.into();
    assert!(format!("{}", error).contains("missing.txt"));
}
