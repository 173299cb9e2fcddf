// Retry logic with Google retryDelay hint support
// Author: kelexine (https://github.com/kelexine)

use backoff::{backoff::Backoff, ExponentialBackoff};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Parse Google's retryDelay duration string (e.g., "0.457639761s", "40s")
/// Returns duration in milliseconds, capped at 60 seconds
pub fn parse_retry_delay(error_json: &str) -> Option<Duration> {
    let parsed: Value = serde_json::from_str(error_json).ok()?;

    // Navigate: error.details[] -> find RetryInfo -> retryDelay
    let details = parsed.get("error")?.get("details")?.as_array()?;

    for detail in details {
        if detail.get("@type").and_then(|v| v.as_str())
            == Some("type.googleapis.com/google.rpc.RetryInfo")
        {
            if let Some(retry_delay) = detail.get("retryDelay").and_then(|v| v.as_str()) {
                return parse_duration_string(retry_delay);
            }
        }
    }

    None
}

/// Parse duration strings like "0.457639761s", "40s", "1.5s"
/// Returns duration, capped at 60 seconds
fn parse_duration_string(duration_str: &str) -> Option<Duration> {
    let seconds_str = duration_str.strip_suffix('s')?;
    let seconds: f64 = seconds_str.parse().ok()?;

    let capped_seconds = seconds.min(60.0);

    let millis = (capped_seconds * 1000.0) as u64;
    Some(Duration::from_millis(millis))
}

/// How many times to try an operation and how long to wait in between.
pub struct RetryPolicy {
    pub max_attempts: u32,
    backoff: ExponentialBackoff,
    retry_on: fn(u16) -> bool,
}

impl RetryPolicy {
    /// Exponential backoff starting at 500ms, doubling, with jitter.
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: ExponentialBackoff {
                current_interval: Duration::from_millis(500),
                initial_interval: Duration::from_millis(500),
                randomization_factor: 0.3,
                multiplier: 2.0,
                max_interval: Duration::from_secs(30),
                max_elapsed_time: Some(Duration::from_secs(120)),
                ..Default::default()
            },
            retry_on: is_retryable,
        }
    }

    /// `retries` extra attempts after the first, a constant `delay` apart.
    pub fn fixed(retries: u32, delay: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            backoff: ExponentialBackoff {
                current_interval: delay,
                initial_interval: delay,
                randomization_factor: 0.0,
                multiplier: 1.0,
                max_interval: delay,
                max_elapsed_time: None,
                ..Default::default()
            },
            retry_on: is_retryable,
        }
    }

    /// Retry only when the server refused the request outright (429/503).
    /// For non-idempotent calls, where a lost response may hide a success.
    pub fn throttling_only(mut self) -> Self {
        self.retry_on = is_throttled;
        self
    }
}

/// Determine if an HTTP status code is retryable
pub fn is_retryable(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// 429 or 503: the request was rejected before any work was done.
pub fn is_throttled(status: u16) -> bool {
    matches!(status, 429 | 503)
}

/// Execute operation with retry logic
/// - Uses Google's retryDelay hint if available
/// - Falls back to the policy's backoff
/// - Gives up on non-retryable statuses or after `max_attempts`
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, (u16, String)>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, (u16, String)>>,
{
    let RetryPolicy {
        max_attempts,
        mut backoff,
        retry_on,
    } = policy;
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err((status, error_body)) => {
                if !retry_on(status) || attempt >= max_attempts {
                    return Err((status, error_body));
                }

                let delay = if let Some(google_delay) = parse_retry_delay(&error_body) {
                    debug!(
                        "{} failed with {} (attempt {}), Google suggests waiting {}ms",
                        operation_name,
                        status,
                        attempt,
                        google_delay.as_millis()
                    );
                    google_delay
                } else {
                    let backoff_delay = backoff.next_backoff().unwrap_or(Duration::from_secs(30));
                    debug!(
                        "{} failed with {} (attempt {}), retrying after {}ms",
                        operation_name,
                        status,
                        attempt,
                        backoff_delay.as_millis()
                    );
                    backoff_delay
                };

                tokio::time::sleep(delay).await;
            }
        }
    }
}
