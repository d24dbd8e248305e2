// Retry logic for hosted model calls, honoring Google retryDelay hints
// Author: kelexine (https://github.com/kelexine)

use backoff::{backoff::Backoff, ExponentialBackoff};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Status used for failures that never produced an HTTP response.
pub const TRANSPORT_FAILURE: u16 = 0;

/// Longest server-suggested delay we are willing to wait.
const MAX_HINTED_DELAY_SECS: f64 = 10.0;

/// A failed upstream attempt: HTTP status (or [`TRANSPORT_FAILURE`]) and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub status: u16,
    pub body: String,
}

impl UpstreamFailure {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn transport(body: impl Into<String>) -> Self {
        Self::new(TRANSPORT_FAILURE, body)
    }
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status == TRANSPORT_FAILURE {
            write!(f, "transport error: {}", self.body)
        } else {
            write!(f, "HTTP {}: {}", self.status, self.body)
        }
    }
}

/// Parse Google's `RetryInfo.retryDelay` (e.g. "0.457639761s", "4s") from an
/// error body. Capped at ten seconds since a user is waiting on the answer.
pub fn parse_retry_delay(error_json: &str) -> Option<Duration> {
    let parsed: Value = serde_json::from_str(error_json).ok()?;
    let details = parsed.get("error")?.get("details")?.as_array()?;

    details
        .iter()
        .filter(|d| {
            d.get("@type").and_then(Value::as_str)
                == Some("type.googleapis.com/google.rpc.RetryInfo")
        })
        .find_map(|d| d.get("retryDelay").and_then(Value::as_str))
        .and_then(parse_duration_string)
}

fn parse_duration_string(duration_str: &str) -> Option<Duration> {
    let seconds: f64 = duration_str.strip_suffix('s')?.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let capped = seconds.min(MAX_HINTED_DELAY_SECS);
    Some(Duration::from_millis((capped * 1000.0) as u64))
}

/// Exponential backoff tuned for interactive requests
pub fn create_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: Duration::from_millis(250),
        initial_interval: Duration::from_millis(250),
        randomization_factor: 0.3,
        multiplier: 2.0,
        max_interval: Duration::from_secs(5),
        max_elapsed_time: Some(Duration::from_secs(30)),
        ..Default::default()
    }
}

/// Rate limits, server errors and transport failures are worth another try
pub fn is_retryable(status: u16) -> bool {
    matches!(status, TRANSPORT_FAILURE | 429 | 500 | 502 | 503 | 504)
}

/// Run `operation`, retrying retryable failures up to `max_retries` times.
///
/// Waits for the server's `retryDelay` hint when present, otherwise for the
/// next exponential backoff interval. Returns the last failure when retries
/// are exhausted or the failure is not retryable.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    max_retries: u32,
    mut operation: F,
) -> Result<T, UpstreamFailure>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, UpstreamFailure>>,
{
    let mut backoff = create_backoff();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let failure = match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(failure) => failure,
        };

        if !is_retryable(failure.status) || attempt > max_retries {
            return Err(failure);
        }

        let delay = match parse_retry_delay(&failure.body) {
            Some(hint) => hint,
            None => match backoff.next_backoff() {
                Some(delay) => delay,
                None => return Err(failure),
            },
        };

        warn!(
            "{} failed with {} (attempt {}/{}), retrying in {}ms",
            operation_name,
            failure.status,
            attempt,
            max_retries + 1,
            delay.as_millis()
        );

        tokio::time::sleep(delay).await;
    }
}
