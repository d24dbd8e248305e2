//! Structured logging and secret-redaction utilities.
//!
//! This module configures the `tracing` ecosystem for the application and
//! provides [`sanitize`], which keeps Google API keys out of log sinks when
//! upstream error bodies or URLs are logged.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::{ExplainError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

lazy_static! {
    /// Google API keys: `AIza` followed by 35 URL-safe characters.
    static ref GOOGLE_API_KEY: Regex = Regex::new(r"AIza[0-9A-Za-z_\-]{35}").unwrap();

    /// `key=...` query parameters.
    static ref KEY_QUERY_PARAM: Regex = Regex::new(r"([?&]key=)[^&\s]+").unwrap();
}

/// Initializes the global tracing subscriber.
///
/// Supports two output formats:
/// - `json`: Structured JSON logs for log collectors.
/// - `pretty` (default): Human-readable output for development.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = match config.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    installed.map_err(|e| ExplainError::Internal(format!("Failed to install logger: {}", e)))
}

/// Replaces API keys in `input` with `[REDACTED_API_KEY]`.
pub fn sanitize(input: &str) -> String {
    let redacted = GOOGLE_API_KEY.replace_all(input, "[REDACTED_API_KEY]");
    KEY_QUERY_PARAM
        .replace_all(&redacted, "${1}[REDACTED_API_KEY]")
        .into_owned()
}
