//! Explanation facade.
//!
//! [`Explainer`] is the single entry point the messaging layer calls. For
//! each request it checks the [`ExplanationCache`], calls the hosted
//! provider only on a miss, cleans the answer, stores it, and reports the
//! outcome as a structured response. Failures never escape as errors: they
//! become `{ success: false, error }` with a user-facing message.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod prompt;

pub use prompt::{build_prompt, clean_explanation, SelectionKind};

use crate::cache::{ExplanationCache, StatisticsReport};
use crate::config::ExplainConfig;
use crate::error::{ExplainError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The external model call the facade wraps.
#[async_trait]
pub trait ExplanationProvider: Send + Sync {
    /// Whether credentials are present. Checked before every request.
    fn is_configured(&self) -> bool;

    /// Model name reported alongside fresh answers and stored with them.
    fn model(&self) -> &str;

    /// Send `prompt` and return the raw answer.
    async fn call_provider(&self, prompt: &str) -> Result<String>;
}

/// A successful explanation and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub text: String,
    pub from_cache: bool,
    /// Creation time of the cache entry that served a hit.
    pub cache_timestamp: Option<i64>,
    /// Model that produced the text, when known.
    pub model: Option<String>,
}

/// Structured result of [`Explainer::explain`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExplainResponse {
    fn success(explanation: Explanation) -> Self {
        Self {
            success: true,
            explanation: Some(explanation.text),
            from_cache: Some(explanation.from_cache),
            cache_timestamp: explanation.cache_timestamp,
            model: explanation.model,
            error: None,
        }
    }

    fn failure(error: &ExplainError) -> Self {
        Self {
            success: false,
            explanation: None,
            from_cache: None,
            cache_timestamp: None,
            model: None,
            error: Some(error.user_message()),
        }
    }
}

/// Structured result of [`Explainer::clear_cache`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClearCacheResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared_entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cache-first explanation service
pub struct Explainer {
    cache: Arc<ExplanationCache>,
    provider: Arc<dyn ExplanationProvider>,
    config: ExplainConfig,
}

impl Explainer {
    pub fn new(
        cache: Arc<ExplanationCache>,
        provider: Arc<dyn ExplanationProvider>,
        config: &ExplainConfig,
    ) -> Self {
        Self {
            cache,
            provider,
            config: config.clone(),
        }
    }

    pub fn cache(&self) -> &Arc<ExplanationCache> {
        &self.cache
    }

    pub fn is_provider_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Explain `text` within the configured deadline
    pub async fn explain(&self, text: &str) -> ExplainResponse {
        let deadline = Duration::from_secs(self.config.timeout_seconds);
        self.explain_with_deadline(text, deadline).await
    }

    /// Explain `text`, giving up after `deadline`.
    ///
    /// On expiry the pending work is dropped: a provider call in flight is
    /// abandoned and its answer is not cached.
    pub async fn explain_with_deadline(&self, text: &str, deadline: Duration) -> ExplainResponse {
        let outcome = tokio::time::timeout(deadline, self.try_explain(text))
            .await
            .unwrap_or_else(|_| Err(ExplainError::Timeout(deadline.as_millis())));

        match outcome {
            Ok(explanation) => {
                metrics::record_explain(if explanation.from_cache {
                    "cache_hit"
                } else {
                    "provider"
                });
                ExplainResponse::success(explanation)
            }
            Err(e) => {
                let outcome = match e {
                    ExplainError::InvalidRequest(_) | ExplainError::MissingCredentials => {
                        "rejected"
                    }
                    ExplainError::Timeout(_) => "timeout",
                    _ => "failed",
                };
                metrics::record_explain(outcome);
                warn!("Explanation failed: {}", e);
                ExplainResponse::failure(&e)
            }
        }
    }

    /// Cache lookup, provider call on miss, store. No deadline.
    pub async fn try_explain(&self, text: &str) -> Result<Explanation> {
        self.validate(text)?;

        if let Some(hit) = self.cache.get(text).await {
            debug!("Serving explanation from cache");
            return Ok(Explanation {
                text: hit.explanation,
                from_cache: true,
                cache_timestamp: Some(hit.cache_timestamp),
                model: hit.model,
            });
        }

        self.cache.record_api_call().await;

        let selection = text.trim();
        info!(
            "Requesting explanation ({} chars): {:?}",
            selection.chars().count(),
            selection.chars().take(50).collect::<String>()
        );

        let raw = self.provider.call_provider(&build_prompt(selection)).await?;
        let explanation = clean_explanation(&raw);
        if explanation.is_empty() {
            return Err(ExplainError::EmptyResponse);
        }

        let model = self.provider.model().to_string();
        self.cache
            .set_with_model(text, &explanation, Some(&model))
            .await;

        Ok(Explanation {
            text: explanation,
            from_cache: false,
            cache_timestamp: None,
            model: Some(model),
        })
    }

    fn validate(&self, text: &str) -> Result<()> {
        if !self.provider.is_configured() {
            return Err(ExplainError::MissingCredentials);
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ExplainError::InvalidRequest(
                "Please select some text to explain.".to_string(),
            ));
        }

        // Exclusive bound: a selection at the limit is rejected.
        let length = trimmed.chars().count();
        if length >= self.config.max_text_length {
            return Err(ExplainError::InvalidRequest(format!(
                "Selected text is too long ({} characters, must be under {}).",
                length, self.config.max_text_length
            )));
        }

        Ok(())
    }

    pub async fn get_statistics(&self) -> StatisticsReport {
        self.cache.get_statistics().await
    }

    pub async fn clear_cache(&self) -> ClearCacheResponse {
        match self.cache.clear().await {
            Ok(result) => ClearCacheResponse {
                success: true,
                cleared_entries: Some(result.cleared_entries),
                error: None,
            },
            Err(e) => {
                warn!("Failed to clear cache: {}", e);
                ClearCacheResponse {
                    success: false,
                    cleared_entries: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
