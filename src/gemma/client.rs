// Gemma API client for the Generative Language API
// Author: kelexine (https://github.com/kelexine)

use super::models::{GenerateContentRequest, GenerateContentResponse};
use crate::config::GemmaConfig;
use crate::error::{ExplainError, Result};
use crate::explainer::ExplanationProvider;
use crate::metrics;
use crate::utils::logging::sanitize;
use crate::utils::retry::{with_retry, UpstreamFailure, TRANSPORT_FAILURE};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Client for hosted Gemma models.
///
/// Sends one `generateContent` call per prompt, authenticated with an API
/// key. Rate limits and server errors are retried inside the client; every
/// other failure is classified into the [`ExplainError`] provider taxonomy.
pub struct GemmaClient {
    http_client: Client,
    config: GemmaConfig,
}

impl GemmaClient {
    pub fn new(config: &GemmaConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .use_rustls_tls()
            .build()
            .map_err(|e| ExplainError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        debug!("Created Gemma client for model {}", config.model);

        Ok(Self {
            http_client,
            config: config.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Send `prompt` and return the model's text answer.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        if self.config.api_key.is_empty() {
            return Err(ExplainError::MissingCredentials);
        }

        let url = self.endpoint();
        let request = GenerateContentRequest::from_prompt(prompt, &self.config);
        debug!("Calling generateContent for model {}", self.config.model);

        let started = Instant::now();
        let outcome = with_retry("Gemma generateContent", self.config.max_retries, || {
            self.attempt(&url, &request)
        })
        .await;
        let elapsed = started.elapsed().as_secs_f64();

        let response = match outcome {
            Ok(response) => {
                metrics::record_provider_call(&self.config.model, "200", elapsed);
                response
            }
            Err(failure) => {
                let status = if failure.status == TRANSPORT_FAILURE {
                    "transport".to_string()
                } else {
                    failure.status.to_string()
                };
                metrics::record_provider_call(&self.config.model, &status, elapsed);
                error!("Gemma API call failed: {}", sanitize(&failure.to_string()));
                return Err(Self::classify(failure));
            }
        };

        if let Some(text) = response.text() {
            return Ok(text);
        }
        if let Some(reason) = response.block_reason() {
            return Err(ExplainError::ProviderBadRequest(format!(
                "prompt blocked by the provider ({})",
                reason
            )));
        }
        Err(ExplainError::EmptyResponse)
    }

    async fn attempt(
        &self,
        url: &str,
        request: &GenerateContentRequest,
    ) -> std::result::Result<GenerateContentResponse, UpstreamFailure> {
        let response = self
            .http_client
            .post(url)
            .header("x-goog-api-key", self.config.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamFailure::transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamFailure::transport(format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(UpstreamFailure::new(status.as_u16(), body));
        }

        serde_json::from_str(&body).map_err(|e| {
            debug!(
                "Unparseable Gemma response (first 500 chars): {}",
                body.chars().take(500).collect::<String>()
            );
            UpstreamFailure::new(502, format!("invalid response body: {}", e))
        })
    }

    /// Map a final upstream failure to the provider error taxonomy
    fn classify(failure: UpstreamFailure) -> ExplainError {
        let message = Self::extract_error_message(&failure.body)
            .unwrap_or_else(|| failure.body.clone());
        let message = sanitize(&message);

        match failure.status {
            TRANSPORT_FAILURE => ExplainError::ProviderNetwork(message),
            401 | 403 => ExplainError::ProviderUnauthorized(message),
            // Google reports a bad key as 400 INVALID_ARGUMENT.
            400 if failure.body.contains("API_KEY_INVALID")
                || failure.body.contains("API key not valid") =>
            {
                ExplainError::ProviderUnauthorized(message)
            }
            429 => ExplainError::ProviderRateLimited(message),
            400 | 404 | 413 | 422 => ExplainError::ProviderBadRequest(message),
            status => ExplainError::ProviderNetwork(format!("HTTP {}: {}", status, message)),
        }
    }

    /// Extract `error.message` (or `error.status`) from a Google error body
    fn extract_error_message(body: &str) -> Option<String> {
        #[derive(serde::Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(serde::Deserialize)]
        struct ErrorDetail {
            message: Option<String>,
            status: Option<String>,
        }

        let parsed: ErrorResponse = serde_json::from_str(body).ok()?;
        let detail = parsed.error?;
        detail.message.or(detail.status)
    }
}

#[async_trait]
impl ExplanationProvider for GemmaClient {
    fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn call_provider(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}
