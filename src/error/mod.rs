// Error types for the explanium service
// Author: kelexine (https://github.com/kelexine)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExplainError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Provider rejected credentials: {0}")]
    ProviderUnauthorized(String),

    #[error("Provider rate limited: {0}")]
    ProviderRateLimited(String),

    #[error("Provider rejected request: {0}")]
    ProviderBadRequest(String),

    #[error("Provider network error: {0}")]
    ProviderNetwork(String),

    #[error("Provider credentials not configured")]
    MissingCredentials,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Provider returned an empty explanation")]
    EmptyResponse,

    #[error("Explanation timed out after {0} ms")]
    Timeout(u128),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExplainError {
    /// Human-readable text shown to the user when an explanation fails.
    pub fn user_message(&self) -> String {
        match self {
            ExplainError::ProviderUnauthorized(_) => {
                "Invalid API key. Please check the Gemma API key in your settings.".to_string()
            }
            ExplainError::ProviderRateLimited(_) => {
                "Rate limit exceeded. Please wait a moment and try again.".to_string()
            }
            ExplainError::ProviderBadRequest(detail) => {
                format!("The explanation request was rejected: {}", detail)
            }
            ExplainError::ProviderNetwork(_) | ExplainError::Http(_) => {
                "Network error: could not reach the explanation service. Please check your connection."
                    .to_string()
            }
            ExplainError::MissingCredentials => {
                "No API key configured. Add your Gemma API key in the settings.".to_string()
            }
            ExplainError::InvalidRequest(detail) => detail.clone(),
            ExplainError::EmptyResponse => {
                "The explanation service returned an empty answer. Please try again.".to_string()
            }
            ExplainError::Timeout(_) => {
                "The explanation took too long. Please try again.".to_string()
            }
            ExplainError::StoreUnavailable(_) => {
                "Cache storage is unavailable.".to_string()
            }
            _ => "Explanation failed. Please try again.".to_string(),
        }
    }
}

// Convert ExplainError to HTTP responses for Axum
impl IntoResponse for ExplainError {
    fn into_response(self) -> Response {
        let (status, error_type) = match self {
            ExplainError::ProviderUnauthorized(_) | ExplainError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "authentication_error")
            }
            ExplainError::InvalidRequest(_) | ExplainError::Json(_) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error")
            }
            ExplainError::ProviderRateLimited(_) => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_error")
            }
            ExplainError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout_error"),
            ExplainError::ProviderBadRequest(_)
            | ExplainError::ProviderNetwork(_)
            | ExplainError::EmptyResponse
            | ExplainError::Http(_) => (StatusCode::BAD_GATEWAY, "api_error"),
            ExplainError::StoreUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_error")
            }
            ExplainError::Config(_) | ExplainError::ConfigParsing(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "api_error"),
        };

        let body = json!({
            "success": false,
            "error": {
                "type": error_type,
                "message": self.user_message(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ExplainError>;
