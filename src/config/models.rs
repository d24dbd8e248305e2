//! Configuration data structures for the explanium service.
//!
//! This module defines the schema for the application settings: the HTTP
//! surface, the hosted Gemma provider, the explanation cache, the backing
//! key-value store, and logging.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings (host, port, allowed origins).
    #[serde(default)]
    pub server: ServerConfig,

    /// Hosted Gemma API settings.
    #[serde(default)]
    pub gemma: GemmaConfig,

    /// Explanation cache sizing and expiry.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Persistent key-value store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Request-level limits for explanations.
    #[serde(default)]
    pub explain: ExplainConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the built-in HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Default: `127.0.0.1`
    #[serde(default = "default_host")]
    pub host: String,

    /// Default: `8787`
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed to call the API. An empty list allows any origin,
    /// which is what browser extensions with dynamic IDs need.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// API key wrapper that is wiped from memory on drop and never printed.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("ApiKey(<unset>)")
        } else {
            f.write_str("ApiKey(<redacted>)")
        }
    }
}

/// Settings for the upstream Gemma API connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GemmaConfig {
    /// Base URL of the Generative Language API.
    /// Default: `https://generativelanguage.googleapis.com/v1beta`
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Default: `gemma-3-27b-it`
    #[serde(default = "default_model")]
    pub model: String,

    /// API key sent as `x-goog-api-key`. Empty means unconfigured.
    #[serde(default)]
    pub api_key: ApiKey,

    /// Per-request HTTP timeout in seconds.
    /// Default: `30`
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries on 429/5xx after the first attempt.
    /// Default: `2`
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Default: `0.3`
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default: `1024`
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

/// Which hash function the cache key deriver uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyHash {
    /// 32-bit polynomial rolling hash (compact, collisions possible).
    #[default]
    Rolling,
    /// Truncated SHA-256 digest of the normalized text.
    Sha256,
}

/// Settings for the explanation cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Capacity bound on live entries.
    /// Default: `1000`
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entry lifetime in seconds.
    /// Default: `86400` (24 hours)
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,

    /// Namespace for cache entries inside the shared store.
    /// Default: `explanium_cache_`
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Key holding the persisted statistics.
    /// Default: `explanium_stats`
    #[serde(default = "default_stats_key")]
    pub stats_key: String,

    #[serde(default)]
    pub key_hash: KeyHash,

    /// Interval of the background expiry sweep; `0` disables it.
    /// Default: `3600`
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

/// Backing store selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

/// Settings for the persistent key-value store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// JSON file used by the `file` backend.
    /// Default: `~/.explanium/store.json`
    #[serde(default = "default_store_path")]
    pub path: String,
}

/// Limits applied by the explanation facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainConfig {
    /// Deadline for one explanation, cache lookup included.
    /// Default: `30`
    #[serde(default = "default_explain_timeout")]
    pub timeout_seconds: u64,

    /// Selections must be shorter than this many characters.
    /// Default: `5000`
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for GemmaConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            model: default_model(),
            api_key: ApiKey::default(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_age_seconds: default_max_age(),
            key_prefix: default_key_prefix(),
            stats_key: default_stats_key(),
            key_hash: KeyHash::default(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_store_path(),
        }
    }
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_explain_timeout(),
            max_text_length: default_max_text_length(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemma-3-27b-it".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_max_entries() -> usize {
    1000
}

fn default_max_age() -> u64 {
    24 * 60 * 60
}

fn default_key_prefix() -> String {
    "explanium_cache_".to_string()
}

fn default_stats_key() -> String {
    "explanium_stats".to_string()
}

fn default_cleanup_interval() -> u64 {
    3600
}

fn default_store_path() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".explanium")
        .join("store.json")
        .to_string_lossy()
        .to_string()
}

fn default_explain_timeout() -> u64 {
    30
}

fn default_max_text_length() -> usize {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
