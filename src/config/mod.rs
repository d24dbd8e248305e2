// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{ExplainError, Result};
use config::{Config, Environment, File};
use std::path::PathBuf;

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest, `EXPLANIUM__CACHE__MAX_ENTRIES`)
    /// 2. Config file
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name(&Self::default_config_path()).required(false))
            .add_source(
                Environment::with_prefix("EXPLANIUM")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| ExplainError::Config(e.to_string()))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| ExplainError::Config(e.to_string()))?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject settings the cache cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            return Err(ExplainError::Config(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        if self.cache.max_age_seconds == 0 {
            return Err(ExplainError::Config(
                "cache.max_age_seconds must be greater than 0".to_string(),
            ));
        }
        if self.cache.key_prefix.is_empty() {
            return Err(ExplainError::Config(
                "cache.key_prefix must not be empty".to_string(),
            ));
        }
        // The statistics record must not be counted as a cache entry.
        if self.cache.stats_key.starts_with(&self.cache.key_prefix) {
            return Err(ExplainError::Config(format!(
                "cache.stats_key '{}' must not start with cache.key_prefix '{}'",
                self.cache.stats_key, self.cache.key_prefix
            )));
        }
        if self.explain.max_text_length == 0 {
            return Err(ExplainError::Config(
                "explain.max_text_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".explanium")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}
