//! Cache configuration, persisted entry, and statistics models.

// Author: kelexine (https://github.com/kelexine)

use crate::config::{CacheSettings, KeyHash};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the explanation cache. Immutable once the cache is built.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of live entries kept in the store.
    pub max_entries: usize,
    /// Entries at least this old are treated as absent.
    pub max_age: Duration,
    /// Namespace distinguishing cache entries from other data in the store.
    pub key_prefix: String,
    /// Store key holding the persisted [`CacheStatistics`].
    pub stats_key: String,
    /// Hash used by the key deriver.
    pub key_hash: KeyHash,
}

impl Default for CacheConfig {
    /// - `max_entries`: 1000
    /// - `max_age`: 24 hours
    /// - `key_prefix`: `explanium_cache_`
    /// - `stats_key`: `explanium_stats`
    fn default() -> Self {
        Self::from(&CacheSettings::default())
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries,
            max_age: Duration::from_secs(settings.max_age_seconds),
            key_prefix: settings.key_prefix.clone(),
            stats_key: settings.stats_key.clone(),
            key_hash: settings.key_hash,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn stats_key(mut self, key: impl Into<String>) -> Self {
        self.stats_key = key.into();
        self
    }

    pub fn key_hash(mut self, key_hash: KeyHash) -> Self {
        self.key_hash = key_hash;
        self
    }

    /// Whether `key` belongs to the cache's entry namespace.
    pub fn owns(&self, key: &str) -> bool {
        key.starts_with(&self.key_prefix) && key != self.stats_key
    }
}

/// One cached explanation as persisted in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    /// Text that produced the explanation, kept for diagnostics.
    pub source_text: String,
    pub explanation: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Number of reads served by this entry. Informational only: eviction
    /// is by insertion order.
    pub access_count: u64,
    /// Model that produced the explanation. Absent in entries written
    /// before it was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Hit/miss bookkeeping, persisted under [`CacheConfig::stats_key`].
///
/// Missing fields in a persisted record fall back to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub api_calls: u64,
    pub cache_size: u64,
}

impl CacheStatistics {
    /// Hit rate as a percentage string with one decimal, `"0%"` before any lookup.
    ///
    /// Ties round up (`6.25` → `"6.3%"`), computed on integers so the tenth
    /// digit does not depend on float representation.
    pub fn hit_rate(&self) -> String {
        let lookups = u128::from(self.hits) + u128::from(self.misses);
        if lookups == 0 {
            return "0%".to_string();
        }
        let tenths = (u128::from(self.hits) * 2000 + lookups) / (2 * lookups);
        format!("{}.{}%", tenths / 10, tenths % 10)
    }
}

/// Statistics snapshot handed to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    #[serde(flatten)]
    pub stats: CacheStatistics,
    pub hit_rate: String,
}

impl From<CacheStatistics> for StatisticsReport {
    fn from(stats: CacheStatistics) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// A fresh cache hit.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedResult {
    pub explanation: String,
    pub from_cache: bool,
    /// `created_at` of the entry that served the hit.
    pub cache_timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Outcome of [`ExplanationCache::clear`](super::ExplanationCache::clear).
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClearResult {
    pub cleared_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(hits: u64, misses: u64) -> String {
        CacheStatistics {
            hits,
            misses,
            ..Default::default()
        }
        .hit_rate()
    }

    #[test]
    fn test_hit_rate_rounds_ties_up() {
        assert_eq!(rate(1, 15), "6.3%");
        assert_eq!(rate(1, 7), "12.5%");
        assert_eq!(rate(3, 13), "18.8%");
        assert_eq!(rate(1, 399), "0.3%");
    }

    #[test]
    fn test_hit_rate_edges() {
        assert_eq!(rate(0, 0), "0%");
        assert_eq!(rate(0, 4), "0.0%");
        assert_eq!(rate(4, 0), "100.0%");
        assert_eq!(rate(1, 2), "33.3%");
        assert_eq!(rate(2, 1), "66.7%");
        assert_eq!(rate(3, 5), "37.5%");
    }

    #[test]
    fn test_entry_without_model_still_parses() {
        let value = serde_json::json!({
            "key": "explanium_cache_1_1_a",
            "sourceText": "a",
            "explanation": "b",
            "createdAt": 5,
            "accessCount": 1
        });
        let entry: CacheEntry = serde_json::from_value(value).unwrap();
        assert!(entry.model.is_none());
    }
}
