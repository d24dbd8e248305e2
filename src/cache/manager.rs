// Explanation cache - bounded, expiring response cache over a shared store
// Author: kelexine (https://github.com/kelexine)

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::key::derive_key;
use crate::cache::models::{
    CacheConfig, CacheEntry, CacheStatistics, CachedResult, ClearResult, StatisticsReport,
};
use crate::error::Result;
use crate::metrics;
use crate::storage::KeyValueStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, info, warn};

/// Persistent explanation cache.
///
/// Entries live in the injected [`KeyValueStore`] under
/// [`CacheConfig::key_prefix`]; the cache never reads or writes keys outside
/// that namespace except its own statistics record. Storage failures are
/// logged and degrade to a miss or a no-op, so `get`, `set` and the expiry
/// sweep never fail.
///
/// Statistics are authoritative in memory and written back after every
/// mutation, in the same store write as the entry change when there is one.
/// Concurrent callers may persist snapshots out of order; the next
/// [`initialize`](Self::initialize) reconciles `cache_size` against the store.
///
/// Writes to the entry namespace (store, overwrite, access-count update,
/// eviction, expiry, clear) are serialized, and each re-reads the entry it
/// acts on. A hit never brings back an entry that was cleared or evicted
/// after it was read, and never overwrites a newer explanation.
pub struct ExplanationCache {
    config: CacheConfig,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    stats: RwLock<CacheStatistics>,
    writes: Mutex<()>,
    initialized: OnceCell<()>,
}

impl ExplanationCache {
    /// Create a cache using the system clock
    pub fn new(config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: CacheConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            clock,
            stats: RwLock::new(CacheStatistics::default()),
            writes: Mutex::new(()),
            initialized: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store key used for `text`
    pub fn key_for(&self, text: &str) -> String {
        derive_key(&self.config.key_prefix, text, self.config.key_hash)
    }

    /// Load persisted statistics, reconcile the entry count, sweep expired
    /// entries. Runs once; concurrent callers wait for the same run.
    pub async fn initialize(&self) {
        self.initialized.get_or_init(|| self.load()).await;
    }

    async fn load(&self) {
        match self.store.get(std::slice::from_ref(&self.config.stats_key)).await {
            Ok(mut found) => {
                if let Some(value) = found.remove(&self.config.stats_key) {
                    match serde_json::from_value::<CacheStatistics>(value) {
                        Ok(persisted) => *self.stats.write().await = persisted,
                        Err(e) => warn!("Ignoring unreadable cache statistics: {}", e),
                    }
                }
            }
            Err(e) => {
                warn!("Failed to load cache statistics: {}", e);
                metrics::record_cache_store_error();
            }
        }

        let expired = {
            let _writes = self.writes.lock().await;
            self.sweep_expired().await
        };

        match self.namespaced_entries().await {
            Ok(entries) => {
                let live = entries.len() as u64;
                let mut stats = self.stats.write().await;
                if stats.cache_size != live {
                    debug!(
                        "Reconciling cache size: recorded {}, found {}",
                        stats.cache_size, live
                    );
                }
                stats.cache_size = live;
            }
            Err(e) => warn!("Failed to count cache entries: {}", e),
        }

        self.persist_stats().await;

        let stats = self.stats.read().await;
        info!(
            "Explanation cache ready: {} entries, {} expired removed, {} hits / {} misses recorded",
            stats.cache_size, expired, stats.hits, stats.misses
        );
    }

    /// Look up a fresh explanation for `text`.
    ///
    /// Expired or malformed entries are deleted and reported as a miss.
    pub async fn get(&self, text: &str) -> Option<CachedResult> {
        self.initialize().await;

        let key = self.key_for(text);
        let found = match self.read_entry(&key).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Cache lookup failed, treating as miss: {}", e);
                metrics::record_cache_store_error();
                None
            }
        };

        let Some(value) = found else {
            debug!("Cache miss: {}", key);
            self.record_miss().await;
            return None;
        };

        let now = self.clock.now_millis();
        match serde_json::from_value::<CacheEntry>(value) {
            Ok(entry) if !self.is_expired(&entry, now) => {
                debug!("Cache hit: {} (age {} ms)", key, now - entry.created_at);
                self.stats.write().await.hits += 1;
                metrics::record_cache_hit();

                let result = CachedResult {
                    explanation: entry.explanation,
                    from_cache: true,
                    cache_timestamp: entry.created_at,
                    model: entry.model,
                };
                self.touch(&key, result.cache_timestamp).await;

                Some(result)
            }
            Ok(_) => {
                debug!("Cache entry expired: {}", key);
                self.discard_stale(&key).await;
                self.record_miss().await;
                None
            }
            Err(e) => {
                warn!("Discarding malformed cache entry {}: {}", key, e);
                self.discard_stale(&key).await;
                self.record_miss().await;
                None
            }
        }
    }

    /// Store `explanation` for `text`, evicting the oldest entries first when
    /// the cache is full. Re-storing an existing text overwrites its entry.
    pub async fn set(&self, text: &str, explanation: &str) {
        self.set_with_model(text, explanation, None).await;
    }

    /// [`set`](Self::set), recording which model produced the explanation.
    pub async fn set_with_model(&self, text: &str, explanation: &str, model: Option<&str>) {
        self.initialize().await;
        let _writes = self.writes.lock().await;

        let key = self.key_for(text);
        let exists = match self.read_entry(&key).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!("Cache existence check failed for {}: {}", key, e);
                false
            }
        };

        if !exists {
            let size = self.stats.read().await.cache_size;
            if size >= self.config.max_entries as u64 {
                self.evict_oldest().await;
            }
        }

        let entry = CacheEntry {
            key: key.clone(),
            source_text: text.to_string(),
            explanation: explanation.to_string(),
            created_at: self.clock.now_millis(),
            access_count: 1,
            model: model.map(str::to_string),
        };
        let value = match serde_json::to_value(&entry) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };

        let mut projected = self.stats.read().await.clone();
        if !exists {
            projected.cache_size += 1;
        }

        if let Err(e) = self
            .write_with_stats(HashMap::from([(key.clone(), value)]), &projected)
            .await
        {
            warn!("Failed to store cache entry {}: {}", key, e);
            metrics::record_cache_store_error();
            return;
        }

        if !exists {
            self.stats.write().await.cache_size += 1;
        }
        metrics::record_cache_store();
        debug!("Cached explanation: {}", key);
    }

    /// Delete every cache entry. Statistics other than `cache_size` are kept.
    pub async fn clear(&self) -> Result<ClearResult> {
        self.initialize().await;
        let _writes = self.writes.lock().await;

        let keys: Vec<String> = self
            .store
            .get_all()
            .await
            .inspect_err(|_| metrics::record_cache_store_error())?
            .into_keys()
            .filter(|k| self.config.owns(k))
            .collect();

        if !keys.is_empty() {
            self.store
                .remove(&keys)
                .await
                .inspect_err(|_| metrics::record_cache_store_error())?;
        }

        self.stats.write().await.cache_size = 0;
        self.persist_stats().await;

        info!("Cache cleared: {} entries removed", keys.len());
        Ok(ClearResult {
            cleared_entries: keys.len(),
        })
    }

    /// Snapshot of the statistics with the derived hit rate
    pub async fn get_statistics(&self) -> StatisticsReport {
        self.initialize().await;
        self.stats.read().await.clone().into()
    }

    /// Count one call to the explanation provider
    pub async fn record_api_call(&self) {
        self.initialize().await;
        self.stats.write().await.api_calls += 1;
        self.persist_stats().await;
    }

    /// Remove every expired or malformed entry. Returns how many were removed.
    pub async fn cleanup_expired_entries(&self) -> usize {
        self.initialize().await;
        let _writes = self.writes.lock().await;
        let removed = self.sweep_expired().await;
        if removed > 0 {
            self.persist_stats().await;
        }
        removed
    }

    fn is_expired(&self, entry: &CacheEntry, now: i64) -> bool {
        let max_age = i64::try_from(self.config.max_age.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(entry.created_at) >= max_age
    }

    /// Namespaced entries; `None` marks a value that does not parse as an entry
    async fn namespaced_entries(&self) -> Result<Vec<(String, Option<CacheEntry>)>> {
        let all = self.store.get_all().await?;
        Ok(all
            .into_iter()
            .filter(|(k, _)| self.config.owns(k))
            .map(|(k, v)| {
                let entry = serde_json::from_value::<CacheEntry>(v).ok();
                (k, entry)
            })
            .collect())
    }

    /// Caller holds `writes`.
    async fn sweep_expired(&self) -> usize {
        let entries = match self.namespaced_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Expiry sweep skipped: {}", e);
                metrics::record_cache_store_error();
                return 0;
            }
        };

        let now = self.clock.now_millis();
        let expired: Vec<String> = entries
            .into_iter()
            .filter(|(_, entry)| match entry {
                Some(entry) => self.is_expired(entry, now),
                None => true,
            })
            .map(|(k, _)| k)
            .collect();

        if expired.is_empty() {
            return 0;
        }

        if let Err(e) = self.store.remove(&expired).await {
            warn!("Failed to remove {} expired entries: {}", expired.len(), e);
            metrics::record_cache_store_error();
            return 0;
        }

        {
            let mut stats = self.stats.write().await;
            stats.cache_size = stats.cache_size.saturating_sub(expired.len() as u64);
        }
        metrics::record_cache_expired(expired.len());
        info!("Removed {} expired cache entries", expired.len());
        expired.len()
    }

    /// Two-phase capacity eviction: rank live entries by `created_at`, then
    /// delete the oldest tenth (at least enough to make room) in one batch.
    ///
    /// A crash between the phases only leaves `cache_size` stale, which the
    /// next `initialize` corrects. Caller holds `writes`.
    async fn evict_oldest(&self) -> usize {
        let entries = match self.namespaced_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Eviction skipped: {}", e);
                metrics::record_cache_store_error();
                return 0;
            }
        };

        let live = entries.len();
        if live < self.config.max_entries {
            // Recorded size drifted above the real count; nothing to evict.
            self.stats.write().await.cache_size = live as u64;
            return 0;
        }

        let count = (live / 10).max(live + 1 - self.config.max_entries).max(1);

        // Malformed entries rank first.
        let mut ranked: Vec<(i64, String)> = entries
            .into_iter()
            .map(|(k, entry)| (entry.map(|e| e.created_at).unwrap_or(i64::MIN), k))
            .collect();
        ranked.sort();

        let victims: Vec<String> = ranked.into_iter().take(count).map(|(_, k)| k).collect();

        if let Err(e) = self.store.remove(&victims).await {
            warn!("Failed to evict {} entries: {}", victims.len(), e);
            metrics::record_cache_store_error();
            return 0;
        }

        self.stats.write().await.cache_size = (live - victims.len()) as u64;
        metrics::record_cache_evicted(victims.len());
        debug!("Evicted {} oldest cache entries", victims.len());
        victims.len()
    }

    async fn read_entry(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.store.get(&[key.to_string()]).await?.remove(key))
    }

    /// Bump `access_count` of the entry that served a hit, persisting the
    /// statistics in the same write. The count is left alone when the entry
    /// was removed or replaced after the hit read it.
    async fn touch(&self, key: &str, created_at: i64) {
        let _writes = self.writes.lock().await;

        let current = match self.read_entry(key).await {
            Ok(Some(value)) => serde_json::from_value::<CacheEntry>(value)
                .ok()
                .filter(|entry| entry.created_at == created_at),
            Ok(None) => None,
            Err(e) => {
                debug!("Failed to re-read {} for access count: {}", key, e);
                None
            }
        };

        let mut batch = HashMap::new();
        match current {
            Some(entry) => {
                let touched = CacheEntry {
                    access_count: entry.access_count.saturating_add(1),
                    ..entry
                };
                if let Ok(value) = serde_json::to_value(&touched) {
                    batch.insert(key.to_string(), value);
                }
            }
            None => debug!("Entry {} changed after hit; access count not updated", key),
        }

        let snapshot = self.stats.read().await.clone();
        if let Err(e) = self.write_with_stats(batch, &snapshot).await {
            debug!("Failed to update access count for {}: {}", key, e);
            metrics::record_cache_store_error();
        }
    }

    /// Delete an expired or malformed entry found by a lookup, unless it was
    /// replaced by a fresh one in the meantime. Caller must not hold `writes`.
    async fn discard_stale(&self, key: &str) {
        let _writes = self.writes.lock().await;

        match self.read_entry(key).await {
            Ok(None) => return,
            Ok(Some(value)) => {
                if let Ok(entry) = serde_json::from_value::<CacheEntry>(value) {
                    if !self.is_expired(&entry, self.clock.now_millis()) {
                        debug!("Entry {} was refreshed before it could be discarded", key);
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("Failed to re-read stale cache entry {}: {}", key, e);
                metrics::record_cache_store_error();
                return;
            }
        }

        match self.store.remove(&[key.to_string()]).await {
            Ok(()) => {
                let mut stats = self.stats.write().await;
                stats.cache_size = stats.cache_size.saturating_sub(1);
                metrics::record_cache_expired(1);
            }
            Err(e) => {
                warn!("Failed to delete stale cache entry {}: {}", key, e);
                metrics::record_cache_store_error();
            }
        }
    }

    async fn record_miss(&self) {
        self.stats.write().await.misses += 1;
        metrics::record_cache_miss();
        self.persist_stats().await;
    }

    /// Write `entries` together with the statistics record in one store call
    async fn write_with_stats(
        &self,
        mut entries: HashMap<String, Value>,
        stats: &CacheStatistics,
    ) -> Result<()> {
        entries.insert(self.config.stats_key.clone(), serde_json::to_value(stats)?);
        self.store.set(entries).await?;
        metrics::update_cache_entries(stats.cache_size);
        Ok(())
    }

    async fn persist_stats(&self) {
        let snapshot = self.stats.read().await.clone();
        if let Err(e) = self.write_with_stats(HashMap::new(), &snapshot).await {
            debug!("Failed to persist cache statistics: {}", e);
            metrics::record_cache_store_error();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn cache_with(
        config: CacheConfig,
    ) -> (ExplanationCache, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let cache = ExplanationCache::with_clock(config, store.clone(), clock.clone());
        (cache, store, clock)
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let (cache, store, clock) = cache_with(CacheConfig::default());

        cache.set("Entropy", "first").await;
        clock.advance(Duration::from_millis(5));
        cache.set("  entropy ", "second").await;

        let stats = cache.get_statistics().await;
        assert_eq!(stats.stats.cache_size, 1);

        let hit = cache.get("ENTROPY").await.unwrap();
        assert_eq!(hit.explanation, "second");

        // one entry + statistics record
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_hit_bumps_access_count() {
        let (cache, store, _clock) = cache_with(CacheConfig::default());
        cache.set("photon", "a quantum of light").await;
        cache.get("photon").await.unwrap();
        cache.get("photon").await.unwrap();

        let key = cache.key_for("photon");
        let raw = store.get(&[key.clone()]).await.unwrap();
        let entry: CacheEntry = serde_json::from_value(raw[&key].clone()).unwrap();
        assert_eq!(entry.access_count, 3);
        assert_eq!(entry.source_text, "photon");
    }

    #[tokio::test]
    async fn test_malformed_entry_is_discarded() {
        let (cache, store, _clock) = cache_with(CacheConfig::default());
        let key = cache.key_for("broken");
        store
            .set(HashMap::from([(key.clone(), json!({"explanation": "no timestamp"}))]))
            .await
            .unwrap();

        assert!(cache.get("broken").await.is_none());
        assert!(store.get(&[key]).await.unwrap().is_empty());
        assert_eq!(cache.get_statistics().await.stats.misses, 1);
    }

    #[tokio::test]
    async fn test_eviction_catches_up_when_far_over_capacity() {
        let (cache, store, clock) = cache_with(CacheConfig::default().max_entries(3));

        // Six entries written by an earlier, larger configuration.
        let mut seeded = HashMap::new();
        for i in 0..6 {
            let key = cache.key_for(&format!("text {}", i));
            let entry = CacheEntry {
                key: key.clone(),
                source_text: format!("text {}", i),
                explanation: "x".to_string(),
                created_at: clock.now_millis() + i,
                access_count: 1,
                model: None,
            };
            seeded.insert(key, serde_json::to_value(entry).unwrap());
        }
        store.set(seeded).await.unwrap();

        cache.set("newcomer", "y").await;

        let live = store
            .get_all()
            .await
            .unwrap()
            .keys()
            .filter(|k| cache.config().owns(k))
            .count();
        assert_eq!(live, 3);
        assert!(cache.get("text 5").await.is_some());
        assert!(cache.get("text 0").await.is_none());
    }

    #[tokio::test]
    async fn test_hit_rate_formatting() {
        let (cache, _store, _clock) = cache_with(CacheConfig::default());
        assert_eq!(cache.get_statistics().await.hit_rate, "0%");

        cache.set("a", "b").await;
        cache.get("a").await;
        cache.get("a").await;
        cache.get("missing").await;

        let report = cache.get_statistics().await;
        assert_eq!(report.stats.hits, 2);
        assert_eq!(report.stats.misses, 1);
        assert_eq!(report.hit_rate, "66.7%");

        // 1 hit in 16 lookups is exactly 6.25%, which rounds up.
        let (cache, _store, _clock) = cache_with(CacheConfig::default());
        cache.set("a", "b").await;
        cache.get("a").await;
        for i in 0..15 {
            cache.get(&format!("absent {}", i)).await;
        }
        assert_eq!(cache.get_statistics().await.hit_rate, "6.3%");
    }

    #[tokio::test]
    async fn test_access_count_skips_replaced_entry() {
        let (cache, store, clock) = cache_with(CacheConfig::default());
        cache.set("photon", "old").await;
        let key = cache.key_for("photon");
        let stale = cache.read_entry(&key).await.unwrap().unwrap();
        let stale: CacheEntry = serde_json::from_value(stale).unwrap();

        clock.advance(Duration::from_millis(10));
        cache.set_with_model("photon", "new", Some("gemma-3-27b-it")).await;

        // A hit that read the old entry must not write it back.
        cache.touch(&key, stale.created_at).await;
        let raw = store.get(&[key.clone()]).await.unwrap();
        let entry: CacheEntry = serde_json::from_value(raw[&key].clone()).unwrap();
        assert_eq!(entry.explanation, "new");
        assert_eq!(entry.access_count, 1);
        assert_eq!(entry.model.as_deref(), Some("gemma-3-27b-it"));

        // Nor recreate it once cleared.
        cache.clear().await.unwrap();
        cache.touch(&key, entry.created_at).await;
        assert!(store.get(&[key]).await.unwrap().is_empty());
        assert_eq!(cache.clear().await.unwrap().cleared_entries, 0);
    }

    #[tokio::test]
    async fn test_hit_reports_recorded_model() {
        let (cache, _store, _clock) = cache_with(CacheConfig::default());
        cache.set_with_model("quark", "an elementary particle", Some("gemma-3-27b-it")).await;
        cache.set("lepton", "another one").await;

        assert_eq!(cache.get("quark").await.unwrap().model.as_deref(), Some("gemma-3-27b-it"));
        assert!(cache.get("lepton").await.unwrap().model.is_none());
    }
}
