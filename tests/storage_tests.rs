// File-backed store tests
// Author: kelexine (https://github.com/kelexine)

use explanium::cache::{CacheConfig, ExplanationCache};
use explanium::config::{StorageBackend, StorageConfig};
use explanium::error::ExplainError;
use explanium::storage::{self, FileStore, KeyValueStore};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.json");

    {
        let store = FileStore::open(&path).await.unwrap();
        store
            .set(HashMap::from([
                ("a".to_string(), json!({"n": 1})),
                ("b".to_string(), json!("two")),
            ]))
            .await
            .unwrap();
        store.remove(&["b".to_string()]).await.unwrap();
    }

    let reopened = FileStore::open(&path).await.unwrap();
    let all = reopened.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all["a"], json!({"n": 1}));
}

#[tokio::test]
async fn test_corrupt_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, b"{not json").unwrap();

    match FileStore::open(&path).await {
        Err(ExplainError::StoreUnavailable(msg)) => assert!(msg.contains("corrupt")),
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("corrupt store should not open"),
    }
}

#[tokio::test]
async fn test_cache_persists_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    {
        let store = Arc::new(FileStore::open(&path).await.unwrap());
        let cache = ExplanationCache::new(CacheConfig::default(), store);
        cache.set("Photosynthesis", "Plants turning light into sugar.").await;
        assert!(cache.get("photosynthesis").await.is_some());
    }

    let store = Arc::new(FileStore::open(&path).await.unwrap());
    let cache = ExplanationCache::new(CacheConfig::default(), store);
    cache.initialize().await;

    let stats = cache.get_statistics().await.stats;
    assert_eq!(stats.cache_size, 1);
    assert_eq!(stats.hits, 1);

    let hit = cache.get("PHOTOSYNTHESIS").await.unwrap();
    assert_eq!(hit.explanation, "Plants turning light into sugar.");
}

#[tokio::test]
async fn test_open_selects_backend() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        backend: StorageBackend::File,
        path: dir.path().join("store.json").to_string_lossy().to_string(),
    };
    let store = storage::open(&config).await.unwrap();
    store
        .set(HashMap::from([("k".to_string(), json!(true))]))
        .await
        .unwrap();
    assert!(dir.path().join("store.json").exists());

    let memory = storage::open(&StorageConfig {
        backend: StorageBackend::Memory,
        ..config
    })
    .await
    .unwrap();
    assert!(memory.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_write_leaves_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let parent = dir.path().join("data");
    let path = parent.join("store.json");

    let store = FileStore::open(&path).await.unwrap();
    store
        .set(HashMap::from([("kept".to_string(), json!(1))]))
        .await
        .unwrap();

    // Replace the directory with a plain file so the next rewrite fails.
    std::fs::remove_dir_all(&parent).unwrap();
    std::fs::write(&parent, b"not a directory").unwrap();

    let failed = store
        .set(HashMap::from([
            ("kept".to_string(), json!(2)),
            ("added".to_string(), json!(3)),
        ]))
        .await;
    assert!(matches!(failed, Err(ExplainError::StoreUnavailable(_))));
    assert!(store.remove(&["kept".to_string()]).await.is_err());

    let all = store.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all["kept"], json!(1));
}
