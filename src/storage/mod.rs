//! Persistent key-value store adapters.
//!
//! The explanation cache shares a single string-keyed store with unrelated
//! application data (settings, provider metadata). The store offers no
//! transactions across keys: every `set` and `remove` is applied key by key.
//!
//! # Backends
//!
//! - [`MemoryStore`]: process-local map, used by tests and the `memory` backend.
//! - [`FileStore`]: one JSON document on disk, rewritten after each mutation.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Async string-keyed store holding JSON values.
///
/// Implementations report failures as [`ExplainError::StoreUnavailable`](crate::error::ExplainError::StoreUnavailable).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the given keys. Missing keys are simply absent from the result.
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>>;

    /// Write every entry, overwriting existing values.
    async fn set(&self, entries: HashMap<String, Value>) -> Result<()>;

    /// Delete the given keys. Unknown keys are ignored.
    async fn remove(&self, keys: &[String]) -> Result<()>;

    /// Snapshot of the whole store.
    async fn get_all(&self) -> Result<HashMap<String, Value>>;
}

/// Open the store selected by configuration.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::File => Ok(Arc::new(FileStore::open(&config.path).await?)),
    }
}
