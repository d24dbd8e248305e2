// JSON file key-value store
// Author: kelexine (https://github.com/kelexine)

use super::KeyValueStore;
use crate::error::{ExplainError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Key-value store persisted as a single JSON object.
///
/// The document is read once at [`FileStore::open`] and kept in memory.
/// Every mutation rewrites the file through a sibling temp file followed by
/// a rename, so a crash leaves either the old or the new document.
pub struct FileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, Value>>,
}

impl FileStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| unavailable(&path, e))?;
            }
        }

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ExplainError::StoreUnavailable(format!(
                    "corrupt store file {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Creating new store at {}", path.display());
                HashMap::new()
            }
            Err(e) => return Err(unavailable(&path, e)),
        };

        debug!("Opened store {} with {} keys", path.display(), data.len());

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &HashMap<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec(data)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| unavailable(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| unavailable(&self.path, e))?;
        Ok(())
    }
}

/// Undo in-memory changes after the file could not be rewritten.
fn restore(data: &mut HashMap<String, Value>, previous: Vec<(String, Option<Value>)>) {
    for (key, old) in previous.into_iter().rev() {
        match old {
            Some(value) => {
                data.insert(key, value);
            }
            None => {
                data.remove(&key);
            }
        }
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> ExplainError {
    ExplainError::StoreUnavailable(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let data = self.data.lock().await;
        Ok(keys
            .iter()
            .filter_map(|k| data.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        let mut data = self.data.lock().await;
        let previous: Vec<(String, Option<Value>)> = entries
            .into_iter()
            .map(|(k, v)| {
                let old = data.insert(k.clone(), v);
                (k, old)
            })
            .collect();

        if let Err(e) = self.persist(&data).await {
            restore(&mut data, previous);
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let mut data = self.data.lock().await;
        let previous: Vec<(String, Option<Value>)> = keys
            .iter()
            .filter_map(|k| data.remove(k).map(|old| (k.clone(), Some(old))))
            .collect();
        if previous.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.persist(&data).await {
            restore(&mut data, previous);
            return Err(e);
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<HashMap<String, Value>> {
        Ok(self.data.lock().await.clone())
    }
}
