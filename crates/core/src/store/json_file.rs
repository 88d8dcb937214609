//! One-JSON-document-per-record store on the local filesystem.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::{ConversionStore, StoreError};
use crate::conversion::Conversion;

const EXTENSION: &str = "json";

/// Stores each record as `<dir>/<id>.json`.
///
/// Saves for one id are serialized through a per-id lock and written to a
/// temporary sibling that is renamed over the document, so concurrent
/// readers never observe a torn write.
pub struct JsonFileStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_id(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", id, EXTENSION)))
    }

    fn lock_for(&self, id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drops the lock entry once nobody else is waiting on it.
    fn release_lock(&self, id: &str, lock: &Arc<AsyncMutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held by the caller.
        if Arc::strong_count(lock) <= 2 {
            locks.remove(id);
        }
    }

    async fn write_document(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let tmp = path.with_extension(format!("{}.tmp", EXTENSION));
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }
}

/// Ids are generated as UUIDs; anything else cannot name a document.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[async_trait]
impl ConversionStore for JsonFileStore {
    async fn save(&self, conversion: &Conversion) -> Result<(), StoreError> {
        let id = conversion.id();
        let path = self.document_path(id)?;
        let bytes =
            serde_json::to_vec_pretty(conversion).map_err(|source| StoreError::Serialization {
                id: id.to_string(),
                source,
            })?;

        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().await;
            let result = self.write_document(&path, &bytes).await;
            self.release_lock(id, &lock);
            result
        };

        if result.is_ok() {
            debug!(id = %id, status = %conversion.status(), "Saved conversion document");
        }
        result
    }

    async fn load(&self, id: &str) -> Result<Conversion, StoreError> {
        let path = self.document_path(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(StoreError::Processing(id.to_string()));
        }
        serde_json::from_slice(&bytes).map_err(|_| StoreError::Processing(id.to_string()))
    }

    async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let path = match self.document_path(id) {
            Ok(path) => path,
            Err(_) => return Ok(false),
        };
        tokio::fs::try_exists(&path)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.document_path(id)?;
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let result = match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        };
        self.release_lock(id, &lock);
        result
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(io_err(source)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_id(stem) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}
