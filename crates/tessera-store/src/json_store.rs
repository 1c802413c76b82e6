//! Concurrency-safe JSON document persistence.
//!
//! Each logical path (`pending.json`, `archived.json`, `queue.json`) is a
//! single JSON document under the state directory. Writers to the same path
//! are serialized by a per-path async mutex, and every write is a
//! read-modify-write of the current on-disk state so that concurrent writers
//! merge instead of overwriting each other. Readers reload from disk on every
//! call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use tessera_core::{Error, Result};

/// JSON key-value store rooted at a state directory.
pub struct JsonStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// State directory backing this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    async fn lock_for(&self, path: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load the document at `path`, or `T::default()` when it does not exist yet.
    pub async fn load<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let full_path = self.full_path(path);
        let bytes = match fs::read(&full_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => {
                warn!(store_path = %path, error = %e, "json_store: read failed");
                return Err(Error::Persistence(format!("read {}: {}", path, e)));
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(store_path = %path, error = %e, "json_store: parse failed");
            Error::Persistence(format!("parse {}: {}", path, e))
        })
    }

    /// Read-modify-write under the path lock.
    ///
    /// The closure always sees the current on-disk state, including writes
    /// that completed while this caller was waiting for the lock. The
    /// document is written only when the closure returns `Ok`.
    #[instrument(skip(self, f), fields(store_path = %path))]
    pub async fn update<T, F, R>(&self, path: &str, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> Result<R>,
    {
        let lock = self.lock_for(path).await;
        let _guard = lock.lock().await;

        let mut state: T = self.load(path).await?;
        let out = f(&mut state)?;
        self.write_unlocked(path, &state).await?;
        debug!("json_store: update committed");
        Ok(out)
    }

    async fn write_unlocked<T: Serialize>(&self, path: &str, value: &T) -> Result<()> {
        let full_path = self.full_path(path);
        let data = serde_json::to_vec_pretty(value)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "json_store: create_dir_all failed");
                Error::Persistence(format!("create {}: {}", parent.display(), e))
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("json.tmp");
        let persist = |e: std::io::Error| {
            warn!(store_path = %path, error = %e, "json_store: write failed");
            Error::Persistence(format!("write {}: {}", path, e))
        };
        let mut file = fs::File::create(&temp_path).await.map_err(persist)?;
        file.write_all(&data).await.map_err(persist)?;
        file.sync_all().await.map_err(persist)?;
        drop(file);
        fs::rename(&temp_path, &full_path).await.map_err(persist)?;
        Ok(())
    }
}
