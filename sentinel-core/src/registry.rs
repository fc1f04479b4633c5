use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, warn};

/// Persisted user intent (`IntentDocument`).
pub const INTENT_DOC: &str = "intent.json";
/// Persisted device inventory (`DeviceRegistry`).
pub const DEVICE_REGISTRY_DOC: &str = "device_registry.json";
/// Persisted encoder telemetry snapshot (`StreamStats`).
pub const STREAM_STATS_DOC: &str = "stream_stats.json";

/// File-backed key→document store shared by the supervisors and the
/// command surface.
///
/// Every operation holds a per-document async mutex for its full
/// duration, so concurrent writers to the same document serialise while
/// writers to different documents proceed independently. Writes land in a
/// sibling temporary file and atomically replace the target, so a reader
/// in another process sees either the old or the new document, never a
/// torn one.
pub struct StateRegistry {
    base_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl StateRegistry {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        StateRegistry {
            base_dir: base_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn document_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    // The table is bounded by the set of document names, so entries are
    // never evicted.
    fn document_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Read a document, falling back to `default` when the file is
    /// missing or unreadable. Never fails to the caller.
    pub async fn read<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        let lock = self.document_lock(name);
        let _guard = lock.lock().await;
        self.read_unlocked(name, default).await
    }

    /// Serialise `value` as pretty JSON and atomically replace the
    /// document. Returns `false` on failure; the caller retries on its
    /// next tick.
    pub async fn write<T: Serialize>(&self, name: &str, value: &T) -> bool {
        let lock = self.document_lock(name);
        let _guard = lock.lock().await;
        self.write_unlocked(name, value).await
    }

    /// Read-modify-write merge of `patch`'s top-level keys into the
    /// document, all under one lock acquisition.
    pub async fn update(&self, name: &str, patch: Value) -> bool {
        let Value::Object(patch) = patch else {
            warn!("refusing non-object patch for {name}");
            return false;
        };

        let lock = self.document_lock(name);
        let _guard = lock.lock().await;

        let current = self.read_unlocked(name, Value::Null).await;
        let mut merged = match current {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        for (key, value) in patch {
            merged.insert(key, value);
        }
        self.write_unlocked(name, &Value::Object(merged)).await
    }

    async fn read_unlocked<T: DeserializeOwned>(
        &self,
        name: &str,
        default: T,
    ) -> T {
        let path = self.document_path(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return default;
            }
            Err(err) => {
                warn!("failed to read {}: {err}", path.display());
                return default;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "failed to parse {}: {err}; returning default",
                    path.display()
                );
                default
            }
        }
    }

    async fn write_unlocked<T: Serialize>(&self, name: &str, value: &T) -> bool {
        let path = self.document_path(name);
        let bytes = match serde_json::to_vec_pretty(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("failed to serialise {name}: {err}");
                return false;
            }
        };

        let dir = self.base_dir.clone();
        if let Err(err) = tokio::fs::create_dir_all(&dir).await {
            error!("failed to create {}: {err}", dir.display());
            return false;
        }

        // Tempfile-then-rename keeps cross-process readers torn-free.
        let result =
            tokio::task::spawn_blocking(move || -> std::io::Result<()> {
                let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
                tmp.write_all(&bytes)?;
                tmp.flush()?;
                tmp.persist(&path).map_err(|persist| persist.error)?;
                Ok(())
            })
            .await;

        match result {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                error!("failed to write {name}: {err}");
                false
            }
            Err(err) => {
                error!("write task for {name} failed: {err}");
                false
            }
        }
    }
}
