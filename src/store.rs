//! Key-value persistence for reader preferences.
//!
//! Records are stored as JSON strings under a named key. The on-disk backend
//! keeps one file per key under the store directory, named by a hash of the
//! key so arbitrary key strings stay filesystem-safe. Read and write failures
//! never escape [`PreferenceStore`]: they are logged and reported as "absent"
//! or "not saved" so the reader keeps running on in-memory state.

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Process-external string store (the platform's local storage).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl KeyValueStore for Box<dyn KeyValueStore> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Filesystem-backed store: `<dir>/<sha256(key)>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(err) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), "Failed to create preference store dir: {err}");
        }
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        self.dir.join(format!("{hash}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Reading {}", path.display())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Creating {}", self.dir.display()))?;
        let temp = unique_temp_path(&path);
        fs::write(&temp, value).with_context(|| format!("Writing {}", temp.display()))?;
        if let Err(err) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(err).with_context(|| format!("Replacing {}", path.display()));
        }
        Ok(())
    }
}

fn unique_temp_path(path: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nonce = SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("record.json")
        .to_string();
    name.push_str(&format!(".tmp-{}-{nonce}", std::process::id()));
    path.with_file_name(name)
}

/// In-memory store, also used as a stand-in when no directory is writable.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose reads and writes always error.
    #[cfg(test)]
    pub fn failing() -> Self {
        Self {
            entries: HashMap::new(),
            failing: true,
        }
    }

    #[cfg(test)]
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.failing {
            return Err(anyhow!("memory store unavailable"));
        }
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.failing {
            return Err(anyhow!("memory store unavailable"));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed, failure-tolerant view over a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct PreferenceStore<S> {
    backend: S,
}

impl<S: KeyValueStore> PreferenceStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Read and decode a record. Absent, unreadable and corrupt records all
    /// come back as `None`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "No stored record");
                return None;
            }
            Err(err) => {
                warn!(key, "Failed to read stored record: {err:#}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, "Ignoring unparsable stored record: {err}");
                None
            }
        }
    }

    /// Encode and write a record. Returns whether the write landed.
    pub fn save<T: Serialize>(&mut self, key: &str, value: &T) -> bool {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, "Failed to encode record: {err}");
                return false;
            }
        };
        match self.backend.set(key, &encoded) {
            Ok(()) => {
                debug!(key, bytes = encoded.len(), "Persisted record");
                true
            }
            Err(err) => {
                warn!(key, "Failed to persist record: {err:#}");
                false
            }
        }
    }

    /// Shallow-merge an object patch into the stored object and write it back.
    /// A missing or non-object stored value is replaced by the patch.
    pub fn merge(&mut self, key: &str, patch: Value) -> Option<Value> {
        let Value::Object(patch) = patch else {
            warn!(key, "Refusing to merge a non-object patch");
            return None;
        };
        let mut merged = match self.load::<Value>(key) {
            Some(Value::Object(existing)) => existing,
            _ => serde_json::Map::new(),
        };
        for (field, value) in patch {
            merged.insert(field, value);
        }
        let merged = Value::Object(merged);
        if self.save(key, &merged) {
            Some(merged)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn corrupt_record_reads_as_absent() {
        let mut backend = MemoryStore::new();
        backend.set("prefs", "{not json").expect("memory write");
        let store = PreferenceStore::new(backend);
        assert_eq!(store.load::<Value>("prefs"), None);
    }

    #[test]
    fn failing_backend_never_errors_out() {
        let mut store = PreferenceStore::new(MemoryStore::failing());
        assert_eq!(store.load::<Value>("prefs"), None);
        assert!(!store.save("prefs", &json!({"fontSize": 20})));
        assert_eq!(store.merge("prefs", json!({"fontSize": 20})), None);
    }

    #[test]
    fn merge_overlays_fields() {
        let mut store = PreferenceStore::new(MemoryStore::new());
        assert!(store.save("prefs", &json!({"fontSize": 18, "background": "#fff8f5"})));
        let merged = store
            .merge("prefs", json!({"fontSize": 22}))
            .expect("merge succeeds");
        assert_eq!(merged, json!({"fontSize": 22, "background": "#fff8f5"}));
        assert_eq!(store.load::<Value>("prefs"), Some(merged));
    }

    #[test]
    fn file_store_round_trips_and_hashes_keys() {
        let dir = std::env::temp_dir().join(format!("txt-reader-store-{}", std::process::id()));
        let mut store = FileStore::open(&dir);
        assert_eq!(store.get("reader/settings").expect("read"), None);
        store.set("reader/settings", "{\"a\":1}").expect("write");
        assert_eq!(
            store.get("reader/settings").expect("read").as_deref(),
            Some("{\"a\":1}")
        );
        let names: Vec<String> = fs::read_dir(&dir)
            .expect("list store dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().all(|name| !name.contains('/') && name.ends_with(".json")));
        let _ = fs::remove_dir_all(&dir);
    }
}
