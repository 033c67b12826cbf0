// src/store.rs
//! Local key-value persistence.
//!
//! One small JSON map on disk; the engine stores the read-ids list, the
//! saved-items list, and the sound preference here. Consumers get a trait so
//! tests run on the in-memory variant.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

pub const READ_IDS_KEY: &str = "feed.read_ids";
pub const SAVED_IDS_KEY: &str = "feed.saved_ids";
pub const SOUND_PREF_KEY: &str = "feed.sound_enabled";

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().expect("kv mutex poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .expect("kv mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed store: a single JSON object, loaded once, written through on
/// every `set`.
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FileKv {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = match std::fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    fn flush(&self, snapshot: &HashMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating state dir {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(snapshot).context("serializing kv map")?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("writing kv store {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.lock().expect("kv mutex poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let snapshot = {
            let mut cache = self.cache.lock().expect("kv mutex poisoned");
            cache.insert(key.to_string(), value.to_string());
            cache.clone()
        };
        self.flush(&snapshot)
    }
}

/// Read a JSON string-list under `key`; absent or garbled decodes to empty.
pub fn read_id_list(store: &dyn KvStore, key: &str) -> Vec<String> {
    store
        .get(key)
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn write_id_list(store: &dyn KvStore, key: &str, ids: &[String]) -> Result<()> {
    let body = serde_json::to_string(ids).context("serializing id list")?;
    store.set(key, &body)
}

/// Sound-on-new-announcement preference, defaulting to on.
pub fn sound_enabled(store: &dyn KvStore) -> bool {
    store
        .get(SOUND_PREF_KEY)
        .map(|v| v != "0" && v.to_ascii_lowercase() != "false")
        .unwrap_or(true)
}

pub fn set_sound_enabled(store: &dyn KvStore, on: bool) -> Result<()> {
    store.set(SOUND_PREF_KEY, if on { "1" } else { "0" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_kv_round_trips() {
        let kv = MemoryKv::new();
        assert!(kv.get("k").is_none());
        kv.set("k", "v").unwrap();
        assert_eq!(kv.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn id_list_helpers_tolerate_garbage() {
        let kv = MemoryKv::new();
        kv.set(READ_IDS_KEY, "not json").unwrap();
        assert!(read_id_list(&kv, READ_IDS_KEY).is_empty());

        write_id_list(&kv, READ_IDS_KEY, &["a".into(), "b".into()]).unwrap();
        assert_eq!(read_id_list(&kv, READ_IDS_KEY), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn saved_items_list_round_trips() {
        let kv = MemoryKv::new();
        assert!(read_id_list(&kv, SAVED_IDS_KEY).is_empty());
        write_id_list(&kv, SAVED_IDS_KEY, &["A1".into()]).unwrap();
        assert_eq!(read_id_list(&kv, SAVED_IDS_KEY), vec!["A1".to_string()]);
    }

    #[test]
    fn sound_pref_defaults_on() {
        let kv = MemoryKv::new();
        assert!(sound_enabled(&kv));
        set_sound_enabled(&kv, false).unwrap();
        assert!(!sound_enabled(&kv));
    }
}
