//! Persisted session credential store.
//!
//! One JSON file maps identity strings to their cached session credential
//! and the time it was written. Both sites share the file: the lightnovel
//! flow stores its security key, the 2DFan flow stores its cookie header
//! string. An entry is fully replaced on refresh, never merged.
//!
//! Reads tolerate a missing or corrupt file (empty map). Writes go through
//! a temp file + fsync + rename so a crash mid-write cannot corrupt the
//! previous version. Concurrent runs against the same file are not
//! coordinated; last writer wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A cached credential for one identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Opaque session credential (security key or cookie string).
    pub credential: String,
    /// When the credential was cached.
    pub cached_at: DateTime<Utc>,
}

/// File-backed identity → credential mapping.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full mapping. Missing or malformed files yield an empty map.
    pub fn load(&self) -> HashMap<String, CacheEntry> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read session cache");
                return HashMap::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session cache is malformed, ignoring");
                HashMap::new()
            }
        }
    }

    /// Overwrite the persisted mapping atomically (temp file + fsync + rename).
    ///
    /// Failures are logged and reported as `false`; callers proceed without
    /// a cache rather than failing the run.
    pub fn save(&self, map: &HashMap<String, CacheEntry>) -> bool {
        let json = match serde_json::to_string_pretty(map) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize session cache");
                return false;
            }
        };

        let tmp_path = self.path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp_path, json.as_bytes()) {
            tracing::warn!(path = %tmp_path.display(), error = %e, "failed to write session cache");
            return false;
        }
        if let Ok(file) = std::fs::File::open(&tmp_path) {
            let _ = file.sync_all();
        }
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to replace session cache");
            return false;
        }

        tracing::debug!(path = %self.path.display(), "session cache saved");
        true
    }

    /// Fetch the cached credential for an identity, if any.
    pub fn get(&self, identity: &str) -> Option<String> {
        self.load().get(identity).map(|e| e.credential.clone())
    }

    /// Store a fresh credential for an identity, replacing any prior entry.
    pub fn put(&self, identity: &str, credential: &str) {
        let mut map = self.load();
        map.insert(
            identity.to_owned(),
            CacheEntry {
                credential: credential.to_owned(),
                cached_at: Utc::now(),
            },
        );
        self.save(&map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("cache.json"));
        assert!(store.load().is_empty());
        assert!(store.get("alice").is_none());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SessionStore::new(&path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("cache.json"));
        store.put("alice", "sk:42:secret");
        assert_eq!(store.get("alice").as_deref(), Some("sk:42:secret"));
    }

    #[test]
    fn put_replaces_entry_and_keeps_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("cache.json"));
        store.put("alice", "old");
        store.put("bob", "bobkey");
        store.put("alice", "new");

        let map = store.load();
        assert_eq!(map.len(), 2);
        assert_eq!(map["alice"].credential, "new");
        assert_eq!(map["bob"].credential, "bobkey");
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("cache.json"));
        store.put("alice", "key");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["cache.json"]);
    }
}
