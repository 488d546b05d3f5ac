use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Default location for cache entries, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = "data/cache";

/// On-disk store for the most recent successful payload per
/// `(namespace, key)` pair. One file per entry, overwritten on every live
/// success, never expired or deleted by this component.
///
/// The file name hashes the key so URLs and query strings never leak into
/// the filesystem; a truncated digest is enough because a collision only
/// overwrites another best-effort entry.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a `(namespace, key)` pair. Both JSON and text entries
    /// share the `.json` suffix; the namespace tells readers what to expect.
    pub fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{namespace}_{}.json", &digest[..20]))
    }

    /// Persist a JSON payload, overwriting any prior entry.
    pub fn put_json(&self, namespace: &str, key: &str, payload: &Value) -> io::Result<()> {
        let text = serde_json::to_string(payload).map_err(io::Error::other)?;
        self.write(namespace, key, &text)
    }

    /// Persist a text payload, overwriting any prior entry.
    pub fn put_text(&self, namespace: &str, key: &str, payload: &str) -> io::Result<()> {
        self.write(namespace, key, payload)
    }

    fn write(&self, namespace: &str, key: &str, contents: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.entry_path(namespace, key), contents)
    }

    /// Last stored JSON payload. Best-effort: a missing, unreadable, or
    /// corrupt file reads as absent.
    pub fn get_json(&self, namespace: &str, key: &str) -> Option<Value> {
        let text = fs::read_to_string(self.entry_path(namespace, key)).ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Last stored text payload, or `None` when missing or unreadable.
    pub fn get_text(&self, namespace: &str, key: &str) -> Option<String> {
        fs::read_to_string(self.entry_path(namespace, key)).ok()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_DIR)
    }
}
