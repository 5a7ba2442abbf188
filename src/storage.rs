//! Durable key/value storage for cumulative metrics.
//!
//! The dashboard keeps its high-water marks as small JSON documents, one per
//! key. The trait exists so the aggregator can be tested against an
//! in-memory store; production uses one file per key under `~/.fiesta/`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;

pub trait MetricsStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: MetricsStorage + ?Sized> MetricsStorage for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// One file per key, `<dir>/<key>.json`.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Storage rooted at the default data directory, `~/.fiesta`.
    pub fn default_dir() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(Self::new(home.join(".fiesta")))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl MetricsStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path_for(key);
        fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// Test double. Also useful for one-shot runs that should not touch disk.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("metrics"));

        assert_eq!(storage.get("counters").expect("get"), None);

        storage.set("counters", r#"{"api_calls":3}"#).expect("set");
        assert_eq!(
            storage.get("counters").expect("get"),
            Some(r#"{"api_calls":3}"#.to_string())
        );

        storage.set("counters", r#"{"api_calls":9}"#).expect("overwrite");
        assert_eq!(
            storage.get("counters").expect("get"),
            Some(r#"{"api_calls":9}"#.to_string())
        );

        storage.remove("counters").expect("remove");
        assert_eq!(storage.get("counters").expect("get"), None);

        // Removing a missing key is not an error.
        storage.remove("counters").expect("remove again");
    }

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();

        storage.set("k", "v").expect("set");
        assert_eq!(storage.get("k").expect("get"), Some("v".to_string()));

        storage.remove("k").expect("remove");
        assert_eq!(storage.get("k").expect("get"), None);
    }
}
