// Filesystem-backed `ModelStore` (spec.md §6 "Persisted state layout").
//
// One JSON file per key under `storage_path`, named `<key>.json`. The
// `Mutex` here guards nothing about file contents (each key is its own
// file) — it exists so concurrent saves to the same key serialise rather
// than interleave writes, mirroring the teacher's `Mutex<Connection>`
// pattern for a resource that's cheap to hold briefly and unsafe to share
// bare.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use super::traits::ModelStore;

pub struct FileModelStore {
    storage_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileModelStore {
    pub fn new(storage_path: impl AsRef<Path>) -> Self {
        Self {
            storage_path: storage_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Ensure the storage directory exists. Called once from the Director's
    /// constructor (spec.md §4.8 "ensure storage directory exists").
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.storage_path)
            .await
            .with_context(|| format!("creating storage directory {}", self.storage_path.display()))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.storage_path.join(format!("{key}.json"))
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn save(&self, key: &str, json: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(key);
        fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path());
        store.ensure_dir().await.unwrap();

        assert!(store.load("ssh_markov").await.unwrap().is_none());

        store.save("ssh_markov", "{\"a\":1}").await.unwrap();
        let loaded = store.load("ssh_markov").await.unwrap();
        assert_eq!(loaded.as_deref(), Some("{\"a\":1}"));
    }
}
