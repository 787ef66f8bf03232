//! In-memory [`Storage`] implementation.
//!
//! Keeps documents in a `HashMap` behind `std::sync::RwLock`. Counts
//! [`retrieve`](Storage::retrieve) calls so tests can check how often a
//! document is actually fetched.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Storage, StoredFile};

pub struct MemoryStore {
    files: RwLock<HashMap<String, StoredFile>>,
    retrievals: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            retrievals: AtomicUsize::new(0),
        }
    }

    /// Number of times a document body has been read.
    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("memory store lock poisoned")
}

#[async_trait]
impl Storage for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.read().map_err(|_| poisoned())?.contains_key(path))
    }

    async fn retrieve(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.retrievals.fetch_add(1, Ordering::Relaxed);
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(files.get(path).map(|f| f.content.clone()))
    }

    async fn retrieve_many(&self, paths: &[String]) -> Result<BTreeMap<String, StoredFile>> {
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(paths
            .iter()
            .filter_map(|p| files.get(p).map(|f| (p.clone(), f.clone())))
            .collect())
    }

    async fn store(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut files = self.files.write().map_err(|_| poisoned())?;
        files.insert(
            path.to_string(),
            StoredFile {
                content: content.to_vec(),
                stored_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn last_modified(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(files.get(path).map(|f| f.stored_at))
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let files = self.files.read().map_err(|_| poisoned())?;
        let mut paths: Vec<String> = files.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}
