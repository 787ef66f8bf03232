//! Storage abstraction for report documents.
//!
//! The [`Storage`] trait is the only thing the rest of the crate knows
//! about where documents live. Documents are opaque byte blobs keyed by a
//! *logical path* such as `data/github_repositories.json`; each backend maps
//! that path to its own location.
//!
//! | Backend | Location of `path` | `stored_at` source |
//! |---------|--------------------|--------------------|
//! | [`FileStore`] | `<root>/<path>` on disk | filesystem mtime |
//! | [`KvStore`] | primary key of one SQLite table | written at store time |
//! | [`MemoryStore`] | in-process map | written at store time |
//!
//! Implementations must be `Send + Sync`; one instance is shared by every
//! request for the lifetime of the process.

pub mod file;
pub mod kv;
pub mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::{Backend, Config};

pub use file::FileStore;
pub use kv::{KvStore, MAX_BATCH_ITEMS};
pub use memory::MemoryStore;

/// A document together with the time it was last written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

/// Abstract document store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`exists`](Storage::exists) | Whether a document is stored at `path` |
/// | [`retrieve`](Storage::retrieve) | Full document bytes, or `None` |
/// | [`retrieve_many`](Storage::retrieve_many) | Many documents merged into one map |
/// | [`store`](Storage::store) | Overwrite the document at `path` |
/// | [`last_modified`](Storage::last_modified) | When `path` was last written |
/// | [`list_files`](Storage::list_files) | All stored logical paths, sorted |
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend label for logs and the health endpoint.
    fn name(&self) -> &str;

    /// Returns `Ok(false)` for a missing path; never errors because of absence.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Returns the complete document exactly as stored, or `None` if nothing
    /// is stored.
    async fn retrieve(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Fetches many documents at once. Missing paths are left out of the
    /// returned map.
    async fn retrieve_many(&self, paths: &[String]) -> Result<BTreeMap<String, StoredFile>>;

    /// Writes `content` at `path`, replacing whatever was there. The bytes
    /// are not inspected.
    async fn store(&self, path: &str, content: &[u8]) -> Result<()>;

    async fn last_modified(&self, path: &str) -> Result<Option<DateTime<Utc>>>;

    async fn list_files(&self) -> Result<Vec<String>>;
}

/// Opens the backend selected by `[storage]`.
///
/// The key-value backend is chosen when a table name is configured; its
/// table is created if missing so a fresh database is usable immediately.
pub async fn open(config: &Config) -> Result<Arc<dyn Storage>> {
    match config.storage.backend() {
        Backend::File { root } => Ok(Arc::new(FileStore::new(root))),
        Backend::Kv { db_path, table } => {
            let store = KvStore::connect(&db_path, &table).await?;
            store.ensure_table().await?;
            Ok(Arc::new(store))
        }
    }
}

/// Logical path of the document behind a docpath (`foo` → `data/foo.json`).
pub fn datafile(docpath: &str) -> String {
    format!("data/{}.json", docpath)
}

/// Inverse of [`datafile`]. Paths outside `data/*.json` are returned as-is.
pub fn docpath_of(path: &str) -> &str {
    path.strip_prefix("data/")
        .and_then(|p| p.strip_suffix(".json"))
        .unwrap_or(path)
}
