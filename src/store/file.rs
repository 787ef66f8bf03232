use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use super::{Storage, StoredFile};

/// Documents that [`FileStore::list_files`] reports.
const DOCUMENT_GLOB: &str = "data/**/*.json";

/// Stores each document as a plain file under a fixed root directory.
///
/// Writes are not serialized: two concurrent writes to the same path race
/// and the last one wins.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Maps a logical path onto the filesystem. Paths that could escape the
    /// root are refused.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            bail!("invalid logical path: {}", path);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let Ok(full) = self.resolve(path) else {
            return Ok(false);
        };
        Ok(tokio::fs::try_exists(&full).await.unwrap_or(false))
    }

    async fn retrieve(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", full.display())),
        }
    }

    async fn retrieve_many(&self, paths: &[String]) -> Result<BTreeMap<String, StoredFile>> {
        let mut files = BTreeMap::new();
        for path in paths {
            if files.contains_key(path) {
                continue;
            }
            let Some(content) = self.retrieve(path).await? else {
                continue;
            };
            let stored_at = self.last_modified(path).await?.unwrap_or_default();
            files.insert(path.clone(), StoredFile { content, stored_at });
        }
        Ok(files)
    }

    async fn store(&self, path: &str, content: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(dir) = full.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
        tokio::fs::write(&full, content)
            .await
            .with_context(|| format!("Failed to write {}", full.display()))
    }

    async fn last_modified(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(Some(DateTime::<Utc>::from(meta.modified()?))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to stat {}", full.display())),
        }
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let documents = build_globset(&[DOCUMENT_GLOB])?;
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let rel_str = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if documents.is_match(&rel_str) {
                files.push(rel_str);
            }
        }

        files.sort();
        Ok(files)
    }
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_is_absent_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());

        assert!(!store.exists("data/missing.json").await.unwrap());
        assert_eq!(store.retrieve("data/missing.json").await.unwrap(), None);
        assert_eq!(store.last_modified("data/missing.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn store_creates_directories_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());

        store.store("data/nested/foo.json", b"first").await.unwrap();
        store.store("data/nested/foo.json", b"second").await.unwrap();

        assert!(tmp.path().join("data/nested/foo.json").is_file());
        assert!(store.exists("data/nested/foo.json").await.unwrap());
        assert_eq!(
            store.retrieve("data/nested/foo.json").await.unwrap(),
            Some(b"second".to_vec())
        );
        assert!(store
            .last_modified("data/nested/foo.json")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn list_files_only_reports_json_under_data() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        store.store("data/b.json", b"{}").await.unwrap();
        store.store("data/a.json", b"{}").await.unwrap();
        store.store("data/sub/c.json", b"{}").await.unwrap();
        store.store("data/notes.txt", b"x").await.unwrap();
        store.store("other/d.json", b"{}").await.unwrap();

        assert_eq!(
            store.list_files().await.unwrap(),
            vec!["data/a.json", "data/b.json", "data/sub/c.json"]
        );
    }

    #[tokio::test]
    async fn retrieve_many_skips_missing_paths() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        store.store("data/a.json", b"A").await.unwrap();

        let files = store
            .retrieve_many(&["data/a.json".to_string(), "data/zz.json".to_string()])
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files["data/a.json"].content, b"A");
    }

    #[tokio::test]
    async fn bytes_round_trip_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path());
        let body = [b'{', 0xff, 0xfe, b'}'];

        store.store("data/raw.json", &body).await.unwrap();
        assert_eq!(
            store.retrieve("data/raw.json").await.unwrap(),
            Some(body.to_vec())
        );
    }

    #[tokio::test]
    async fn refuses_paths_outside_the_root() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("root"));

        assert!(store.store("../escape.json", b"x").await.is_err());
        assert!(!store.exists("../escape.json").await.unwrap());
        assert!(store.retrieve("/etc/passwd").await.is_err());
    }
}
