//! Key-value backend on a single SQLite table.
//!
//! Each document is one row: the logical path is the primary key, the
//! document bytes are stored verbatim in a BLOB column, and `stored_at` is
//! stamped when the row is written. Single-row reads and writes are atomic;
//! there are no cross-key transactions.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::{Storage, StoredFile};

/// Largest number of keys fetched by one batch query.
pub const MAX_BATCH_ITEMS: usize = 100;

pub struct KvStore {
    pool: SqlitePool,
    table: String,
    batch_requests: AtomicU64,
}

impl KvStore {
    /// Wraps an existing pool. `table` must already be a validated identifier.
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            batch_requests: AtomicU64::new(0),
        }
    }

    /// Opens (creating if needed) the SQLite file at `db_path`.
    pub async fn connect(db_path: &Path, table: &str) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open key-value store at {}", db_path.display()))?;

        Ok(Self::new(pool, table))
    }

    /// Number of chunked queries issued by [`Storage::retrieve_many`] so far.
    pub fn batch_requests(&self) -> u64 {
        self.batch_requests.load(Ordering::Relaxed)
    }

    /// Creates the document table if it does not exist yet. Idempotent.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                filename TEXT PRIMARY KEY,
                content BLOB NOT NULL,
                stored_at TEXT NOT NULL
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_chunk(&self, keys: &[String]) -> Result<BTreeMap<String, StoredFile>> {
        self.batch_requests.fetch_add(1, Ordering::Relaxed);

        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT filename, content, stored_at FROM {} WHERE filename IN ({})",
            self.table, placeholders
        );
        let mut query = sqlx::query(&sql);
        for key in keys {
            query = query.bind(key);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut files = BTreeMap::new();
        for row in rows {
            let filename: String = row.get("filename");
            let stored_at: String = row.get("stored_at");
            files.insert(
                filename,
                StoredFile {
                    content: row.get("content"),
                    stored_at: parse_stored_at(&stored_at)?,
                },
            );
        }
        Ok(files)
    }
}

fn parse_stored_at(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid stored_at timestamp: {}", value))?
        .with_timezone(&Utc))
}

#[async_trait]
impl Storage for KvStore {
    fn name(&self) -> &str {
        "kv"
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let found: bool = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) > 0 FROM {} WHERE filename = ?",
            self.table
        ))
        .bind(path)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn retrieve(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let content: Option<Vec<u8>> = sqlx::query_scalar(&format!(
            "SELECT content FROM {} WHERE filename = ?",
            self.table
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(content)
    }

    async fn retrieve_many(&self, paths: &[String]) -> Result<BTreeMap<String, StoredFile>> {
        let mut keys: Vec<String> = paths.to_vec();
        keys.sort();
        keys.dedup();

        let mut files = BTreeMap::new();
        for chunk in keys.chunks(MAX_BATCH_ITEMS) {
            files.extend(self.fetch_chunk(chunk).await?);
        }
        debug!(
            requested = keys.len(),
            found = files.len(),
            table = %self.table,
            "batch retrieve"
        );
        Ok(files)
    }

    async fn store(&self, path: &str, content: &[u8]) -> Result<()> {
        let stored_at = Utc::now().to_rfc3339();
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (filename, content, stored_at)
            VALUES (?, ?, ?)
            ON CONFLICT(filename) DO UPDATE SET
                content = excluded.content,
                stored_at = excluded.stored_at
            "#,
            self.table
        ))
        .bind(path)
        .bind(content)
        .bind(&stored_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to store {} in table {}", path, self.table))?;
        Ok(())
    }

    async fn last_modified(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        let stored_at: Option<String> = sqlx::query_scalar(&format!(
            "SELECT stored_at FROM {} WHERE filename = ?",
            self.table
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        stored_at.as_deref().map(parse_stored_at).transpose()
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let files: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT filename FROM {} ORDER BY filename ASC",
            self.table
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }
}
