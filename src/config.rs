//! TOML configuration parsing.
//!
//! The configuration decides, once per process, which storage backend the
//! server uses and which key guards the write path. Nothing here is
//! re-read per request.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `server.api_key` when set.
pub const API_KEY_ENV: &str = "REPORTS_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub views: BTreeMap<String, ViewConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub api_key: String,
}

fn default_bind() -> String {
    "127.0.0.1:4567".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for the file backend. Documents live under `data/`.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// SQLite database file for the key-value backend.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Key-value table name. Its presence selects the key-value backend.
    #[serde(default)]
    pub table: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            db_path: None,
            table: None,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

/// Per-view settings, keyed by docpath in `[views.<docpath>]`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ViewConfig {
    /// Fields every record must carry in addition to the view's own.
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Top-level key holding the record list. Defaults to `data`.
    #[serde(default)]
    pub list_key: Option<String>,
}

/// Which storage backend the process runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    File { root: PathBuf },
    Kv { db_path: PathBuf, table: String },
}

impl StorageConfig {
    pub fn backend(&self) -> Backend {
        match (&self.table, &self.db_path) {
            (Some(table), Some(db_path)) => Backend::Kv {
                db_path: db_path.clone(),
                table: table.clone(),
            },
            _ => Backend::File {
                root: self.root.clone(),
            },
        }
    }
}

impl Config {
    /// Settings for one docpath, or the defaults if the view is unconfigured.
    pub fn view(&self, docpath: &str) -> ViewConfig {
        self.views.get(docpath).cloned().unwrap_or_default()
    }

    /// A file-backed configuration rooted at `root`, used by tests and
    /// embedders that don't read a TOML file.
    pub fn with_root(root: &Path, api_key: &str) -> Self {
        Self {
            server: ServerConfig {
                bind: default_bind(),
                api_key: api_key.to_string(),
            },
            storage: StorageConfig {
                root: root.to_path_buf(),
                db_path: None,
                table: None,
            },
            views: BTreeMap::new(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        config.server.api_key = key;
    }

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.server.api_key.trim().is_empty() {
        anyhow::bail!(
            "server.api_key must not be empty (set it in the config file or via {})",
            API_KEY_ENV
        );
    }

    if let Some(table) = &config.storage.table {
        if !is_valid_table_name(table) {
            anyhow::bail!(
                "storage.table '{}' must start with a letter or underscore and contain only letters, digits and underscores",
                table
            );
        }
        if config.storage.db_path.is_none() {
            anyhow::bail!("storage.db_path must be set when storage.table is set");
        }
    }

    for (docpath, view) in &config.views {
        if let Some(key) = &view.list_key {
            if key.is_empty() {
                anyhow::bail!("views.{}.list_key must not be empty", docpath);
            }
        }
    }

    Ok(())
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
