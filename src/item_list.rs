//! A single JSON report document, loaded once.
//!
//! An [`ItemList`] reads one document through a [`Storage`] backend when it
//! is constructed and keeps the parsed result for its lifetime. Loading never
//! fails: a missing document, a backend read error, malformed JSON, or a
//! document without the expected fields all produce the *empty document*
//! (no records, empty timestamp). The only trace of the difference is a log
//! line.
//!
//! Expected document shape:
//!
//! ```json
//! { "updated_at": "2024-01-01T00:00:00Z", "data": [ { ... }, { ... } ] }
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, info};

use crate::store::Storage;

/// Default top-level key holding the record list.
pub const DATA_KEY: &str = "data";
/// Top-level key holding the document timestamp.
pub const UPDATED_AT: &str = "updated_at";

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parsed contents of one document.
#[derive(Debug, Clone, Default, PartialEq)]
struct Document {
    records: Vec<Value>,
    updated_at: String,
}

/// The record list of one stored document.
#[derive(Debug, Clone)]
pub struct ItemList {
    path: String,
    key: String,
    document: Document,
}

impl ItemList {
    /// Loads the document at `path`, reading records from the `data` key.
    pub async fn load(store: &dyn Storage, path: &str) -> Self {
        Self::load_with_key(store, path, DATA_KEY).await
    }

    /// Loads the document at `path`, reading records from `key`.
    pub async fn load_with_key(store: &dyn Storage, path: &str, key: &str) -> Self {
        let document = read_document(store, path, key).await;
        Self {
            path: path.to_string(),
            key: key.to_string(),
            document,
        }
    }

    /// Builds a list from an already-fetched document.
    pub fn from_json(path: &str, key: &str, json: impl AsRef<[u8]>) -> Self {
        Self {
            path: path.to_string(),
            key: key.to_string(),
            document: parse_document(path, key, json.as_ref()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Records in document order; empty if the document could not be loaded.
    pub fn list(&self) -> &[Value] {
        &self.document.records
    }

    /// `YYYY-MM-DD HH:MM:SS`, or `""` if the document could not be loaded.
    pub fn updated_at(&self) -> &str {
        &self.document.updated_at
    }

    pub fn todo_count(&self) -> usize {
        self.document.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.records.is_empty()
    }

    pub(crate) fn into_records(self) -> (String, String, Vec<Value>) {
        (self.path, self.document.updated_at, self.document.records)
    }
}

async fn read_document(store: &dyn Storage, path: &str, key: &str) -> Document {
    match store.exists(path).await {
        Ok(true) => {}
        Ok(false) => {
            info!("No such file {}", path);
            return Document::default();
        }
        Err(e) => {
            info!("Could not check {} in {} store: {:#}", path, store.name(), e);
            return Document::default();
        }
    }

    let json = match store.retrieve(path).await {
        Ok(Some(json)) => json,
        Ok(None) => {
            info!("No such file {}", path);
            return Document::default();
        }
        Err(e) => {
            info!("Could not read {} from {} store: {:#}", path, store.name(), e);
            return Document::default();
        }
    };

    parse_document(path, key, &json)
}

fn parse_document(path: &str, key: &str, json: &[u8]) -> Document {
    let value: Value = match serde_json::from_slice(json) {
        Ok(v) => v,
        Err(e) => {
            info!("Malformed JSON file: {} ({})", path, e);
            return Document::default();
        }
    };

    let Some(records) = value.get(key).and_then(Value::as_array) else {
        info!("No '{}' list in {}", key, path);
        return Document::default();
    };

    let Some(raw_timestamp) = value.get(UPDATED_AT).and_then(Value::as_str) else {
        info!("No '{}' timestamp in {}", UPDATED_AT, path);
        return Document::default();
    };

    let Some(updated_at) = format_timestamp(raw_timestamp) else {
        info!("Unparseable '{}' in {}: {}", UPDATED_AT, path, raw_timestamp);
        return Document::default();
    };

    debug!(path, records = records.len(), "loaded document");
    Document {
        records: records.clone(),
        updated_at,
    }
}

/// Reformats an ISO-8601-ish timestamp as `YYYY-MM-DD HH:MM:SS`.
///
/// Offsets are kept as written: the result is the wall-clock time in the
/// timestamp's own zone.
pub fn format_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.format(DISPLAY_FORMAT).to_string());
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.format(DISPLAY_FORMAT).to_string());
        }
    }

    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.format(DISPLAY_FORMAT).to_string());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format(DISPLAY_FORMAT).to_string())
}
