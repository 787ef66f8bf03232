//! Typed views over report documents.
//!
//! A view takes the raw records of an [`ItemList`] and turns each one into
//! a typed record. Unlike document loading, record conversion is strict: a
//! record missing a required field is a data-integrity problem and fails the
//! whole view with a [`RecordError`].
//!
//! Which view serves a docpath is decided by a fixed registry:
//!
//! | Docpath | View |
//! |---------|------|
//! | `github_collaborators` | [`Collaborators`] |
//! | `github_repositories` | [`GithubRepositories`] |
//! | anything else | the raw [`ItemList`] |

pub mod collaborators;
pub mod repositories;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ViewConfig;
use crate::item_list::{ItemList, DATA_KEY};
use crate::store::{datafile, docpath_of, Storage};

pub use collaborators::{Collaborators, GroupBy, RepoCollab};
pub use repositories::{GithubRepositories, GithubRepository, FAIL, PASS};

/// A raw record that cannot be turned into a typed record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record {index} is not a JSON object")]
    NotAnObject { index: usize },
    #[error("record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: String },
    #[error("record {index} field '{field}' must be {expected}")]
    WrongType {
        index: usize,
        field: String,
        expected: &'static str,
    },
}

/// The views a docpath can be served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Items,
    Collaborators,
    Repositories,
}

const REGISTRY: &[(&str, ViewKind)] = &[
    ("github_collaborators", ViewKind::Collaborators),
    ("github_repositories", ViewKind::Repositories),
];

impl ViewKind {
    /// Exact-match registry lookup; unknown docpaths get the raw list.
    pub fn for_docpath(docpath: &str) -> Self {
        REGISTRY
            .iter()
            .find(|(name, _)| *name == docpath)
            .map(|(_, kind)| *kind)
            .unwrap_or(ViewKind::Items)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Items => "items",
            ViewKind::Collaborators => "collaborators",
            ViewKind::Repositories => "repositories",
        }
    }
}

/// One loaded view of one document.
#[derive(Debug)]
pub enum ListView {
    Items(ItemList),
    Collaborators(Collaborators),
    Repositories(GithubRepositories),
}

impl ListView {
    /// Loads `data/{docpath}.json` and builds the view the registry names.
    ///
    /// Loading itself never fails; only typed record conversion can.
    pub async fn load(
        store: &dyn Storage,
        docpath: &str,
        view: &ViewConfig,
    ) -> Result<Self, RecordError> {
        let path = datafile(docpath);
        let key = view.list_key.as_deref().unwrap_or(DATA_KEY);
        let items = ItemList::load_with_key(store, &path, key).await;

        Ok(match ViewKind::for_docpath(docpath) {
            ViewKind::Items => ListView::Items(items),
            ViewKind::Collaborators => ListView::Collaborators(Collaborators::from_list(
                items,
                &view.required_fields,
            )?),
            ViewKind::Repositories => ListView::Repositories(GithubRepositories::from_list(
                items,
                &view.required_fields,
            )?),
        })
    }

    pub fn kind(&self) -> ViewKind {
        match self {
            ListView::Items(_) => ViewKind::Items,
            ListView::Collaborators(_) => ViewKind::Collaborators,
            ListView::Repositories(_) => ViewKind::Repositories,
        }
    }

    /// Logical path of the underlying document.
    pub fn path(&self) -> &str {
        match self {
            ListView::Items(v) => v.path(),
            ListView::Collaborators(v) => v.path(),
            ListView::Repositories(v) => v.path(),
        }
    }

    /// The docpath this view was loaded for.
    pub fn docpath(&self) -> &str {
        docpath_of(self.path())
    }

    pub fn updated_at(&self) -> &str {
        match self {
            ListView::Items(v) => v.updated_at(),
            ListView::Collaborators(v) => v.updated_at(),
            ListView::Repositories(v) => v.updated_at(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ListView::Items(v) => v.todo_count(),
            ListView::Collaborators(v) => v.list().len(),
            ListView::Repositories(v) => v.list().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============ Field extraction ============

fn as_object(record: &Value, index: usize) -> Result<&Map<String, Value>, RecordError> {
    record
        .as_object()
        .ok_or(RecordError::NotAnObject { index })
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
    index: usize,
) -> Result<&'a Value, RecordError> {
    obj.get(field).ok_or_else(|| RecordError::MissingField {
        index,
        field: field.to_string(),
    })
}

fn required_str(
    obj: &Map<String, Value>,
    field: &str,
    index: usize,
) -> Result<String, RecordError> {
    required(obj, field, index)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RecordError::WrongType {
            index,
            field: field.to_string(),
            expected: "a string",
        })
}

/// Collects the deployment-configured extra fields, all of which must be present.
fn required_extra(
    obj: &Map<String, Value>,
    fields: &[String],
    index: usize,
) -> Result<BTreeMap<String, Value>, RecordError> {
    fields
        .iter()
        .map(|field| Ok((field.clone(), required(obj, field, index)?.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn registry_matches_exact_docpaths_only() {
        assert_eq!(
            ViewKind::for_docpath("github_collaborators"),
            ViewKind::Collaborators
        );
        assert_eq!(
            ViewKind::for_docpath("github_repositories"),
            ViewKind::Repositories
        );
        assert_eq!(ViewKind::for_docpath("github_repositories2"), ViewKind::Items);
        assert_eq!(ViewKind::for_docpath("foo"), ViewKind::Items);
    }

    #[tokio::test]
    async fn load_picks_the_registered_view() {
        let store = MemoryStore::new();
        store
            .store(
                "data/github_collaborators.json",
                &json!({
                    "data": [{"repository": "a", "login": "x"}],
                    "updated_at": "2024-01-01T00:00:00Z",
                })
                .to_string()
                .as_bytes(),
            )
            .await
            .unwrap();

        let view = ListView::load(&store, "github_collaborators", &ViewConfig::default())
            .await
            .unwrap();
        assert_eq!(view.kind(), ViewKind::Collaborators);
        assert_eq!(view.docpath(), "github_collaborators");
        assert_eq!(view.path(), "data/github_collaborators.json");
        assert_eq!(view.len(), 1);
        assert_eq!(view.updated_at(), "2024-01-01 00:00:00");

        let view = ListView::load(&store, "something_else", &ViewConfig::default())
            .await
            .unwrap();
        assert_eq!(view.kind(), ViewKind::Items);
        assert_eq!(view.docpath(), "something_else");
        assert!(view.is_empty());
        assert_eq!(view.updated_at(), "");
    }

    #[tokio::test]
    async fn configured_list_key_is_used() {
        let store = MemoryStore::new();
        store
            .store(
                "data/todo.json",
                json!({"mylist": [1, 2], "updated_at": "2024-01-01"})
                    .to_string()
                    .as_bytes(),
            )
            .await
            .unwrap();
        let view_config = ViewConfig {
            required_fields: vec![],
            list_key: Some("mylist".to_string()),
        };

        let view = ListView::load(&store, "todo", &view_config).await.unwrap();
        assert_eq!(view.len(), 2);
    }

    #[tokio::test]
    async fn bad_record_fails_the_typed_view_but_not_the_raw_one() {
        let store = MemoryStore::new();
        let body = json!({
            "data": [{"repository": "a"}],
            "updated_at": "2024-01-01T00:00:00Z",
        })
        .to_string();
        store
            .store("data/github_collaborators.json", body.as_bytes())
            .await
            .unwrap();
        store.store("data/raw.json", body.as_bytes()).await.unwrap();

        let err = ListView::load(&store, "github_collaborators", &ViewConfig::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RecordError::MissingField {
                index: 0,
                field: "login".to_string()
            }
        );

        let raw = ListView::load(&store, "raw", &ViewConfig::default())
            .await
            .unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.docpath(), "raw");
    }
}
