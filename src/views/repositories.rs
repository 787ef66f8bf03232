//! GitHub repository compliance report.
//!
//! Each record is the outcome of the compliance checks run against one
//! repository:
//!
//! ```json
//! {
//!   "name": "cloud-platform-concourse",
//!   "default_branch": "main",
//!   "url": "https://github.com/ministryofjustice/cloud-platform-concourse",
//!   "status": "PASS",
//!   "last_push": "2024-01-01T00:00:00Z",
//!   "report": { "default_branch_main": true, "has_main_branch_protection": true }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde_json::{Map, Value};

use super::{as_object, required, required_extra, required_str, RecordError};
use crate::item_list::ItemList;

pub const PASS: &str = "PASS";
pub const FAIL: &str = "FAIL";

/// Human-readable descriptions of failed checks. Unlisted checks are shown
/// by name.
const PROBLEMS: &[(&str, &str)] = &[
    ("default_branch_main", "The default branch is not `main`"),
    (
        "has_main_branch_protection",
        "Branch protection is not enabled for `main`",
    ),
    (
        "requires_approving_reviews",
        "Pull request reviews are not required",
    ),
    (
        "administrators_require_review",
        "Administrator PRs do not require reviews",
    ),
];

pub fn readable_problem(check: &str) -> &str {
    PROBLEMS
        .iter()
        .find(|(name, _)| *name == check)
        .map(|(_, text)| *text)
        .unwrap_or(check)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GithubRepository {
    pub name: String,
    pub default_branch: String,
    pub status: String,
    pub url: String,
    /// `None` when the repository has never been pushed to.
    pub last_push: Option<String>,
    pub report: Map<String, Value>,
    pub extra: BTreeMap<String, Value>,
}

impl GithubRepository {
    pub fn from_record(
        record: &Value,
        extra_fields: &[String],
        index: usize,
    ) -> Result<Self, RecordError> {
        let obj = as_object(record, index)?;

        let last_push = match required(obj, "last_push", index)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            _ => {
                return Err(RecordError::WrongType {
                    index,
                    field: "last_push".to_string(),
                    expected: "a string or null",
                })
            }
        };

        let report = required(obj, "report", index)?
            .as_object()
            .cloned()
            .ok_or_else(|| RecordError::WrongType {
                index,
                field: "report".to_string(),
                expected: "an object",
            })?;

        Ok(Self {
            name: required_str(obj, "name", index)?,
            default_branch: required_str(obj, "default_branch", index)?,
            status: required_str(obj, "status", index)?,
            url: required_str(obj, "url", index)?,
            last_push,
            report,
            extra: required_extra(obj, extra_fields, index)?,
        })
    }

    pub fn is_failing(&self) -> bool {
        self.status == FAIL
    }

    pub fn is_passing(&self) -> bool {
        self.status == PASS
    }

    pub fn default_branch_main(&self) -> bool {
        self.check("default_branch_main")
    }

    /// Whether the named check passed. Missing or non-boolean checks count as failed.
    pub fn check(&self, name: &str) -> bool {
        self.report.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Readable descriptions of every check that explicitly failed, in check-name order.
    pub fn problems(&self) -> Vec<&str> {
        self.report
            .iter()
            .filter(|(_, passed)| passed.as_bool() == Some(false))
            .map(|(name, _)| readable_problem(name))
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

#[derive(Debug)]
pub struct GithubRepositories {
    path: String,
    updated_at: String,
    list: Vec<GithubRepository>,
    repositories: OnceLock<Vec<GithubRepository>>,
    failing: OnceLock<Vec<GithubRepository>>,
    passing: OnceLock<Vec<GithubRepository>>,
}

impl GithubRepositories {
    /// Converts every record of `items`; the first bad record fails the view.
    pub fn from_list(items: ItemList, extra_fields: &[String]) -> Result<Self, RecordError> {
        let (path, updated_at, records) = items.into_records();
        let mut list = records
            .iter()
            .enumerate()
            .map(|(i, record)| GithubRepository::from_record(record, extra_fields, i))
            .collect::<Result<Vec<_>, _>>()?;
        list.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            path,
            updated_at,
            list,
            repositories: OnceLock::new(),
            failing: OnceLock::new(),
            passing: OnceLock::new(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }

    /// All repositories sorted by name; duplicates keep document order.
    pub fn list(&self) -> &[GithubRepository] {
        &self.list
    }

    /// One entry per repository name (the last one in the document wins).
    pub fn repositories(&self) -> &[GithubRepository] {
        self.repositories.get_or_init(|| {
            let mut by_name: BTreeMap<&str, &GithubRepository> = BTreeMap::new();
            for repo in &self.list {
                by_name.insert(&repo.name, repo);
            }
            by_name.into_values().cloned().collect()
        })
    }

    /// Repositories with status `FAIL`, sorted by name.
    pub fn failing(&self) -> &[GithubRepository] {
        self.failing
            .get_or_init(|| self.filtered(GithubRepository::is_failing))
    }

    /// Repositories with status `PASS`, sorted by name.
    pub fn passing(&self) -> &[GithubRepository] {
        self.passing
            .get_or_init(|| self.filtered(GithubRepository::is_passing))
    }

    fn filtered(&self, keep: fn(&GithubRepository) -> bool) -> Vec<GithubRepository> {
        self.list.iter().filter(|r| keep(r)).cloned().collect()
    }
}
