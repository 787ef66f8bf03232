//! Repository collaborator report.
//!
//! Each record pairs one GitHub repository with one outside collaborator:
//!
//! ```json
//! { "repository": "cloud-platform", "login": "octocat" }
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;

use serde_json::Value;

use super::{as_object, required_extra, required_str, RecordError};
use crate::item_list::ItemList;

/// GitHub repository name.
pub const REPOSITORY: &str = "repository";
/// GitHub login of the collaborator.
pub const LOGIN: &str = "login";

/// One repository/collaborator pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoCollab {
    pub repository: String,
    pub login: String,
    /// Deployment-configured extra fields, e.g. `permission` or `href`.
    pub extra: BTreeMap<String, Value>,
}

impl RepoCollab {
    pub fn from_record(
        record: &Value,
        extra_fields: &[String],
        index: usize,
    ) -> Result<Self, RecordError> {
        let obj = as_object(record, index)?;
        Ok(Self {
            repository: required_str(obj, REPOSITORY, index)?,
            login: required_str(obj, LOGIN, index)?,
            extra: required_extra(obj, extra_fields, index)?,
        })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Which key [`Collaborators::grouped`] groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    #[default]
    Repository,
    Login,
}

impl GroupBy {
    fn key<'a>(&self, record: &'a RepoCollab) -> &'a str {
        match self {
            GroupBy::Repository => &record.repository,
            GroupBy::Login => &record.login,
        }
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            REPOSITORY => Ok(GroupBy::Repository),
            LOGIN => Ok(GroupBy::Login),
            other => Err(format!(
                "unknown group: '{}' (expected '{}' or '{}')",
                other, REPOSITORY, LOGIN
            )),
        }
    }
}

#[derive(Debug)]
pub struct Collaborators {
    path: String,
    updated_at: String,
    group_by: GroupBy,
    list: Vec<RepoCollab>,
    repositories: OnceLock<Vec<RepoCollab>>,
    collaborators: OnceLock<Vec<RepoCollab>>,
}

impl Collaborators {
    /// Converts every record of `items`; the first bad record fails the view.
    pub fn from_list(items: ItemList, extra_fields: &[String]) -> Result<Self, RecordError> {
        let (path, updated_at, records) = items.into_records();
        let list = records
            .iter()
            .enumerate()
            .map(|(i, record)| RepoCollab::from_record(record, extra_fields, i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            path,
            updated_at,
            group_by: GroupBy::default(),
            list,
            repositories: OnceLock::new(),
            collaborators: OnceLock::new(),
        })
    }

    pub fn with_group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }

    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    /// All pairs in document order.
    pub fn list(&self) -> &[RepoCollab] {
        &self.list
    }

    /// One entry per repository, sorted by repository name.
    pub fn repositories(&self) -> &[RepoCollab] {
        self.repositories
            .get_or_init(|| unique_by(&self.list, |r| &r.repository))
    }

    /// One entry per collaborator login, sorted by login.
    pub fn collaborators(&self) -> &[RepoCollab] {
        self.collaborators
            .get_or_init(|| unique_by(&self.list, |r| &r.login))
    }

    /// Collaborators of exactly `repository`, sorted by login.
    pub fn repository_collaborators(&self, repository: &str) -> Vec<&RepoCollab> {
        let mut found: Vec<&RepoCollab> = self
            .list
            .iter()
            .filter(|r| r.repository == repository)
            .collect();
        found.sort_by(|a, b| a.login.cmp(&b.login));
        found
    }

    /// Repositories `login` collaborates on, sorted by repository name.
    pub fn collaborator_repositories(&self, login: &str) -> Vec<&RepoCollab> {
        let mut found: Vec<&RepoCollab> =
            self.list.iter().filter(|r| r.login == login).collect();
        found.sort_by(|a, b| a.repository.cmp(&b.repository));
        found
    }

    /// All pairs grouped by the configured [`GroupBy`] key, in key order.
    pub fn grouped(&self) -> BTreeMap<&str, Vec<&RepoCollab>> {
        let mut groups: BTreeMap<&str, Vec<&RepoCollab>> = BTreeMap::new();
        for record in &self.list {
            groups
                .entry(self.group_by.key(record))
                .or_default()
                .push(record);
        }
        groups
    }
}

/// Keeps the last record seen for each key and returns them in key order.
fn unique_by<F>(records: &[RepoCollab], key: F) -> Vec<RepoCollab>
where
    F: Fn(&RepoCollab) -> &String,
{
    let mut by_key: BTreeMap<&str, &RepoCollab> = BTreeMap::new();
    for record in records {
        by_key.insert(key(record).as_str(), record);
    }
    by_key.into_values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_list::DATA_KEY;
    use serde_json::json;

    fn collaborators(records: Value) -> Collaborators {
        let body = json!({"data": records, "updated_at": "2021-03-04T05:06:07Z"}).to_string();
        let items = ItemList::from_json("data/github_collaborators.json", DATA_KEY, &body);
        Collaborators::from_list(items, &[]).unwrap()
    }

    fn sample() -> Collaborators {
        collaborators(json!([
            {"repository": "foo", "login": "zed"},
            {"repository": "bar", "login": "amy"},
            {"repository": "foo", "login": "amy"},
            {"repository": "baz", "login": "bob"},
        ]))
    }

    fn logins(records: &[&RepoCollab]) -> Vec<String> {
        records.iter().map(|r| r.login.clone()).collect()
    }

    #[test]
    fn list_keeps_document_order() {
        let view = sample();
        assert_eq!(view.list().len(), 4);
        assert_eq!(view.list()[0].login, "zed");
        assert_eq!(view.updated_at(), "2021-03-04 05:06:07");
    }

    #[test]
    fn repositories_are_unique_and_sorted() {
        let view = sample();
        let names: Vec<&str> = view
            .repositories()
            .iter()
            .map(|r| r.repository.as_str())
            .collect();
        assert_eq!(names, vec!["bar", "baz", "foo"]);
    }

    #[test]
    fn duplicate_keys_keep_the_last_record() {
        let view = sample();
        let foo = view
            .repositories()
            .iter()
            .find(|r| r.repository == "foo")
            .unwrap();
        assert_eq!(foo.login, "amy");
    }

    #[test]
    fn collaborators_are_unique_and_sorted() {
        let view = sample();
        let names: Vec<&str> = view
            .collaborators()
            .iter()
            .map(|r| r.login.as_str())
            .collect();
        assert_eq!(names, vec!["amy", "bob", "zed"]);
    }

    #[test]
    fn groupings_are_idempotent() {
        let view = sample();
        assert_eq!(view.repositories(), view.repositories());
        assert_eq!(view.collaborators().len(), 3);
        assert_eq!(view.collaborators().len(), 3);
    }

    #[test]
    fn repository_collaborators_filters_exactly_and_sorts_by_login() {
        let view = sample();
        assert_eq!(
            logins(&view.repository_collaborators("foo")),
            vec!["amy", "zed"]
        );
        assert!(view.repository_collaborators("fo").is_empty());
    }

    #[test]
    fn collaborator_repositories_sorts_by_repository() {
        let view = sample();
        let repos: Vec<&str> = view
            .collaborator_repositories("amy")
            .iter()
            .map(|r| r.repository.as_str())
            .collect();
        assert_eq!(repos, vec!["bar", "foo"]);
    }

    #[test]
    fn grouped_follows_group_by() {
        let view = sample();
        assert_eq!(view.group_by(), GroupBy::Repository);
        let by_repo = view.grouped();
        assert_eq!(by_repo.keys().copied().collect::<Vec<_>>(), vec!["bar", "baz", "foo"]);
        assert_eq!(by_repo["foo"].len(), 2);

        let view = sample().with_group_by(GroupBy::Login);
        assert_eq!(view.group_by(), GroupBy::Login);
        let by_login = view.grouped();
        assert_eq!(by_login.keys().copied().collect::<Vec<_>>(), vec!["amy", "bob", "zed"]);
        assert_eq!(by_login["amy"].len(), 2);
    }

    #[test]
    fn group_by_parses_field_names() {
        assert_eq!("repository".parse::<GroupBy>(), Ok(GroupBy::Repository));
        assert_eq!("login".parse::<GroupBy>(), Ok(GroupBy::Login));
        assert!("team".parse::<GroupBy>().is_err());
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let body = json!({
            "data": [{"repository": "foo", "login": "a"}, {"login": "b"}],
            "updated_at": "2021-03-04",
        })
        .to_string();
        let items = ItemList::from_json("data/c.json", DATA_KEY, &body);
        let err = Collaborators::from_list(items, &[]).unwrap_err();
        assert_eq!(
            err,
            RecordError::MissingField {
                index: 1,
                field: "repository".to_string()
            }
        );
    }

    #[test]
    fn configured_extra_fields_are_required_and_kept() {
        let body = json!({
            "data": [{"repository": "foo", "login": "a", "permission": "admin"}],
            "updated_at": "2021-03-04",
        })
        .to_string();
        let extra = vec!["permission".to_string()];

        let items = ItemList::from_json("data/c.json", DATA_KEY, &body);
        let view = Collaborators::from_list(items, &extra).unwrap();
        assert_eq!(view.list()[0].field("permission"), Some(&json!("admin")));

        let items = ItemList::from_json("data/c.json", DATA_KEY, &body);
        let err = Collaborators::from_list(items, &["href".to_string()]).unwrap_err();
        assert!(matches!(err, RecordError::MissingField { ref field, .. } if field == "href"));
    }

    #[test]
    fn non_object_record_is_an_error() {
        let body = json!({"data": ["foo"], "updated_at": "2021-03-04"}).to_string();
        let items = ItemList::from_json("data/c.json", DATA_KEY, &body);
        assert_eq!(
            Collaborators::from_list(items, &[]).unwrap_err(),
            RecordError::NotAnObject { index: 0 }
        );
    }
}
