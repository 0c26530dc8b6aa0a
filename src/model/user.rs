use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::completable::Completable;

/// A user-level tag dictionary entry. Completables reference these by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTag {
    pub label: String,
    #[serde(default)]
    pub color: String,
}

/// The signed-in user document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default = "Utc::now")]
    pub date_created: DateTime<Utc>,
    /// IDs of the projects this user owns, in display order.
    #[serde(default)]
    pub projects: Vec<String>,
    /// Tag dictionary keyed by tag ID.
    #[serde(default)]
    pub tags: IndexMap<String, UserTag>,
}

impl User {
    pub fn new(id: impl Into<String>, user_name: impl Into<String>) -> Self {
        User {
            id: id.into(),
            user_name: user_name.into(),
            date_created: Utc::now(),
            projects: Vec::new(),
            tags: IndexMap::new(),
        }
    }
}

/// The full bundle returned by `GET /api/users/{id}`: the user plus every
/// project and task they own, keyed by ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllUserData {
    pub user: User,
    #[serde(default)]
    pub projects: IndexMap<String, Completable>,
    #[serde(default)]
    pub tasks: IndexMap<String, Completable>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn user_bundle_round_trips() {
        let json = r##"{
            "user": {
                "_id": "u1",
                "userName": "ada",
                "projects": ["p1"],
                "tags": {"t1": {"label": "urgent", "color": "#d33"}}
            },
            "projects": {"p1": {"_id": "p1", "title": "Groceries"}},
            "tasks": {}
        }"##;
        let data: AllUserData = serde_json::from_str(json).unwrap();
        assert_eq!(data.user.user_name, "ada");
        assert_eq!(data.user.projects, vec!["p1"]);
        assert_eq!(data.user.tags.get("t1").unwrap().label, "urgent");
        assert_eq!(data.projects.get("p1").unwrap().title, "Groceries");
        assert!(data.tasks.is_empty());
    }

    #[test]
    fn minimal_user_fills_defaults() {
        let user: User = serde_json::from_str(r#"{"_id": "u1"}"#).unwrap();
        assert_eq!(user.user_name, "");
        assert!(user.projects.is_empty());
        assert!(user.tags.is_empty());
    }
}
