use reqwest::blocking::{Client, Response};
use serde_json::json;

use super::reconcile::completables_match;
use crate::model::{AllUserData, ClientConfig, Completable, CompletableType, User};
use crate::store::StoreError;

/// Error type for remote persistence
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server returned {status} for {method} {url}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },
    #[error("a title is required to create a {0}")]
    MissingTitle(CompletableType),
    #[error("server echo for {kind} {id} does not match the saved document")]
    Mismatch { kind: CompletableType, id: String },
    #[error("no user is signed in")]
    NotSignedIn,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Edit(#[from] crate::ops::EditError),
}

/// Blocking REST client for the tracker API. All endpoints exchange JSON;
/// dates come back as ISO strings and are re-hydrated by serde on the way in.
pub struct RemoteClient {
    http: Client,
    base_url: String,
}

fn plural(kind: CompletableType) -> &'static str {
    match kind {
        CompletableType::Project => "projects",
        CompletableType::Task => "tasks",
    }
}

impl RemoteClient {
    pub fn new(config: &ClientConfig) -> Self {
        RemoteClient {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(
        method: &'static str,
        url: &str,
        response: Response,
    ) -> Result<Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(SyncError::Status {
                method,
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }

    /// `GET /api/users/{id}` — the user plus every owned project and task.
    pub fn fetch_user_data(&self, user_id: &str) -> Result<AllUserData, SyncError> {
        let url = self.url(&format!("/api/users/{user_id}"));
        let response = Self::check("GET", &url, self.http.get(&url).send()?)?;
        Ok(response.json()?)
    }

    /// `GET /api/users/{id}` narrowed to the user document alone, for
    /// callers that do not need the owned projects and tasks.
    pub fn fetch_user(&self, user_id: &str) -> Result<User, SyncError> {
        Ok(self.fetch_user_data(user_id)?.user)
    }

    /// `PATCH /api/users/{id}` — returns the canonical user document.
    pub fn patch_user(&self, user: &User) -> Result<User, SyncError> {
        let url = self.url(&format!("/api/users/{}", user.id));
        let response = Self::check("PATCH", &url, self.http.patch(&url).json(user).send()?)?;
        Ok(response.json()?)
    }

    /// `DELETE /api/users/{id}` — the server cascades to owned projects and
    /// tasks; returns the deleted user document.
    pub fn delete_user(&self, user_id: &str) -> Result<User, SyncError> {
        let url = self.url(&format!("/api/users/{user_id}"));
        let response = Self::check("DELETE", &url, self.http.delete(&url).send()?)?;
        Ok(response.json()?)
    }

    /// `GET /api/projects/{id}`
    pub fn fetch_project(&self, project_id: &str) -> Result<Completable, SyncError> {
        let url = self.url(&format!("/api/projects/{project_id}"));
        let response = Self::check("GET", &url, self.http.get(&url).send()?)?;
        Ok(response.json()?)
    }

    /// `POST /api/users/{id}/projects` with `{title}` — returns the created
    /// project. An empty title fails locally, mirroring the server's 400.
    pub fn create_project(&self, user_id: &str, title: &str) -> Result<Completable, SyncError> {
        if title.trim().is_empty() {
            return Err(SyncError::MissingTitle(CompletableType::Project));
        }
        let url = self.url(&format!("/api/users/{user_id}/projects"));
        let body = json!({ "title": title });
        let response = Self::check("POST", &url, self.http.post(&url).json(&body).send()?)?;
        Ok(response.json()?)
    }

    /// `POST /api/projects/{id}/subtasks` or `POST /api/tasks/{id}/subtasks`
    /// with `{title}` — returns the created task, already appended to the
    /// parent's subtask list on the server side.
    pub fn create_task(
        &self,
        parent_kind: CompletableType,
        parent_id: &str,
        title: &str,
    ) -> Result<Completable, SyncError> {
        if title.trim().is_empty() {
            return Err(SyncError::MissingTitle(CompletableType::Task));
        }
        let url = self.url(&format!("/api/{}/{parent_id}/subtasks", plural(parent_kind)));
        let body = json!({ "title": title });
        let response = Self::check("POST", &url, self.http.post(&url).json(&body).send()?)?;
        Ok(response.json()?)
    }

    /// `PATCH /api/projects/{id}` or `PATCH /api/tasks/{id}` with the full
    /// document. The echoed canonical document is compared field by field
    /// against what was sent; a disagreement is reported as
    /// [`SyncError::Mismatch`] and is not retried.
    pub fn patch_completable(
        &self,
        kind: CompletableType,
        completable: &Completable,
    ) -> Result<Completable, SyncError> {
        let url = self.url(&format!("/api/{}/{}", plural(kind), completable.id));
        let response =
            Self::check("PATCH", &url, self.http.patch(&url).json(completable).send()?)?;
        let echoed: Completable = response.json()?;
        if !completables_match(completable, &echoed) {
            return Err(SyncError::Mismatch {
                kind,
                id: completable.id.clone(),
            });
        }
        Ok(echoed)
    }

    /// `DELETE /api/projects/{id}` or `DELETE /api/tasks/{id}` — returns the
    /// deleted document; the server removes it from parent references.
    pub fn delete_completable(
        &self,
        kind: CompletableType,
        id: &str,
    ) -> Result<Completable, SyncError> {
        let url = self.url(&format!("/api/{}/{id}", plural(kind)));
        let response = Self::check("DELETE", &url, self.http.delete(&url).send()?)?;
        Ok(response.json()?)
    }

    /// `GET /logout` — destroys the session server-side.
    pub fn logout(&self) -> Result<(), SyncError> {
        let url = self.url("/logout");
        Self::check("GET", &url, self.http.get(&url).send()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RemoteClient {
        let config = ClientConfig {
            base_url: "http://localhost:8055/".to_string(),
            ..ClientConfig::default()
        };
        RemoteClient::new(&config)
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = client();
        assert_eq!(
            client.url("/api/tasks/t1"),
            "http://localhost:8055/api/tasks/t1"
        );
    }

    #[test]
    fn empty_titles_fail_before_any_request() {
        let client = client();
        assert!(matches!(
            client.create_project("u1", "  "),
            Err(SyncError::MissingTitle(CompletableType::Project))
        ));
        assert!(matches!(
            client.create_task(CompletableType::Task, "t1", ""),
            Err(SyncError::MissingTitle(CompletableType::Task))
        ));
    }
}
