//! REST persistence: the HTTP client plus the flows that tie server
//! responses back into the store.
//!
//! Responses may arrive out of order relative to request issuance, so every
//! flow reconciles by entity ID with the edit sequence captured at send time,
//! never by request order.

pub mod client;
pub mod reconcile;

pub use client::{RemoteClient, SyncError};
pub use reconcile::completables_match;

use crate::model::{Completable, CompletableType};
use crate::ops;
use crate::store::{ClientStore, SaveBatch, SaveTimer};

/// A persistence failure for one entity in a flushed batch. The local
/// optimistic value stays in place; nothing is retried automatically.
#[derive(Debug)]
pub struct SaveFailure {
    pub kind: CompletableType,
    pub id: String,
    pub error: SyncError,
}

/// Fetch the signed-in user's full bundle and load it into the store.
pub fn load_user(
    client: &RemoteClient,
    store: &mut ClientStore,
    user_id: &str,
) -> Result<(), SyncError> {
    let data = client.fetch_user_data(user_id)?;
    store.load_user_data(data);
    Ok(())
}

/// Create a project on the server, insert the returned document, and append
/// it to the signed-in user's project list. Returns the new project's ID.
pub fn create_project(
    client: &RemoteClient,
    store: &mut ClientStore,
    title: &str,
) -> Result<String, SyncError> {
    let user_id = store.user().map(|u| u.id.clone()).ok_or(SyncError::NotSignedIn)?;
    let project = client.create_project(&user_id, title)?;
    let project_id = project.id.clone();
    store.set(CompletableType::Project, project);
    if let Some(user) = store.user_mut() {
        user.projects.push(project_id.clone());
    }
    Ok(project_id)
}

/// Create a task on the server under a project or task parent and mirror the
/// result locally. Returns the new task's ID.
pub fn create_task(
    client: &RemoteClient,
    store: &mut ClientStore,
    parent_kind: CompletableType,
    parent_id: &str,
    title: &str,
) -> Result<String, SyncError> {
    store.get(parent_kind, parent_id)?;
    let task = client.create_task(parent_kind, parent_id, title)?;
    let task_id = task.id.clone();
    ops::attach_subtask(store, parent_kind, parent_id, task)?;
    Ok(task_id)
}

/// Delete an entity on the server, then cascade the deletion locally (the
/// subtree goes away and every reference to it is pruned). Returns the
/// document the server reported as deleted.
pub fn delete_remote(
    client: &RemoteClient,
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
) -> Result<Completable, SyncError> {
    let deleted = client.delete_completable(kind, id)?;
    ops::delete_completable(store, saver, kind, id)?;
    Ok(deleted)
}

/// Persist a flushed batch of dirty entities, one PATCH per entity.
///
/// For each entity the local edit sequence is captured before the request, so
/// an echo arriving after a newer local edit is dropped (last local edit
/// wins). Failures are collected and returned for user-visible messaging;
/// the failed entities keep their local optimistic values.
pub fn save_batch(
    client: &RemoteClient,
    store: &mut ClientStore,
    batch: SaveBatch,
) -> Vec<SaveFailure> {
    let mut failures = Vec::new();
    for (kind, completable) in batch {
        let id = completable.id.clone();
        if !store.contains(kind, &id) {
            // deleted while the flush was pending
            continue;
        }
        let as_of = store.last_edit(kind, &id);
        match client.patch_completable(kind, &completable) {
            Ok(echoed) => {
                store.reconcile(kind, echoed, as_of);
            }
            Err(error) => {
                log::warn!("failed to save {kind} {id}: {error}");
                failures.push(SaveFailure { kind, id, error });
            }
        }
    }
    failures
}
