use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::model::{Completable, CompletableType};
use crate::store::{ClientStore, SaveTimer, StoreError};

/// Error type for local edit operations
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("task {0} cannot be its own prereq")]
    SelfPrereq(String),
    #[error("adding prereq {prereq_id} to task {task_id} would create a cycle")]
    PrereqCycle { task_id: String, prereq_id: String },
    #[error("tag {0} is not in the user's tag dictionary")]
    UnknownTag(String),
}

/// Clone-edit-set: every local edit goes through the store setter so
/// listeners fire, then marks the saver dirty so the edit flushes after the
/// quiet period.
fn apply_edit(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
    edit: impl FnOnce(&mut Completable),
) -> Result<(), EditError> {
    let mut updated = store.get(kind, id)?.clone();
    edit(&mut updated);
    saver.mark_dirty(kind, &updated);
    store.set(kind, updated);
    Ok(())
}

pub fn set_title(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
    title: String,
) -> Result<(), EditError> {
    apply_edit(store, saver, kind, id, |c| c.title = title)
}

pub fn set_note(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
    note: String,
) -> Result<(), EditError> {
    apply_edit(store, saver, kind, id, |c| c.note = note)
}

pub fn set_priority(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
    priority: i32,
) -> Result<(), EditError> {
    apply_edit(store, saver, kind, id, |c| c.priority = priority)
}

pub fn set_start_date(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
    start_date: Option<DateTime<Utc>>,
) -> Result<(), EditError> {
    apply_edit(store, saver, kind, id, |c| c.start_date = start_date)
}

pub fn set_due_date(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
    due_date: Option<DateTime<Utc>>,
) -> Result<(), EditError> {
    apply_edit(store, saver, kind, id, |c| c.due_date = due_date)
}

/// Set the completed flag. Completing stamps `completed_date` with the
/// current time; un-completing clears it.
pub fn set_completed(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
    completed: bool,
) -> Result<(), EditError> {
    apply_edit(store, saver, kind, id, |c| {
        c.completed = completed;
        c.completed_date = if completed { Some(Utc::now()) } else { None };
    })
}

pub fn add_tag(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
    tag_id: &str,
) -> Result<(), EditError> {
    if let Some(user) = store.user()
        && !user.tags.contains_key(tag_id)
    {
        return Err(EditError::UnknownTag(tag_id.to_string()));
    }
    apply_edit(store, saver, kind, id, |c| {
        if !c.tags.iter().any(|t| t == tag_id) {
            c.tags.push(tag_id.to_string());
        }
    })
}

pub fn remove_tag(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
    tag_id: &str,
) -> Result<(), EditError> {
    apply_edit(store, saver, kind, id, |c| c.tags.retain(|t| t != tag_id))
}

// ---------------------------------------------------------------------------
// Prereq edges
// ---------------------------------------------------------------------------

/// Add a dependency edge from `task_id` to `prereq_id`.
///
/// Cycles are rejected at write time: if `task_id` is already reachable from
/// `prereq_id` along prereq edges, the edge would close a loop and the edit
/// fails. Adding an edge that is already present is a no-op.
pub fn add_prereq(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    task_id: &str,
    prereq_id: &str,
) -> Result<(), EditError> {
    if task_id == prereq_id {
        return Err(EditError::SelfPrereq(task_id.to_string()));
    }
    store.get(CompletableType::Task, prereq_id)?;
    if reaches(store, prereq_id, task_id) {
        return Err(EditError::PrereqCycle {
            task_id: task_id.to_string(),
            prereq_id: prereq_id.to_string(),
        });
    }
    apply_edit(store, saver, CompletableType::Task, task_id, |c| {
        if !c.prereq_tasks.iter().any(|p| p == prereq_id) {
            c.prereq_tasks.push(prereq_id.to_string());
        }
    })
}

pub fn remove_prereq(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    task_id: &str,
    prereq_id: &str,
) -> Result<(), EditError> {
    apply_edit(store, saver, CompletableType::Task, task_id, |c| {
        c.prereq_tasks.retain(|p| p != prereq_id)
    })
}

/// Whether `to` is reachable from `from` along prereq edges.
fn reaches(store: &ClientStore, from: &str, to: &str) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![from.to_string()];
    while let Some(id) = stack.pop() {
        if id == to {
            return true;
        }
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Ok(task) = store.get(CompletableType::Task, &id) {
            stack.extend(task.prereq_tasks.iter().cloned());
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

/// Mirror a freshly created subtask into the store: insert the task and
/// append its ID to the parent's subtask list. Neither write is marked dirty;
/// the server already made both sides of this change when it answered the
/// create request.
pub fn attach_subtask(
    store: &mut ClientStore,
    parent_kind: CompletableType,
    parent_id: &str,
    task: Completable,
) -> Result<(), EditError> {
    let mut parent = store.get(parent_kind, parent_id)?.clone();
    let task_id = task.id.clone();
    store.set(CompletableType::Task, task);
    if !parent.subtasks.iter().any(|s| s == &task_id) {
        parent.subtasks.push(task_id);
        store.set(parent_kind, parent);
    }
    Ok(())
}

/// Delete a completable and its whole subtask subtree, then prune every
/// reference to the deleted IDs from the remaining entities (and from the
/// user's project list). The server cascades its own side on DELETE, so the
/// pruning writes are local only and are never re-saved; deleted entities are
/// also dropped from the saver's dirty set so no patch fires for them later.
pub fn delete_completable(
    store: &mut ClientStore,
    saver: &mut SaveTimer,
    kind: CompletableType,
    id: &str,
) -> Result<Completable, EditError> {
    let root = store.get(kind, id)?.clone();

    // collect the subtree (children are always tasks)
    let mut doomed_tasks = Vec::new();
    let mut stack = root.subtasks.clone();
    let mut seen = HashSet::new();
    while let Some(task_id) = stack.pop() {
        if !seen.insert(task_id.clone()) {
            continue;
        }
        if let Ok(task) = store.get(CompletableType::Task, &task_id) {
            stack.extend(task.subtasks.iter().cloned());
            doomed_tasks.push(task_id);
        }
    }

    saver.forget(kind, id);
    let removed = store.delete(kind, id)?;
    for task_id in &doomed_tasks {
        saver.forget(CompletableType::Task, task_id);
        // subtree entries were verified present while collecting
        let _ = store.delete(CompletableType::Task, task_id);
    }

    let mut dead: HashSet<&str> = doomed_tasks.iter().map(String::as_str).collect();
    dead.insert(id);
    prune_references(store, &dead);

    if kind == CompletableType::Project
        && let Some(user) = store.user_mut()
    {
        user.projects.retain(|p| p != id);
    }

    Ok(removed)
}

/// Rewrite any remaining entity whose reference lists mention a dead ID.
/// Goes through the store setter so listeners see the change.
fn prune_references(store: &mut ClientStore, dead: &HashSet<&str>) {
    let mut rewrites = Vec::new();
    for (kind, mapping) in [
        (CompletableType::Project, store.projects()),
        (CompletableType::Task, store.tasks()),
    ] {
        for completable in mapping.values() {
            if completable.subtasks.iter().any(|s| dead.contains(s.as_str()))
                || completable.prereq_tasks.iter().any(|p| dead.contains(p.as_str()))
            {
                let mut updated = completable.clone();
                updated.subtasks.retain(|s| !dead.contains(s.as_str()));
                updated.prereq_tasks.retain(|p| !dead.contains(p.as_str()));
                rewrites.push((kind, updated));
            }
        }
    }
    for (kind, updated) in rewrites {
        store.set(kind, updated);
    }
}
