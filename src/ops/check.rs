use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::CompletableType;
use crate::store::ClientStore;

/// Structured result from a store consistency check, suitable for JSON output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
}

/// A consistency error (something that should be fixed or pruned).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// A subtask list references an ID with no task in the store
    #[serde(rename = "dangling_subtask")]
    DanglingSubtask {
        parent_kind: CompletableType,
        parent_id: String,
        child_id: String,
    },
    /// A prereq list references an ID with no task in the store
    #[serde(rename = "dangling_prereq")]
    DanglingPrereq { task_id: String, prereq_id: String },
    /// Prereq edges form a loop
    #[serde(rename = "prereq_cycle")]
    PrereqCycle { task_ids: Vec<String> },
    /// A completable carries a tag ID absent from the user's dictionary
    #[serde(rename = "unknown_tag")]
    UnknownTag {
        kind: CompletableType,
        id: String,
        tag: String,
    },
}

/// Validate the store and return structured results.
///
/// This is a read-only operation — it does not modify the store.
///
/// Checks performed:
/// 1. All subtask references resolve to tasks present in the store
/// 2. All prereq references resolve to tasks present in the store
/// 3. The prereq graph is acyclic
/// 4. All tag IDs exist in the user's tag dictionary (when a user is loaded)
pub fn check_store(store: &ClientStore) -> CheckResult {
    let mut result = CheckResult::default();

    for (kind, mapping) in [
        (CompletableType::Project, store.projects()),
        (CompletableType::Task, store.tasks()),
    ] {
        for completable in mapping.values() {
            for child_id in &completable.subtasks {
                if !store.contains(CompletableType::Task, child_id) {
                    result.errors.push(CheckError::DanglingSubtask {
                        parent_kind: kind,
                        parent_id: completable.id.clone(),
                        child_id: child_id.clone(),
                    });
                }
            }
            if let Some(user) = store.user() {
                for tag in &completable.tags {
                    if !user.tags.contains_key(tag) {
                        result.errors.push(CheckError::UnknownTag {
                            kind,
                            id: completable.id.clone(),
                            tag: tag.clone(),
                        });
                    }
                }
            }
        }
    }

    for task in store.tasks().values() {
        for prereq_id in &task.prereq_tasks {
            if !store.contains(CompletableType::Task, prereq_id) {
                result.errors.push(CheckError::DanglingPrereq {
                    task_id: task.id.clone(),
                    prereq_id: prereq_id.clone(),
                });
            }
        }
    }

    for cycle in find_prereq_cycles(store) {
        result.errors.push(CheckError::PrereqCycle { task_ids: cycle });
    }

    result.valid = result.errors.is_empty();
    result
}

/// Prune every subtask/prereq reference that does not resolve to an entity in
/// the store; the referent is treated as logically deleted. Rewrites go
/// through the store setter so listeners see them. Returns how many
/// references were removed.
pub fn prune_dangling(store: &mut ClientStore) -> usize {
    let mut rewrites = Vec::new();
    let mut pruned = 0;
    for (kind, mapping) in [
        (CompletableType::Project, store.projects()),
        (CompletableType::Task, store.tasks()),
    ] {
        for completable in mapping.values() {
            let count = completable
                .subtasks
                .iter()
                .filter(|s| !store.contains(CompletableType::Task, s))
                .count()
                + completable
                    .prereq_tasks
                    .iter()
                    .filter(|p| !store.contains(CompletableType::Task, p))
                    .count();
            if count > 0 {
                let mut updated = completable.clone();
                updated.subtasks.retain(|s| store.contains(CompletableType::Task, s));
                updated
                    .prereq_tasks
                    .retain(|p| store.contains(CompletableType::Task, p));
                rewrites.push((kind, updated));
                pruned += count;
            }
        }
    }
    for (kind, updated) in rewrites {
        store.set(kind, updated);
    }
    pruned
}

/// Depth-first cycle scan over the prereq graph. Returns each cycle once, as
/// the task IDs along the loop.
fn find_prereq_cycles(store: &ClientStore) -> Vec<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut cycles = Vec::new();

    fn visit<'a>(
        store: &'a ClientStore,
        id: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        match marks.get(id) {
            Some(Mark::Done) => return,
            Some(Mark::Visiting) => {
                // back edge: the cycle is the path suffix from `id` onward
                let start = path.iter().position(|p| *p == id).unwrap_or(0);
                cycles.push(path[start..].iter().map(|p| p.to_string()).collect());
                return;
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        path.push(id);
        if let Ok(task) = store.get(CompletableType::Task, id) {
            for prereq_id in &task.prereq_tasks {
                visit(store, prereq_id, marks, path, cycles);
            }
        }
        path.pop();
        marks.insert(id, Mark::Done);
    }

    let mut path = Vec::new();
    for id in store.tasks().keys() {
        visit(store, id, &mut marks, &mut path, &mut cycles);
    }
    // DFS order can report the same loop from different entry points
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    cycles.retain(|cycle| {
        let mut canonical = cycle.clone();
        canonical.sort();
        seen.insert(canonical)
    });
    cycles
}
