use std::panic::{AssertUnwindSafe, catch_unwind};

use indexmap::IndexMap;
use serde_json::Value;

use crate::model::{Completable, CompletableType, Field};

/// Callback run when a completable changes. `None` means it was deleted.
pub type ListenerCallback = Box<dyn FnMut(Option<&Completable>)>;

/// A handle identifying one registration, usable with
/// [`ClientStore::unsubscribe`](crate::store::ClientStore::unsubscribe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerKey {
    pub kind: CompletableType,
    pub completable_id: String,
    pub listener_id: String,
}

struct PropertyListener {
    field: Field,
    last_seen: Value,
    callback: ListenerCallback,
}

/// Callback tables for one completable type, keyed by completable ID and then
/// by listener ID.
#[derive(Default)]
struct ListenerTable {
    entity: IndexMap<String, IndexMap<String, ListenerCallback>>,
    property: IndexMap<String, IndexMap<String, PropertyListener>>,
}

/// Per-entity and per-property callback registry.
///
/// Registration is lazy: listeners may be added for IDs the store has never
/// seen. Notification runs synchronously in insertion order; re-registering
/// an existing `(id, listener_id)` key replaces the callback but keeps its
/// original slot in that order. A panicking callback is isolated so the
/// remaining callbacks still run.
#[derive(Default)]
pub struct ListenerRegistry {
    projects: ListenerTable,
    tasks: ListenerTable,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_mut(&mut self, kind: CompletableType) -> &mut ListenerTable {
        match kind {
            CompletableType::Project => &mut self.projects,
            CompletableType::Task => &mut self.tasks,
        }
    }

    /// Register a callback for every change to one completable. Idempotent
    /// upsert: the last registration for a `(id, listener_id)` key wins.
    pub fn add(
        &mut self,
        kind: CompletableType,
        completable_id: &str,
        listener_id: &str,
        callback: ListenerCallback,
    ) -> ListenerKey {
        self.table_mut(kind)
            .entity
            .entry(completable_id.to_string())
            .or_default()
            .insert(listener_id.to_string(), callback);
        ListenerKey {
            kind,
            completable_id: completable_id.to_string(),
            listener_id: listener_id.to_string(),
        }
    }

    /// Register a callback that fires only when `field`'s value differs from
    /// its previously observed value. `initial` seeds the observed value
    /// (the entity's current value, or `Null` if it does not exist yet).
    pub fn add_property(
        &mut self,
        kind: CompletableType,
        completable_id: &str,
        listener_id: &str,
        field: Field,
        initial: Value,
        callback: ListenerCallback,
    ) -> ListenerKey {
        self.table_mut(kind).property.entry(completable_id.to_string()).or_default().insert(
            listener_id.to_string(),
            PropertyListener { field, last_seen: initial, callback },
        );
        ListenerKey {
            kind,
            completable_id: completable_id.to_string(),
            listener_id: listener_id.to_string(),
        }
    }

    /// Remove one registration. No-op if absent.
    pub fn remove(&mut self, kind: CompletableType, completable_id: &str, listener_id: &str) {
        let table = self.table_mut(kind);
        if let Some(listeners) = table.entity.get_mut(completable_id) {
            listeners.shift_remove(listener_id);
        }
        if let Some(listeners) = table.property.get_mut(completable_id) {
            listeners.shift_remove(listener_id);
        }
    }

    /// Drop every registration for one completable (called on delete so
    /// tombstoned entities do not leak callbacks).
    pub fn remove_all(&mut self, kind: CompletableType, completable_id: &str) {
        let table = self.table_mut(kind);
        table.entity.shift_remove(completable_id);
        table.property.shift_remove(completable_id);
    }

    /// Run every callback registered on `completable_id` with the update.
    /// `None` is the deletion tombstone and fires property listeners too.
    pub fn notify(
        &mut self,
        kind: CompletableType,
        completable_id: &str,
        update: Option<&Completable>,
    ) {
        let table = self.table_mut(kind);
        if let Some(listeners) = table.entity.get_mut(completable_id) {
            for (listener_id, callback) in listeners.iter_mut() {
                run_isolated(listener_id, kind, completable_id, callback, update);
            }
        }
        if let Some(listeners) = table.property.get_mut(completable_id) {
            for (listener_id, listener) in listeners.iter_mut() {
                match update {
                    Some(completable) => {
                        let current = listener.field.value_of(completable);
                        if current != listener.last_seen {
                            listener.last_seen = current;
                            run_isolated(
                                listener_id,
                                kind,
                                completable_id,
                                &mut listener.callback,
                                update,
                            );
                        }
                    }
                    None => run_isolated(
                        listener_id,
                        kind,
                        completable_id,
                        &mut listener.callback,
                        None,
                    ),
                }
            }
        }
    }
}

/// A panicking subscriber must not prevent the remaining subscribers from
/// being notified.
fn run_isolated(
    listener_id: &str,
    kind: CompletableType,
    completable_id: &str,
    callback: &mut ListenerCallback,
    update: Option<&Completable>,
) {
    if catch_unwind(AssertUnwindSafe(|| callback(update))).is_err() {
        log::warn!("listener {listener_id} panicked while handling {kind} {completable_id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn counting(hits: &Rc<RefCell<Vec<Option<String>>>>) -> ListenerCallback {
        let hits = Rc::clone(hits);
        Box::new(move |update| {
            hits.borrow_mut().push(update.map(|c| c.title.clone()));
        })
    }

    #[test]
    fn notifies_in_insertion_order() {
        let mut registry = ListenerRegistry::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for name in ["row", "details", "table"] {
            let order = Rc::clone(&order);
            registry.add(
                CompletableType::Task,
                "t1",
                name,
                Box::new(move |_| order.borrow_mut().push(name)),
            );
        }
        let task = Completable::new("t1", "Milk");
        registry.notify(CompletableType::Task, "t1", Some(&task));
        assert_eq!(*order.borrow(), vec!["row", "details", "table"]);
    }

    #[test]
    fn reregistration_replaces_callback_but_keeps_slot() {
        let mut registry = ListenerRegistry::new();
        let hits = Rc::new(RefCell::new(Vec::new()));
        registry.add(CompletableType::Task, "t1", "row", Box::new(|_| {}));
        registry.add(CompletableType::Task, "t1", "row", counting(&hits));
        let task = Completable::new("t1", "Milk");
        registry.notify(CompletableType::Task, "t1", Some(&task));
        // replacement ran exactly once, the stale callback not at all
        assert_eq!(*hits.borrow(), vec![Some("Milk".to_string())]);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = ListenerRegistry::new();
        let hits = Rc::new(RefCell::new(Vec::new()));
        registry.add(CompletableType::Project, "p1", "row", counting(&hits));
        registry.remove(CompletableType::Project, "p1", "row");
        registry.remove(CompletableType::Project, "p1", "row");
        registry.remove(CompletableType::Project, "never-added", "row");
        let project = Completable::new("p1", "Groceries");
        registry.notify(CompletableType::Project, "p1", Some(&project));
        assert!(hits.borrow().is_empty());
    }

    #[test]
    fn panicking_listener_does_not_block_the_rest() {
        let mut registry = ListenerRegistry::new();
        let hits = Rc::new(RefCell::new(Vec::new()));
        registry.add(
            CompletableType::Task,
            "t1",
            "bad",
            Box::new(|_| panic!("subscriber bug")),
        );
        registry.add(CompletableType::Task, "t1", "good", counting(&hits));

        let previous_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));
        let task = Completable::new("t1", "Milk");
        registry.notify(CompletableType::Task, "t1", Some(&task));
        std::panic::set_hook(previous_hook);

        assert_eq!(*hits.borrow(), vec![Some("Milk".to_string())]);
    }

    #[test]
    fn property_listener_fires_only_on_change() {
        let mut registry = ListenerRegistry::new();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let task = Completable::new("t1", "Milk");
        registry.add_property(
            CompletableType::Task,
            "t1",
            "title-watch",
            Field::Title,
            Field::Title.value_of(&task),
            counting(&hits),
        );

        // unrelated field change: no fire
        let mut updated = task.clone();
        updated.priority = 3;
        registry.notify(CompletableType::Task, "t1", Some(&updated));
        assert!(hits.borrow().is_empty());

        // watched field change: fires once
        updated.title = "Oat milk".into();
        registry.notify(CompletableType::Task, "t1", Some(&updated));
        registry.notify(CompletableType::Task, "t1", Some(&updated));
        assert_eq!(*hits.borrow(), vec![Some("Oat milk".to_string())]);
    }

    #[test]
    fn property_listener_receives_tombstone() {
        let mut registry = ListenerRegistry::new();
        let hits = Rc::new(RefCell::new(Vec::new()));
        registry.add_property(
            CompletableType::Task,
            "t1",
            "title-watch",
            Field::Title,
            serde_json::Value::Null,
            counting(&hits),
        );
        registry.notify(CompletableType::Task, "t1", None);
        assert_eq!(*hits.borrow(), vec![None]);
    }
}
