pub mod listeners;
pub mod saver;

pub use listeners::{ListenerCallback, ListenerKey, ListenerRegistry};
pub use saver::{FlushFn, SaveBatch, SaveTimer};

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::model::{AllUserData, Completable, CompletableType, Field, User};

/// Error type for store lookups
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: CompletableType, id: String },
}

/// The in-RAM copy of everything the signed-in user owns.
///
/// One instance per session, created at login and dropped at logout; all
/// consumers hold a reference to the same instance rather than going through
/// process-wide state. Entities are only mutated through [`ClientStore::set`]
/// and [`ClientStore::delete`], which notify registered listeners
/// synchronously. Single-threaded by design: mutations and their
/// notifications run to completion on the UI event loop before the next
/// mutation starts.
pub struct ClientStore {
    user: Option<User>,
    projects: IndexMap<String, Completable>,
    tasks: IndexMap<String, Completable>,
    listeners: ListenerRegistry,
    /// Monotonic counter bumped on every local mutation.
    edit_seq: u64,
    /// Per-entity sequence of the most recent local mutation, consulted when
    /// reconciling server echoes (last local edit wins).
    edited: HashMap<(CompletableType, String), u64>,
}

impl ClientStore {
    pub fn new() -> Self {
        ClientStore {
            user: None,
            projects: IndexMap::new(),
            tasks: IndexMap::new(),
            listeners: ListenerRegistry::new(),
            edit_seq: 0,
            edited: HashMap::new(),
        }
    }

    fn mapping(&self, kind: CompletableType) -> &IndexMap<String, Completable> {
        match kind {
            CompletableType::Project => &self.projects,
            CompletableType::Task => &self.tasks,
        }
    }

    fn mapping_mut(&mut self, kind: CompletableType) -> &mut IndexMap<String, Completable> {
        match kind {
            CompletableType::Project => &mut self.projects,
            CompletableType::Task => &mut self.tasks,
        }
    }

    // -----------------------------------------------------------------------
    // Initial load
    // -----------------------------------------------------------------------

    /// Replace the entire mapping for a type. Does not notify listeners;
    /// meant for the initial load, before anything has subscribed.
    pub fn set_all(&mut self, kind: CompletableType, mapping: IndexMap<String, Completable>) {
        *self.mapping_mut(kind) = mapping;
    }

    /// Load a whole `GET /api/users/{id}` bundle at once.
    pub fn load_user_data(&mut self, data: AllUserData) {
        self.user = Some(data.user);
        self.set_all(CompletableType::Project, data.projects);
        self.set_all(CompletableType::Task, data.tasks);
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_mut(&mut self) -> Option<&mut User> {
        self.user.as_mut()
    }

    pub fn set_user(&mut self, user: User) {
        self.user = Some(user);
    }

    // -----------------------------------------------------------------------
    // Entity access and mutation
    // -----------------------------------------------------------------------

    pub fn get(&self, kind: CompletableType, id: &str) -> Result<&Completable, StoreError> {
        self.mapping(kind).get(id).ok_or_else(|| StoreError::NotFound {
            kind,
            id: id.to_string(),
        })
    }

    pub fn contains(&self, kind: CompletableType, id: &str) -> bool {
        self.mapping(kind).contains_key(id)
    }

    pub fn projects(&self) -> &IndexMap<String, Completable> {
        &self.projects
    }

    pub fn tasks(&self) -> &IndexMap<String, Completable> {
        &self.tasks
    }

    /// Upsert an entity under its own ID and synchronously notify every
    /// listener registered on that ID with the new value.
    pub fn set(&mut self, kind: CompletableType, completable: Completable) {
        let id = completable.id.clone();
        self.bump_edit(kind, &id);
        self.mapping_mut(kind).insert(id.clone(), completable);
        log::debug!("set {kind} {id}, notifying listeners");
        // borrow the mapping and the registry as disjoint fields so the
        // freshly inserted value can be handed to the callbacks
        let current = match kind {
            CompletableType::Project => &self.projects[&id],
            CompletableType::Task => &self.tasks[&id],
        };
        self.listeners.notify(kind, &id, Some(current));
    }

    /// Remove an entity, notify its listeners with the deletion tombstone,
    /// then clear its registrations so nothing stale fires later.
    pub fn delete(
        &mut self,
        kind: CompletableType,
        id: &str,
    ) -> Result<Completable, StoreError> {
        let removed = self
            .mapping_mut(kind)
            .shift_remove(id)
            .ok_or_else(|| StoreError::NotFound { kind, id: id.to_string() })?;
        self.bump_edit(kind, id);
        log::debug!("deleted {kind} {id}, sending tombstone");
        self.listeners.notify(kind, id, None);
        self.listeners.remove_all(kind, id);
        Ok(removed)
    }

    fn bump_edit(&mut self, kind: CompletableType, id: &str) {
        self.edit_seq += 1;
        self.edited.insert((kind, id.to_string()), self.edit_seq);
    }

    // -----------------------------------------------------------------------
    // Server reconciliation
    // -----------------------------------------------------------------------

    /// The sequence of the most recent local mutation of an entity, or 0 if
    /// it was never mutated locally. Capture this before issuing a request.
    pub fn last_edit(&self, kind: CompletableType, id: &str) -> u64 {
        self.edited.get(&(kind, id.to_string())).copied().unwrap_or(0)
    }

    /// Merge a server echo into the store, keyed by entity ID rather than
    /// request order. If the entity was edited locally after `as_of` (the
    /// `last_edit` captured when the request was sent), the echo is stale and
    /// is dropped: the last local edit wins. Returns whether it was applied.
    pub fn reconcile(
        &mut self,
        kind: CompletableType,
        completable: Completable,
        as_of: u64,
    ) -> bool {
        let id = completable.id.clone();
        if self.last_edit(kind, &id) > as_of {
            log::debug!("dropping stale server echo for {kind} {id}");
            return false;
        }
        self.set(kind, completable);
        true
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Subscribe to every change of one completable. Lazy: the entity does
    /// not have to exist yet. Returns a key for [`ClientStore::unsubscribe`].
    pub fn add_listener(
        &mut self,
        kind: CompletableType,
        completable_id: &str,
        listener_id: &str,
        callback: ListenerCallback,
    ) -> ListenerKey {
        self.listeners.add(kind, completable_id, listener_id, callback)
    }

    /// Subscribe to changes of a single field. Fires only when the field's
    /// value differs from the value last observed by this listener.
    pub fn add_property_listener(
        &mut self,
        kind: CompletableType,
        completable_id: &str,
        listener_id: &str,
        field: Field,
        callback: ListenerCallback,
    ) -> ListenerKey {
        let initial = self
            .mapping(kind)
            .get(completable_id)
            .map(|c| field.value_of(c))
            .unwrap_or(serde_json::Value::Null);
        self.listeners
            .add_property(kind, completable_id, listener_id, field, initial, callback)
    }

    /// Remove one registration. No-op if absent.
    pub fn remove_listener(
        &mut self,
        kind: CompletableType,
        completable_id: &str,
        listener_id: &str,
    ) {
        self.listeners.remove(kind, completable_id, listener_id);
    }

    /// Release a subscription acquired from `add_listener` or
    /// `add_property_listener`.
    pub fn unsubscribe(&mut self, key: &ListenerKey) {
        self.listeners.remove(key.kind, &key.completable_id, &key.listener_id);
    }
}

impl Default for ClientStore {
    fn default() -> Self {
        Self::new()
    }
}
