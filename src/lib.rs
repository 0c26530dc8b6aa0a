//! Client-side data layer for a hierarchical project/task tracker.
//!
//! The crate holds the authoritative in-RAM copy of a signed-in user's
//! projects and tasks ([`store::ClientStore`]), fans change notifications out
//! to registered listeners, coalesces rapid edits behind a debounce timer
//! ([`store::SaveTimer`]), and persists through a REST client
//! ([`sync::RemoteClient`]) that reconciles server echoes back into the store.

pub mod model;
pub mod ops;
pub mod store;
pub mod sync;
