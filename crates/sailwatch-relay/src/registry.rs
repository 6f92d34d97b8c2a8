//! The set of viewers eligible for live frames.
//!
//! Membership is keyed by [`ConnectionId`], so adding the same viewer
//! twice or removing an absent one are both no-ops. Iteration always runs
//! over a point-in-time copy taken by [`ConnectionRegistry::snapshot`]:
//! members may be removed while a fan-out is in progress, and viewers
//! registered after the copy was taken are not visited.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sailwatch_types::ConnectionId;

use crate::viewer::Viewer;

/// Concurrent registry of open viewer connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    members: DashMap<ConnectionId, Arc<dyn Viewer>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `viewer` unless a viewer with the same id is present.
    ///
    /// Returns `true` if the viewer was inserted.
    pub fn add(&self, viewer: Arc<dyn Viewer>) -> bool {
        match self.members.entry(viewer.id()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(viewer);
                true
            }
        }
    }

    /// Remove the viewer with this id, if present.
    ///
    /// Returns `true` if a member was removed.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.members.remove(&id).is_some()
    }

    /// Whether a viewer with this id is registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains_key(&id)
    }

    /// Number of registered viewers.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no viewers are registered.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Copy the current members out of the map.
    ///
    /// No map locks are held once this returns.
    pub fn snapshot(&self) -> Vec<Arc<dyn Viewer>> {
        self.members
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Apply `f` to every member of a fresh [`snapshot`](Self::snapshot).
    ///
    /// `f` may add to or remove from this registry.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<dyn Viewer>),
    {
        for viewer in self.snapshot() {
            f(&viewer);
        }
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("len", &self.members.len())
            .finish()
    }
}
