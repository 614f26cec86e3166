//! Namespace Registry
//!
//! Lookup table of namespaces by name. One registry is created at startup
//! and shared (behind an `Arc`) with every component that resolves
//! namespaces, such as the peer server.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::group::{Group, Loader};
use super::metrics::GroupStats;

/// Namespaces by name
#[derive(Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a namespace and register it under `name`.
    ///
    /// An existing namespace with the same name is replaced, not merged.
    pub fn create_namespace(
        &self,
        name: impl Into<String>,
        capacity_bytes: u64,
        loader: Arc<dyn Loader>,
    ) -> Arc<Group> {
        let name = name.into();
        let group = Arc::new(Group::new(name.clone(), capacity_bytes, loader));

        let replaced = self
            .groups
            .write()
            .insert(name.clone(), Arc::clone(&group))
            .is_some();

        info!(namespace = %name, capacity_bytes, replaced, "Namespace created");
        group
    }

    /// Namespace registered under `name`
    pub fn lookup(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Registered namespace names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered namespaces
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// Check if no namespace is registered
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Stats for every namespace, sorted by name
    pub fn stats(&self) -> Vec<GroupStats> {
        let groups: Vec<Arc<Group>> = self.groups.read().values().cloned().collect();
        let mut stats: Vec<GroupStats> = groups.iter().map(|g| g.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("namespaces", &self.names())
            .finish()
    }
}
