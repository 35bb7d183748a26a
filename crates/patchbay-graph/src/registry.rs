//! Registry of live graphs
//!
//! Maps graph ids to their parent so nested graphs can be resolved by id.
//! The registry is an explicit handle passed to the code that needs it;
//! clones share the same table.

use indexmap::IndexMap;
use parking_lot::RwLock;
use patchbay_types::GraphId;
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry record for one graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEntry {
    /// Graph id
    pub uid: GraphId,
    /// Containing graph, none for top-level patches
    pub parent: Option<GraphId>,
}

/// Shared table of live graphs
#[derive(Debug, Clone, Default)]
pub struct GraphRegistry {
    graphs: Arc<RwLock<IndexMap<GraphId, GraphEntry>>>,
}

impl GraphRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a graph; re-registering updates its parent.
    /// Returns `true` when the graph was not yet known.
    pub fn register(&self, uid: GraphId, parent: Option<GraphId>) -> bool {
        debug!(graph = %uid, parent = ?parent, "registering graph");
        let entry = GraphEntry {
            uid: uid.clone(),
            parent,
        };
        self.graphs.write().insert(uid, entry).is_none()
    }

    /// Remove a single graph
    pub fn unregister(&self, uid: &GraphId) -> Option<GraphEntry> {
        self.graphs.write().shift_remove(uid)
    }

    /// Remove a graph and every graph nested below it
    pub fn unregister_tree(&self, uid: &GraphId) -> usize {
        let mut graphs = self.graphs.write();
        let mut pending = vec![uid.clone()];
        let mut removed = 0;

        while let Some(current) = pending.pop() {
            if graphs.shift_remove(&current).is_some() {
                removed += 1;
            }
            pending.extend(
                graphs
                    .values()
                    .filter(|e| e.parent.as_ref() == Some(&current))
                    .map(|e| e.uid.clone()),
            );
        }

        debug!(graph = %uid, removed, "unregistered graph tree");
        removed
    }

    /// Look up a graph, logging a miss
    #[must_use]
    pub fn resolve(&self, uid: &GraphId) -> Option<GraphEntry> {
        let found = self.graphs.read().get(uid).cloned();
        if found.is_none() {
            warn!(graph = %uid, "graph not found in registry");
        }
        found
    }

    /// Whether a graph is registered
    #[must_use]
    pub fn contains(&self, uid: &GraphId) -> bool {
        self.graphs.read().contains_key(uid)
    }

    /// Parent of a registered graph
    #[must_use]
    pub fn parent_of(&self, uid: &GraphId) -> Option<GraphId> {
        self.graphs.read().get(uid).and_then(|e| e.parent.clone())
    }

    /// Graphs directly nested in `uid`
    #[must_use]
    pub fn children_of(&self, uid: &GraphId) -> Vec<GraphId> {
        self.graphs
            .read()
            .values()
            .filter(|e| e.parent.as_ref() == Some(uid))
            .map(|e| e.uid.clone())
            .collect()
    }

    /// All registered ids in registration order
    #[must_use]
    pub fn ids(&self) -> Vec<GraphId> {
        self.graphs.read().keys().cloned().collect()
    }

    /// Number of registered graphs
    #[must_use]
    pub fn len(&self) -> usize {
        self.graphs.read().len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphs.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve() {
        let registry = GraphRegistry::new();
        let root = GraphId::from("root");
        assert!(registry.register(root.clone(), None));
        assert!(!registry.register(root.clone(), None));

        let entry = registry.resolve(&root).unwrap();
        assert_eq!(entry.parent, None);
        assert!(registry.resolve(&GraphId::from("missing")).is_none());
    }

    #[test]
    fn tree_removal_takes_descendants() {
        let registry = GraphRegistry::new();
        let a = GraphId::from("a");
        let b = GraphId::from("b");
        let c = GraphId::from("c");
        let other = GraphId::from("other");
        registry.register(a.clone(), None);
        registry.register(b.clone(), Some(a.clone()));
        registry.register(c.clone(), Some(b.clone()));
        registry.register(other.clone(), None);

        assert_eq!(registry.children_of(&a), vec![b.clone()]);
        assert_eq!(registry.unregister_tree(&b), 2);
        assert!(registry.contains(&a));
        assert!(!registry.contains(&c));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clones_share_state() {
        let registry = GraphRegistry::new();
        let handle = registry.clone();
        handle.register(GraphId::from("g"), None);
        assert!(registry.contains(&GraphId::from("g")));
    }
}
