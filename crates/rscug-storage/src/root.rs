//! Transient, per-session view of the tree.
//!
//! A [`Root`] stages modifications against a base snapshot. Nothing it does is
//! visible to other sessions until [`Root::commit`] succeeds.

use std::sync::Arc;

use tracing::debug;

use crate::diff;
use crate::error::{StorageError, StorageResult};
use crate::hook::CommitInfo;
use crate::node::{NodeState, PropertyValue, Snapshot};
use crate::path;
use crate::traits::NodeStore;

/// Staging area for a batch of tree mutations.
pub struct Root {
    store: Arc<dyn NodeStore>,
    base: Snapshot,
    staged: NodeState,
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("base_revision", &self.base.revision())
            .finish_non_exhaustive()
    }
}

fn not_found(at: &str) -> StorageError {
    StorageError::NodeNotFound {
        path: at.to_string(),
    }
}

impl Root {
    /// Opens a root on the store's current head.
    pub async fn open(store: Arc<dyn NodeStore>) -> Self {
        let base = store.head().await;
        let staged = base.root().clone();
        Self {
            store,
            base,
            staged,
        }
    }

    /// The snapshot this root is based on.
    pub fn base(&self) -> &Snapshot {
        &self.base
    }

    /// The staged tree, including pending changes.
    pub fn tree(&self) -> &NodeState {
        &self.staged
    }

    pub fn exists(&self, at: &str) -> bool {
        self.node(at).is_some()
    }

    pub fn node(&self, at: &str) -> Option<&NodeState> {
        path::validate_path(at).ok()?;
        self.staged.node_at(at)
    }

    /// Mutable access to a staged node.
    pub fn node_mut(&mut self, at: &str) -> StorageResult<&mut NodeState> {
        path::validate_path(at)?;
        self.staged.node_at_mut(at).ok_or_else(|| not_found(at))
    }

    pub fn get_property(&self, at: &str, name: &str) -> Option<&PropertyValue> {
        self.node(at).and_then(|n| n.property(name))
    }

    pub fn set_property(
        &mut self,
        at: &str,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> StorageResult<()> {
        path::validate_name(name)?;
        self.node_mut(at)?.set_property(name, value);
        Ok(())
    }

    pub fn remove_property(&mut self, at: &str, name: &str) -> StorageResult<Option<PropertyValue>> {
        Ok(self.node_mut(at)?.remove_property(name))
    }

    pub fn get_child(&self, at: &str, name: &str) -> Option<&NodeState> {
        self.node(at).and_then(|n| n.child(name))
    }

    /// Adds an empty child node and returns its path.
    pub fn add_child(&mut self, at: &str, name: &str) -> StorageResult<String> {
        path::validate_name(name)?;
        let child_path = path::concat(at, name);
        let parent = self.node_mut(at)?;
        if parent.has_child(name) {
            return Err(StorageError::NodeAlreadyExists { path: child_path });
        }
        parent.set_child(name, NodeState::new());
        Ok(child_path)
    }

    /// Removes a child node. Returns false when no such child exists.
    pub fn remove_child(&mut self, at: &str, name: &str) -> StorageResult<bool> {
        Ok(self.node_mut(at)?.remove_child(name).is_some())
    }

    /// Removes the node at `at` together with its subtree.
    pub fn remove(&mut self, at: &str) -> StorageResult<()> {
        path::validate_path(at)?;
        let parent = path::parent(at).ok_or_else(|| StorageError::InvalidPath {
            path: at.to_string(),
        })?;
        if self.remove_child(parent, path::name(at))? {
            Ok(())
        } else {
            Err(not_found(at))
        }
    }

    /// Creates every missing node along `at`.
    pub fn ensure_path(&mut self, at: &str) -> StorageResult<()> {
        path::validate_path(at)?;
        let mut node = &mut self.staged;
        for element in path::elements(at) {
            if !node.has_child(element) {
                node.set_child(element, NodeState::new());
            }
            node = node.child_mut(element).ok_or_else(|| not_found(at))?;
        }
        Ok(())
    }

    /// Moves the subtree at `source` to `destination`.
    pub fn move_node(&mut self, source: &str, destination: &str) -> StorageResult<()> {
        path::validate_path(source)?;
        path::validate_path(destination)?;
        if path::is_ancestor_or_self(source, destination) {
            return Err(StorageError::InvalidPath {
                path: destination.to_string(),
            });
        }
        let dest_parent = path::parent(destination).ok_or_else(|| StorageError::InvalidPath {
            path: destination.to_string(),
        })?;
        let dest_name = path::name(destination);
        match self.node(dest_parent) {
            None => return Err(not_found(dest_parent)),
            Some(parent) if parent.has_child(dest_name) => {
                return Err(StorageError::NodeAlreadyExists {
                    path: destination.to_string(),
                })
            }
            Some(_) => {}
        }

        let source_parent = path::parent(source).ok_or_else(|| StorageError::InvalidPath {
            path: source.to_string(),
        })?;
        let moved = self
            .node_mut(source_parent)?
            .remove_child(path::name(source))
            .ok_or_else(|| not_found(source))?;
        self.node_mut(dest_parent)?.set_child(dest_name, moved);
        Ok(())
    }

    pub fn has_pending_changes(&self) -> bool {
        !diff::compare(self.base.root(), &self.staged).is_empty()
    }

    /// Discards pending changes and moves the root to the latest head.
    pub async fn refresh(&mut self) {
        self.base = self.store.head().await;
        self.staged = self.base.root().clone();
    }

    /// Commits the pending changes.
    ///
    /// On success the root is based on the new revision. On failure the
    /// pending changes are kept until `refresh`.
    pub async fn commit(&mut self, info: &CommitInfo) -> StorageResult<Snapshot> {
        let next = self
            .store
            .merge(&self.base, self.staged.clone(), info)
            .await?;
        debug!(revision = next.revision(), "root committed");
        self.staged = next.root().clone();
        self.base = next.clone();
        Ok(next)
    }
}
