//! In-memory node store.
//!
//! Revisions share unchanged subtrees through `Arc`, so publishing a commit
//! costs one copy per node on the paths to the modified items.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use crate::diff::{self, Change};
use crate::error::{StorageError, StorageResult};
use crate::hook::{self, CommitHook, CommitInfo};
use crate::node::{NodeState, Snapshot};
use crate::path;
use crate::traits::NodeStore;

/// In-memory implementation of NodeStore.
///
/// # Concurrency
///
/// - **Readers** clone the head snapshot (an `Arc` bump) and never block on
///   writers for longer than the final head swap.
/// - **Writers** are serialized by a merge lock. A writer whose base is not
///   the head is rebased; overlapping changes raise a conflict.
/// - Commit hooks and the head swap happen under the merge lock, so readers
///   observe either all of a commit (including hook output) or none of it.
pub struct MemoryNodeStore {
    head: RwLock<Snapshot>,
    merge_lock: Mutex<()>,
    hooks: Vec<Arc<dyn CommitHook>>,
}

impl std::fmt::Debug for MemoryNodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hooks: Vec<&str> = self.hooks.iter().map(|h| h.name()).collect();
        f.debug_struct("MemoryNodeStore")
            .field("hooks", &hooks)
            .finish_non_exhaustive()
    }
}

impl Default for MemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNodeStore {
    /// Creates a store holding an empty tree at revision 0.
    pub fn new() -> Self {
        Self::with_root(NodeState::new())
    }

    /// Creates a store whose revision 0 is the given tree.
    ///
    /// Hooks do not run for the initial content.
    pub fn with_root(root: NodeState) -> Self {
        Self {
            head: RwLock::new(Snapshot::new(0, Arc::new(root))),
            merge_lock: Mutex::new(()),
            hooks: Vec::new(),
        }
    }

    /// Registers a commit hook. Hooks run in registration order.
    pub fn with_hook(mut self, hook: Arc<dyn CommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Wraps the store in an Arc.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn head(&self) -> Snapshot {
        self.head.read().await.clone()
    }

    #[instrument(skip_all, fields(base = base.revision(), user = ?info.user_id))]
    async fn merge(
        &self,
        base: &Snapshot,
        staged: NodeState,
        info: &CommitInfo,
    ) -> StorageResult<Snapshot> {
        let _guard = self.merge_lock.lock().await;
        let head = self.head.read().await.clone();

        if base.revision() > head.revision() {
            return Err(StorageError::InternalError {
                message: format!(
                    "base revision {} is newer than head {}",
                    base.revision(),
                    head.revision()
                ),
            });
        }

        let changes = diff::compare(base.root(), &staged);
        if changes.is_empty() {
            debug!(revision = head.revision(), "nothing to commit");
            return Ok(head);
        }

        let rebased = if Arc::ptr_eq(base.shared_root(), head.shared_root()) {
            staged
        } else {
            debug!(
                head = head.revision(),
                changes = changes.len(),
                "rebasing staged changes"
            );
            rebase(base.root(), &staged, head.root(), &changes)?
        };

        let processed = hook::run_hooks(&self.hooks, head.root(), rebased, info).map_err(|e| {
            warn!(error = %e, "commit rejected by hook");
            e
        })?;

        let next = Snapshot::new(head.revision() + 1, Arc::new(processed));
        *self.head.write().await = next.clone();
        debug!(revision = next.revision(), "commit published");
        Ok(next)
    }
}

fn conflict(at: &str, message: impl Into<String>) -> StorageError {
    StorageError::Conflict {
        path: at.to_string(),
        message: message.into(),
    }
}

/// Replays the changes between `base` and `staged` on top of `head`.
fn rebase(
    base: &NodeState,
    staged: &NodeState,
    head: &NodeState,
    changes: &[Change],
) -> StorageResult<NodeState> {
    let mut target = head.clone();

    for change in changes {
        match change {
            Change::PropertyAdded { path: at, name } | Change::PropertyChanged { path: at, name } => {
                let new = staged
                    .node_at(at)
                    .and_then(|n| n.property(name))
                    .ok_or_else(|| conflict(at, "staged property vanished"))?;
                let old = base.node_at(at).and_then(|n| n.property(name));
                let node = target
                    .node_at_mut(at)
                    .ok_or_else(|| conflict(at, "node removed concurrently"))?;
                let current = node.property(name);
                if current != old && current != Some(new) {
                    return Err(conflict(at, format!("property {name} changed concurrently")));
                }
                node.set_property(name.clone(), new.clone());
            }
            Change::PropertyRemoved { path: at, name } => {
                let old = base.node_at(at).and_then(|n| n.property(name));
                let Some(node) = target.node_at_mut(at) else {
                    continue;
                };
                let unchanged = match node.property(name) {
                    None => continue,
                    Some(current) => Some(current) == old,
                };
                if !unchanged {
                    return Err(conflict(at, format!("property {name} changed concurrently")));
                }
                node.remove_property(name);
            }
            Change::NodeAdded { path: at } => {
                let (parent_path, name) = split(at)?;
                let added = staged
                    .node_at(parent_path)
                    .and_then(|p| p.shared_child(name))
                    .cloned()
                    .ok_or_else(|| conflict(at, "staged node vanished"))?;
                let parent = target
                    .node_at_mut(parent_path)
                    .ok_or_else(|| conflict(at, "parent removed concurrently"))?;
                if parent.has_child(name) {
                    return Err(conflict(at, "node added concurrently"));
                }
                parent.set_shared_child(name, added);
            }
            Change::NodeRemoved { path: at } => {
                let (parent_path, name) = split(at)?;
                let Some(parent) = target.node_at_mut(parent_path) else {
                    continue;
                };
                let unchanged = match parent.child(name) {
                    None => continue,
                    Some(current) => Some(current) == base.node_at(at),
                };
                if !unchanged {
                    return Err(conflict(at, "removed node changed concurrently"));
                }
                parent.remove_child(name);
            }
        }
    }

    Ok(target)
}

fn split(at: &str) -> StorageResult<(&str, &str)> {
    let parent = path::parent(at).ok_or_else(|| StorageError::InvalidPath {
        path: at.to_string(),
    })?;
    Ok((parent, path::name(at)))
}
