//! NodeStore trait definition.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::hook::CommitInfo;
use crate::node::{NodeState, Snapshot};

/// Abstract storage interface for the versioned content tree.
///
/// Implementations must be thread-safe (Send + Sync). Readers work on
/// immutable snapshots; writers stage changes against a base snapshot and
/// merge them, which either publishes a complete new revision or leaves the
/// head untouched.
#[async_trait]
pub trait NodeStore: Send + Sync + 'static {
    /// Returns the latest committed revision.
    async fn head(&self) -> Snapshot;

    /// Merges the changes made from `base` to `staged` into the head.
    ///
    /// The changes are rebased onto the current head when other commits
    /// happened in between; overlapping modifications fail with
    /// [`StorageError::Conflict`](crate::StorageError::Conflict). Commit hooks
    /// run on the rebased state and may reject it.
    async fn merge(
        &self,
        base: &Snapshot,
        staged: NodeState,
        info: &CommitInfo,
    ) -> StorageResult<Snapshot>;
}
