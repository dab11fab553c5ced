//! Commit hooks.
//!
//! Hooks run synchronously inside a merge, after the staged changes have been
//! rebased onto the current head and before the new head is published. A hook
//! may rewrite the tree (e.g. to maintain derived state) or reject the commit.

use std::sync::Arc;

use crate::error::CommitError;
use crate::node::NodeState;

/// Metadata describing a commit.
#[derive(Debug, Clone, Default)]
pub struct CommitInfo {
    /// Identifier of the user on whose behalf the commit is made.
    pub user_id: Option<String>,
    /// Free-form commit message, used for logging only.
    pub message: Option<String>,
}

impl CommitInfo {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A hook invoked on every commit.
pub trait CommitHook: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Processes the transition from `before` (current head) to `after`
    /// (rebased staged state). Returns the state to persist.
    fn process_commit(
        &self,
        before: &NodeState,
        after: NodeState,
        info: &CommitInfo,
    ) -> Result<NodeState, CommitError>;
}

/// Runs hooks in order, feeding each hook's output into the next.
pub fn run_hooks(
    hooks: &[Arc<dyn CommitHook>],
    before: &NodeState,
    after: NodeState,
    info: &CommitInfo,
) -> Result<NodeState, CommitError> {
    hooks
        .iter()
        .try_fold(after, |state, hook| hook.process_commit(before, state, info))
}
