//! Commit hook keeping the nested-CUG index consistent.

use std::collections::BTreeSet;

use rscug_storage::{compare, is_hidden_name, path, Change, CommitError, CommitHook, CommitInfo, NodeState};
use tracing::{debug, instrument, trace};

use super::nested::{self, RepairOutcome};
use super::{has_cug, has_cug_at, policy_owner_of, HIDDEN_NESTED_CUGS, REP_CUG_POLICY};

/// Owners whose markers a commit may have invalidated.
#[derive(Debug, Default)]
struct SyncPlan {
    owners: BTreeSet<String>,
    added: usize,
    removed: usize,
    modified: usize,
}

impl SyncPlan {
    /// Collects the affected owners from the changes between `before` and
    /// `after`.
    fn collect(before: &NodeState, after: &NodeState) -> Self {
        let mut plan = SyncPlan::default();
        let changes = compare(before, after);

        for change in &changes {
            match change {
                Change::NodeAdded { path: at } => {
                    for owner in policy_owners_in(after, at) {
                        plan.added += 1;
                        plan.owners.insert(nested::nearest_owner_above(after, &owner));
                        plan.owners.insert(owner);
                    }
                }
                Change::NodeRemoved { path: at } => {
                    for owner in policy_owners_in(before, at) {
                        plan.removed += 1;
                        plan.owners.insert(nested::nearest_owner_above(after, &owner));
                    }
                }
                Change::PropertyAdded { path: at, name }
                | Change::PropertyChanged { path: at, name }
                | Change::PropertyRemoved { path: at, name } => {
                    if let Some(owner) = policy_owner_of(at) {
                        plan.modified += 1;
                        plan.owners.insert(nested::nearest_owner_above(after, owner));
                        plan.owners.insert(owner.to_string());
                    } else if path::denotes_root(at) && name == HIDDEN_NESTED_CUGS {
                        plan.owners.insert(path::ROOT_PATH.to_string());
                    }
                }
            }

            // Any change inside a CUG-bearing subtree re-checks that CUG's marker.
            let anchor = match change {
                Change::NodeRemoved { path: at } => path::parent(at).unwrap_or(path::ROOT_PATH),
                other => other.path(),
            };
            if let Some(owner) = nested::nearest_cug_at_or_above(after, anchor) {
                plan.owners.insert(owner);
            }
        }

        if !changes.is_empty() && nested::read_marker(after, path::ROOT_PATH).is_none() {
            plan.owners.insert(path::ROOT_PATH.to_string());
        }
        plan
    }
}

/// Returns the owners of all policies inside the subtree rooted at `at`.
///
/// When `at` is a policy node, or lies inside one, its owner is returned.
fn policy_owners_in(tree: &NodeState, at: &str) -> Vec<String> {
    if let Some(owner) = policy_owner_of(at) {
        return vec![owner.to_string()];
    }
    let Some(start) = tree.node_at(at) else {
        return Vec::new();
    };

    let mut owners = Vec::new();
    let mut stack = vec![(at.to_string(), start)];
    while let Some((current, node)) = stack.pop() {
        if has_cug(node) {
            owners.push(current.clone());
        }
        for (name, child) in node.children() {
            if name != REP_CUG_POLICY && !is_hidden_name(name) {
                stack.push((path::concat(&current, name), child));
            }
        }
    }
    owners
}

/// Repairs the `:nestedCugs` markers affected by a commit.
///
/// Only the markers of owners touched by the change set are recomputed. Each
/// repaired marker is verified against the tree; a marker that cannot be
/// reconciled fails the commit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NestedCugHook;

impl NestedCugHook {
    pub fn new() -> Self {
        Self
    }
}

impl CommitHook for NestedCugHook {
    fn name(&self) -> &str {
        "nested-cug"
    }

    #[instrument(skip_all, fields(user = ?info.user_id))]
    fn process_commit(
        &self,
        before: &NodeState,
        mut after: NodeState,
        info: &CommitInfo,
    ) -> Result<NodeState, CommitError> {
        let plan = SyncPlan::collect(before, &after);
        if plan.owners.is_empty() {
            return Ok(after);
        }
        debug!(
            owners = plan.owners.len(),
            added = plan.added,
            removed = plan.removed,
            modified = plan.modified,
            "repairing nested cug markers"
        );

        for owner in &plan.owners {
            if !path::denotes_root(owner) && !has_cug_at(&after, owner) {
                continue;
            }
            match nested::repair(&mut after, owner)? {
                RepairOutcome::Unchanged => trace!(%owner, "marker consistent"),
                RepairOutcome::Rewritten { added, removed } => {
                    debug!(%owner, added, removed, "marker rewritten")
                }
            }
            nested::verify(&after, owner)?;
        }
        Ok(after)
    }
}
