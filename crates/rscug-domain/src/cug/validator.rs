//! Commit-time validation of CUG policy nodes.

use std::collections::BTreeSet;
use std::sync::Arc;

use rscug_storage::{compare, is_hidden_name, path, Change, CommitError, CommitHook, CommitInfo, NodeState, PropertyValue};

use super::{policy_owner_of, CugConfig, REP_CUG_POLICY, REP_PRINCIPAL_NAMES};

/// Rejects commits that leave a malformed CUG policy behind.
///
/// Register it before [`super::NestedCugHook`] so the index is only computed
/// over valid policies.
#[derive(Debug, Clone)]
pub struct CugValidator {
    config: Arc<CugConfig>,
}

impl CugValidator {
    pub fn new(config: Arc<CugConfig>) -> Self {
        Self { config }
    }

    fn validate_owner(&self, tree: &NodeState, owner: &str) -> Result<(), CommitError> {
        let policy_path = path::concat(owner, REP_CUG_POLICY);
        let Some(policy) = tree.node_at(&policy_path) else {
            // Removed in this commit.
            return Ok(());
        };
        if path::denotes_root(owner) {
            return Err(CommitError::Constraint {
                path: policy_path,
                message: "the root node cannot carry a closed user group".to_string(),
            });
        }
        if crate::paths::is_control_path(owner, crate::acl::REP_POLICY) {
            return Err(CommitError::Constraint {
                path: policy_path,
                message: "access control nodes cannot carry a closed user group".to_string(),
            });
        }
        if path::elements(owner).any(is_hidden_name) {
            return Err(CommitError::Constraint {
                path: policy_path,
                message: "hidden nodes cannot carry a closed user group".to_string(),
            });
        }
        if !self.config.is_supported_path(owner) {
            return Err(CommitError::Validation {
                path: policy_path,
                message: "closed user groups are not supported at this path".to_string(),
            });
        }

        match policy.property(REP_PRINCIPAL_NAMES) {
            Some(PropertyValue::Strings(names)) if names.iter().all(|n| !n.trim().is_empty()) => {}
            Some(PropertyValue::Strings(_)) => {
                return Err(CommitError::Validation {
                    path: policy_path,
                    message: "principal names cannot be empty".to_string(),
                })
            }
            _ => {
                return Err(CommitError::Validation {
                    path: policy_path,
                    message: format!("{REP_PRINCIPAL_NAMES} must be a multi-valued string property"),
                })
            }
        }
        if policy.child_count() > 0 {
            return Err(CommitError::Constraint {
                path: policy_path,
                message: "policy nodes cannot have child nodes".to_string(),
            });
        }
        Ok(())
    }
}

impl CommitHook for CugValidator {
    fn name(&self) -> &str {
        "cug-validator"
    }

    fn process_commit(
        &self,
        before: &NodeState,
        after: NodeState,
        _info: &CommitInfo,
    ) -> Result<NodeState, CommitError> {
        let mut owners = BTreeSet::new();
        for change in compare(before, &after) {
            let at = change.path();
            if let Some(owner) = policy_owner_of(at) {
                owners.insert(owner.to_string());
                continue;
            }
            if let Change::NodeAdded { path: added } = &change {
                collect_owners(&after, added, &mut owners);
            }
        }

        for owner in &owners {
            self.validate_owner(&after, owner)?;
        }
        Ok(after)
    }
}

/// Adds every policy owner in the subtree at `at`, including `at` itself.
fn collect_owners(tree: &NodeState, at: &str, owners: &mut BTreeSet<String>) {
    let Some(node) = tree.node_at(at) else {
        return;
    };
    if node.has_child(REP_CUG_POLICY) {
        owners.insert(at.to_string());
    }
    for (name, _) in node.children() {
        if name != REP_CUG_POLICY {
            collect_owners(tree, &path::concat(at, name), owners);
        }
    }
}
