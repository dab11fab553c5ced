//! CUG policy storage.
//!
//! Policies are read from any tree (a committed snapshot or a root's staged
//! tree) and written by staging changes on a [`Root`]; they take effect when
//! the root commits.

use std::collections::BTreeSet;
use std::sync::Arc;

use rscug_storage::{is_hidden_name, path, NodeState, PropertyValue, Root};
use tracing::debug;

use super::{CugConfig, REP_CUG_POLICY, REP_PRINCIPAL_NAMES};
use crate::error::{DomainError, DomainResult};

/// A closed user group attached to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CugPolicy {
    path: String,
    principal_names: BTreeSet<String>,
}

impl CugPolicy {
    /// The path of the governed node.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn principal_names(&self) -> &BTreeSet<String> {
        &self.principal_names
    }

    /// True when any of the accessor's principals is a member of this CUG.
    pub fn grants(&self, principals: &BTreeSet<String>) -> bool {
        !self.principal_names.is_disjoint(principals)
    }

    /// Reads the policy of the node at `at`, if it has one.
    pub(crate) fn read(tree: &NodeState, at: &str) -> Option<Self> {
        let policy_node = tree.node_at(at)?.child(REP_CUG_POLICY)?;
        let principal_names = match policy_node.property(REP_PRINCIPAL_NAMES) {
            Some(PropertyValue::Strings(names)) => names.iter().cloned().collect(),
            Some(PropertyValue::String(name)) => BTreeSet::from([name.clone()]),
            _ => BTreeSet::new(),
        };
        Some(Self {
            path: at.to_string(),
            principal_names,
        })
    }
}

/// Stages CUG policy changes on a root.
#[derive(Debug, Clone)]
pub struct CugPolicyStore {
    config: Arc<CugConfig>,
}

impl CugPolicyStore {
    pub fn new(config: Arc<CugConfig>) -> Self {
        Self { config }
    }

    /// Returns the policy at `at`, or `None` when the node has no policy or
    /// the path is malformed.
    pub fn get_policy(&self, tree: &NodeState, at: &str) -> Option<CugPolicy> {
        path::validate_path(at).ok()?;
        CugPolicy::read(tree, at)
    }

    /// Creates the policy at `at`, or replaces its principal set.
    ///
    /// An empty principal set is allowed and denies everyone.
    pub fn set_policy<I, S>(&self, root: &mut Root, at: &str, principals: I) -> DomainResult<CugPolicy>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_target(at)?;
        let principal_names: BTreeSet<String> = principals.into_iter().map(Into::into).collect();
        if principal_names.iter().any(|p| p.trim().is_empty()) {
            return Err(DomainError::InvalidPolicy {
                path: at.to_string(),
                message: "principal names cannot be empty".to_string(),
            });
        }

        let node = root.node(at).ok_or_else(|| DomainError::NotFound {
            path: at.to_string(),
        })?;
        if !node.has_child(REP_CUG_POLICY) {
            root.add_child(at, REP_CUG_POLICY)?;
        }
        let policy_path = path::concat(at, REP_CUG_POLICY);
        root.set_property(
            &policy_path,
            REP_PRINCIPAL_NAMES,
            PropertyValue::Strings(principal_names.iter().cloned().collect()),
        )?;
        debug!(path = %at, principals = principal_names.len(), "staged cug policy");

        Ok(CugPolicy {
            path: at.to_string(),
            principal_names,
        })
    }

    /// Removes the policy at `at`.
    pub fn remove_policy(&self, root: &mut Root, at: &str) -> DomainResult<()> {
        path::validate_path(at)?;
        let removed = root.exists(at) && root.remove_child(at, REP_CUG_POLICY)?;
        if !removed {
            return Err(DomainError::NotFound {
                path: path::concat(at, REP_CUG_POLICY),
            });
        }
        debug!(path = %at, "staged cug policy removal");
        Ok(())
    }

    fn check_target(&self, at: &str) -> DomainResult<()> {
        path::validate_path(at)?;
        if path::denotes_root(at) {
            return Err(DomainError::InvalidPolicy {
                path: at.to_string(),
                message: "the root node cannot carry a closed user group".to_string(),
            });
        }
        if super::policy_owner_of(at).is_some() {
            return Err(DomainError::InvalidPolicy {
                path: at.to_string(),
                message: "policy nodes cannot carry a closed user group".to_string(),
            });
        }
        if crate::paths::is_control_path(at, crate::acl::REP_POLICY) {
            return Err(DomainError::InvalidPolicy {
                path: at.to_string(),
                message: "access control nodes cannot carry a closed user group".to_string(),
            });
        }
        if path::elements(at).any(is_hidden_name) {
            return Err(DomainError::InvalidPolicy {
                path: at.to_string(),
                message: "hidden nodes cannot carry a closed user group".to_string(),
            });
        }
        if !self.config.is_supported_path(at) {
            return Err(DomainError::UnsupportedPath {
                path: at.to_string(),
            });
        }
        Ok(())
    }
}
