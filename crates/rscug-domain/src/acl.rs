//! Allow-read access control lists.
//!
//! An ACL is stored as a `rep:policy` child node whose `rep:readPrincipals`
//! property lists the principals allowed to read the node and its subtree.
//! Entries are inherited: a path is readable when any ACL at or above it
//! lists one of the accessor's principals.

use std::collections::BTreeSet;

use rscug_storage::{path, NodeState, PropertyValue, Root};
use tracing::{debug, trace};

use crate::cug::REP_CUG_POLICY;
use crate::error::{DomainError, DomainResult};
use crate::paths;

/// Name of the ACL node below a node.
pub const REP_POLICY: &str = "rep:policy";

/// Multi-valued property on the ACL node holding the allowed principals.
pub const REP_READ_PRINCIPALS: &str = "rep:readPrincipals";

/// Stages ACL changes and evaluates read permissions.
#[derive(Debug, Clone, Default)]
pub struct AccessControlStore {
    admin_principals: BTreeSet<String>,
}

impl AccessControlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Principals that may read everything regardless of ACLs.
    pub fn with_admin_principals<I, S>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_principals = principals.into_iter().map(Into::into).collect();
        self
    }

    pub fn admin_principals(&self) -> &BTreeSet<String> {
        &self.admin_principals
    }

    /// Returns the principals allowed to read at `at`, if an ACL exists there.
    pub fn read_entries(&self, tree: &NodeState, at: &str) -> Option<BTreeSet<String>> {
        let acl = tree.node_at(at)?.child(REP_POLICY)?;
        let entries = match acl.property(REP_READ_PRINCIPALS) {
            Some(PropertyValue::Strings(names)) => names.iter().cloned().collect(),
            Some(PropertyValue::String(name)) => BTreeSet::from([name.clone()]),
            _ => BTreeSet::new(),
        };
        Some(entries)
    }

    /// Replaces the read entries of the ACL at `at`, creating it if needed.
    pub fn set_read_entries<I, S>(&self, root: &mut Root, at: &str, principals: I) -> DomainResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_target(root, at)?;
        let entries: BTreeSet<String> = principals.into_iter().map(Into::into).collect();
        if entries.iter().any(|p| p.trim().is_empty()) {
            return Err(DomainError::InvalidPolicy {
                path: at.to_string(),
                message: "principal names cannot be empty".to_string(),
            });
        }
        self.write_entries(root, at, entries)
    }

    /// Allows `principal` to read at `at`. Returns false when it already could.
    pub fn grant_read(&self, root: &mut Root, at: &str, principal: &str) -> DomainResult<bool> {
        self.check_target(root, at)?;
        let mut entries = self.read_entries(root.tree(), at).unwrap_or_default();
        if !entries.insert(principal.to_string()) {
            return Ok(false);
        }
        self.set_read_entries(root, at, entries)?;
        Ok(true)
    }

    /// Removes `principal` from the ACL at `at`. Returns false when it was not
    /// listed.
    pub fn revoke_read(&self, root: &mut Root, at: &str, principal: &str) -> DomainResult<bool> {
        self.check_target(root, at)?;
        let Some(mut entries) = self.read_entries(root.tree(), at) else {
            return Ok(false);
        };
        if !entries.remove(principal) {
            return Ok(false);
        }
        self.write_entries(root, at, entries)?;
        Ok(true)
    }

    /// Removes the ACL at `at`.
    pub fn remove_policy(&self, root: &mut Root, at: &str) -> DomainResult<()> {
        path::validate_path(at)?;
        let removed = root.exists(at) && root.remove_child(at, REP_POLICY)?;
        if !removed {
            return Err(DomainError::NotFound {
                path: path::concat(at, REP_POLICY),
            });
        }
        debug!(path = %at, "staged acl removal");
        Ok(())
    }

    /// True when any ACL at or above `at` allows one of `principals`.
    ///
    /// Items inside an access control node are evaluated as their owner.
    pub fn is_read_allowed(&self, tree: &NodeState, at: &str, principals: &BTreeSet<String>) -> bool {
        if !self.admin_principals.is_disjoint(principals) {
            return true;
        }
        if path::validate_path(at).is_err() {
            return false;
        }
        let owner = paths::control_owner(paths::control_owner(at, REP_POLICY), REP_CUG_POLICY);

        let allowed = path::ancestors_or_self(owner).into_iter().any(|a| {
            self.read_entries(tree, a)
                .is_some_and(|entries| !entries.is_disjoint(principals))
        });
        trace!(path = %at, allowed, "evaluated acl");
        allowed
    }

    fn check_target(&self, root: &Root, at: &str) -> DomainResult<()> {
        path::validate_path(at)?;
        if paths::is_control_path(at, REP_POLICY) || paths::is_control_path(at, REP_CUG_POLICY) {
            return Err(DomainError::InvalidPolicy {
                path: at.to_string(),
                message: "access control nodes cannot carry an acl".to_string(),
            });
        }
        if !root.exists(at) {
            return Err(DomainError::NotFound {
                path: at.to_string(),
            });
        }
        Ok(())
    }

    fn write_entries(&self, root: &mut Root, at: &str, entries: BTreeSet<String>) -> DomainResult<()> {
        if root.get_child(at, REP_POLICY).is_none() {
            root.add_child(at, REP_POLICY)?;
        }
        root.set_property(
            &path::concat(at, REP_POLICY),
            REP_READ_PRINCIPALS,
            PropertyValue::Strings(entries.into_iter().collect()),
        )?;
        debug!(path = %at, "staged acl");
        Ok(())
    }
}
