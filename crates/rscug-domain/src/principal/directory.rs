//! In-memory user and group directory.

use std::collections::{BTreeSet, VecDeque};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument};

use super::{Authorizable, AuthorizableKind, PrincipalProvider, ResolverConfig, EVERYONE};
use crate::error::{DomainError, DomainResult};

/// In-memory directory of users and groups.
///
/// Uses DashMap for concurrent access. Group membership is kept in two
/// directions: `members` on each group and the reverse `member_of` index used
/// for resolution.
#[derive(Debug, Default)]
pub struct PrincipalDirectory {
    authorizables: DashMap<String, Authorizable>,
    /// Principal name -> authorizable id.
    principals: DashMap<String, String>,
    /// Member id -> ids of the groups it is a direct member of.
    member_of: DashMap<String, BTreeSet<String>>,
    config: ResolverConfig,
}

impl PrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn create_user(&self, id: &str, principal_name: &str) -> DomainResult<Authorizable> {
        if principal_name == EVERYONE {
            return Err(DomainError::ReservedPrincipal {
                name: principal_name.to_string(),
            });
        }
        self.create_authorizable(id, principal_name, AuthorizableKind::User)
    }

    pub fn create_group(&self, id: &str, principal_name: &str) -> DomainResult<Authorizable> {
        self.create_authorizable(id, principal_name, AuthorizableKind::Group)
    }

    fn create_authorizable(
        &self,
        id: &str,
        principal_name: &str,
        kind: AuthorizableKind,
    ) -> DomainResult<Authorizable> {
        if id.trim().is_empty() {
            return Err(DomainError::InvalidAuthorizable {
                id: id.to_string(),
                message: "id cannot be empty".to_string(),
            });
        }
        if principal_name.trim().is_empty() {
            return Err(DomainError::InvalidAuthorizable {
                id: id.to_string(),
                message: "principal name cannot be empty".to_string(),
            });
        }
        if self.authorizables.contains_key(id) {
            return Err(DomainError::AuthorizableExists { id: id.to_string() });
        }

        match self.principals.entry(principal_name.to_string()) {
            Entry::Occupied(_) => {
                return Err(DomainError::AuthorizableExists { id: id.to_string() });
            }
            Entry::Vacant(entry) => {
                entry.insert(id.to_string());
            }
        }

        let authorizable = Authorizable {
            id: id.to_string(),
            principal_name: principal_name.to_string(),
            kind,
            members: BTreeSet::new(),
        };
        match self.authorizables.entry(id.to_string()) {
            Entry::Occupied(_) => {
                self.principals.remove(principal_name);
                Err(DomainError::AuthorizableExists { id: id.to_string() })
            }
            Entry::Vacant(entry) => {
                entry.insert(authorizable.clone());
                debug!(%id, ?kind, "authorizable created");
                Ok(authorizable)
            }
        }
    }

    pub fn get_authorizable(&self, id: &str) -> Option<Authorizable> {
        self.authorizables.get(id).map(|a| a.clone())
    }

    /// Looks up an authorizable by its principal name.
    pub fn get_by_principal(&self, principal_name: &str) -> Option<Authorizable> {
        let id = self.principals.get(principal_name)?.clone();
        self.get_authorizable(&id)
    }

    /// Adds `member_id` to the group `group_id`.
    ///
    /// Returns false when it already was a direct member. Fails with
    /// `CyclicMembership` when the group is (transitively) a member of the
    /// new member.
    pub fn add_member(&self, group_id: &str, member_id: &str) -> DomainResult<bool> {
        self.require_group(group_id)?;
        if !self.authorizables.contains_key(member_id) {
            return Err(DomainError::AuthorizableNotFound {
                id: member_id.to_string(),
            });
        }
        if member_id == group_id || self.is_transitive_member(group_id, member_id) {
            return Err(DomainError::CyclicMembership {
                group: group_id.to_string(),
                member: member_id.to_string(),
            });
        }

        let added = match self.authorizables.get_mut(group_id) {
            Some(mut group) => group.members.insert(member_id.to_string()),
            None => {
                return Err(DomainError::AuthorizableNotFound {
                    id: group_id.to_string(),
                })
            }
        };
        self.member_of
            .entry(member_id.to_string())
            .or_default()
            .insert(group_id.to_string());
        debug!(group = %group_id, member = %member_id, added, "member added");
        Ok(added)
    }

    /// Removes `member_id` from the group. Returns false when it was not a
    /// direct member.
    pub fn remove_member(&self, group_id: &str, member_id: &str) -> DomainResult<bool> {
        self.require_group(group_id)?;
        let removed = self
            .authorizables
            .get_mut(group_id)
            .is_some_and(|mut group| group.members.remove(member_id));
        if let Some(mut groups) = self.member_of.get_mut(member_id) {
            groups.remove(group_id);
        }
        Ok(removed)
    }

    /// Removes an authorizable and every membership referring to it.
    pub fn remove_authorizable(&self, id: &str) -> DomainResult<Authorizable> {
        let (_, removed) = self
            .authorizables
            .remove(id)
            .ok_or_else(|| DomainError::AuthorizableNotFound { id: id.to_string() })?;
        self.principals.remove(&removed.principal_name);

        if let Some((_, groups)) = self.member_of.remove(id) {
            for group_id in groups {
                if let Some(mut group) = self.authorizables.get_mut(&group_id) {
                    group.members.remove(id);
                }
            }
        }
        for member in &removed.members {
            if let Some(mut groups) = self.member_of.get_mut(member) {
                groups.remove(id);
            }
        }
        debug!(%id, "authorizable removed");
        Ok(removed)
    }

    /// Returns the ids of every group `id` is a transitive member of.
    pub fn membership(&self, id: &str) -> DomainResult<BTreeSet<String>> {
        if !self.authorizables.contains_key(id) {
            return Err(DomainError::AuthorizableNotFound { id: id.to_string() });
        }

        let mut groups = BTreeSet::new();
        let mut queue = VecDeque::from([(id.to_string(), 0u32)]);
        while let Some((current, depth)) = queue.pop_front() {
            let parents: Vec<String> = self
                .member_of
                .get(&current)
                .map(|g| g.iter().cloned().collect())
                .unwrap_or_default();
            for parent in parents {
                if groups.contains(&parent) {
                    continue;
                }
                if depth + 1 > self.config.max_depth {
                    return Err(DomainError::DepthLimitExceeded {
                        max_depth: self.config.max_depth,
                    });
                }
                groups.insert(parent.clone());
                queue.push_back((parent, depth + 1));
            }
        }
        Ok(groups)
    }

    fn require_group(&self, id: &str) -> DomainResult<()> {
        match self.authorizables.get(id) {
            Some(a) if a.is_group() => Ok(()),
            Some(_) => Err(DomainError::NotAGroup { id: id.to_string() }),
            None => Err(DomainError::AuthorizableNotFound { id: id.to_string() }),
        }
    }

    /// True when `candidate` is reachable from the group `group_id` by
    /// following members.
    fn is_transitive_member(&self, candidate: &str, group_id: &str) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = vec![group_id.to_string()];
        while let Some(current) = stack.pop() {
            let members: Vec<String> = self
                .authorizables
                .get(&current)
                .map(|a| a.members.iter().cloned().collect())
                .unwrap_or_default();
            for member in members {
                if member == candidate {
                    return true;
                }
                if seen.insert(member.clone()) {
                    stack.push(member);
                }
            }
        }
        false
    }
}

#[async_trait]
impl PrincipalProvider for PrincipalDirectory {
    #[instrument(skip(self))]
    async fn resolve_principals_for(&self, id: &str) -> DomainResult<BTreeSet<String>> {
        let own = self
            .get_authorizable(id)
            .ok_or_else(|| DomainError::AuthorizableNotFound { id: id.to_string() })?;

        let mut principals = BTreeSet::from([own.principal_name, EVERYONE.to_string()]);
        for group_id in self.membership(id)? {
            if let Some(group) = self.authorizables.get(&group_id) {
                principals.insert(group.principal_name.clone());
            }
        }
        Ok(principals)
    }
}
