//! Composite read permissions.
//!
//! CUGs only ever restrict: a path denied by its governing CUG is unreadable
//! whatever the ACLs say. Everywhere else the ACL decision stands.

use std::collections::BTreeSet;
use std::sync::Arc;

use rscug_storage::{is_hidden_name, path, NodeState, Snapshot};
use tracing::{debug, instrument};

use crate::acl::{AccessControlStore, REP_POLICY};
use crate::cache::{CacheKey, CheckCache};
use crate::cug::{CugEvaluator, EffectiveAccess, REP_CUG_POLICY};

/// The parts of a read decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadDecision {
    pub cug: EffectiveAccess,
    pub acl_allowed: bool,
}

impl ReadDecision {
    pub fn allowed(&self) -> bool {
        !self.cug.is_denied() && self.acl_allowed
    }
}

/// Combines CUG and ACL evaluation.
#[derive(Debug, Clone)]
pub struct PermissionProvider {
    cug: CugEvaluator,
    acl: AccessControlStore,
    cache: Option<Arc<CheckCache>>,
}

impl PermissionProvider {
    pub fn new(cug: CugEvaluator, acl: AccessControlStore) -> Self {
        Self {
            cug,
            acl,
            cache: None,
        }
    }

    /// Caches decisions per snapshot revision.
    pub fn with_cache(mut self, cache: Arc<CheckCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cug(&self) -> &CugEvaluator {
        &self.cug
    }

    pub fn acl(&self) -> &AccessControlStore {
        &self.acl
    }

    /// Evaluates read access to `at` in `tree`.
    pub fn decide(&self, tree: &NodeState, at: &str, principals: &BTreeSet<String>) -> ReadDecision {
        ReadDecision {
            cug: self.cug.has_read_access(tree, at, principals),
            acl_allowed: self.acl.is_read_allowed(tree, at, principals),
        }
    }

    /// Evaluates read access against a committed snapshot, consulting the
    /// cache when one is configured.
    #[instrument(skip(self, snapshot, principals), fields(revision = snapshot.revision()))]
    pub async fn check(&self, snapshot: &Snapshot, at: &str, principals: &BTreeSet<String>) -> ReadDecision {
        let Some(cache) = self.cache.as_ref().filter(|c| c.is_enabled()) else {
            return self.decide(snapshot.root(), at, principals);
        };

        let key = CacheKey::new(snapshot.revision(), at, principals.clone());
        if let Some(decision) = cache.get(&key).await {
            return decision;
        }
        let decision = self.decide(snapshot.root(), at, principals);
        cache.insert(key, decision).await;
        debug!(allowed = decision.allowed(), "read decision cached");
        decision
    }

    pub async fn can_read(&self, snapshot: &Snapshot, at: &str, principals: &BTreeSet<String>) -> bool {
        self.check(snapshot, at, principals).await.allowed()
    }

    /// Names of the readable content children of `at`.
    ///
    /// Hidden and access control nodes are never listed.
    pub fn readable_children(
        &self,
        tree: &NodeState,
        at: &str,
        principals: &BTreeSet<String>,
    ) -> Vec<String> {
        let Some(node) = tree.node_at(at) else {
            return Vec::new();
        };
        node.children()
            .filter(|(name, _)| {
                !is_hidden_name(name) && *name != REP_CUG_POLICY && *name != REP_POLICY
            })
            .filter(|(name, _)| {
                self.decide(tree, &path::concat(at, name), principals)
                    .allowed()
            })
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CheckCacheConfig;
    use crate::cug::{CugConfig, CugPolicyStore, CugValidator, NestedCugHook};
    use rscug_storage::{CommitInfo, MemoryNodeStore, Root};

    fn principals(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    async fn setup() -> (PermissionProvider, Snapshot) {
        let config = Arc::new(CugConfig::default());
        let store = MemoryNodeStore::new()
            .with_hook(Arc::new(CugValidator::new(config.clone())))
            .with_hook(Arc::new(NestedCugHook::new()))
            .into_shared();
        let acl = AccessControlStore::new();
        let policies = CugPolicyStore::new(config.clone());

        let mut root = Root::open(store).await;
        for at in ["/content/a/b1", "/content/a/b2", "/content/public"] {
            root.ensure_path(at).unwrap();
        }
        acl.set_read_entries(&mut root, "/content", ["everyone"]).unwrap();
        policies.set_policy(&mut root, "/content/a", ["g3"]).unwrap();
        policies.set_policy(&mut root, "/content/a/b1", ["g1"]).unwrap();
        let head = root.commit(&CommitInfo::new("admin")).await.unwrap();

        (PermissionProvider::new(CugEvaluator::new(config), acl), head)
    }

    #[tokio::test]
    async fn test_cug_denial_overrides_acl() {
        let (provider, head) = setup().await;
        let user = principals(&["everyone", "g1"]);

        assert!(provider.can_read(&head, "/content/public", &user).await);
        assert!(provider.can_read(&head, "/content/a/b1", &user).await);
        assert!(!provider.can_read(&head, "/content/a", &user).await);
        assert!(!provider.can_read(&head, "/content/a/b2", &user).await);
    }

    #[tokio::test]
    async fn test_cug_grant_does_not_bypass_acl() {
        let (provider, head) = setup().await;
        let decision = provider.check(&head, "/content/a/b1", &principals(&["g1"])).await;
        assert_eq!(decision.cug, EffectiveAccess::Granted);
        assert!(!decision.acl_allowed);
        assert!(!decision.allowed());
    }

    #[tokio::test]
    async fn test_readable_children_filters_denied_and_hidden() {
        let (provider, head) = setup().await;
        let user = principals(&["everyone", "g1"]);

        let mut children = provider.readable_children(head.root(), "/content/a", &user);
        children.sort();
        assert_eq!(children, vec!["b1".to_string()]);

        let top = provider.readable_children(head.root(), "/content", &user);
        assert!(top.contains(&"public".to_string()));
        assert!(!top.contains(&"a".to_string()));
    }

    #[tokio::test]
    async fn test_cached_decisions_match_uncached() {
        let (provider, head) = setup().await;
        let cache = Arc::new(CheckCache::new(CheckCacheConfig::default().with_enabled(true)));
        let cached = provider.clone().with_cache(cache.clone());
        let user = principals(&["everyone", "g3"]);

        for at in ["/content/a", "/content/a/b1", "/content/a/b2", "/content/public"] {
            let expected = provider.check(&head, at, &user).await;
            assert_eq!(cached.check(&head, at, &user).await, expected);
            assert_eq!(cached.check(&head, at, &user).await, expected);
        }
        cache.run_pending_tasks().await;
        assert_eq!(cache.entry_count(), 4);
    }
}
