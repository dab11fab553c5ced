//! Repository wiring.
//!
//! A [`CugRepository`] owns the content store with the CUG commit hooks
//! registered, the principal directory, and the permission provider, all
//! built from one [`ServerConfig`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rscug_domain::cug::nested::get_nested_paths;
use rscug_domain::{
    AccessControlStore, CheckCache, CugEvaluator, CugPolicyStore, CugValidator, DomainResult,
    NestedCugHook, PermissionProvider, PrincipalDirectory, PrincipalProvider, ReadDecision,
};
use rscug_storage::{path, CommitInfo, MemoryNodeStore, NodeState, NodeStore, Root, Snapshot};
use tracing::{debug, info, instrument};

use crate::config::ServerConfig;

/// A content repository with closed user group support.
pub struct CugRepository {
    store: Arc<MemoryNodeStore>,
    directory: Arc<PrincipalDirectory>,
    policies: CugPolicyStore,
    acl: AccessControlStore,
    permissions: PermissionProvider,
    cache: Arc<CheckCache>,
}

impl CugRepository {
    /// Creates an empty repository.
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_root(config, NodeState::new())
    }

    /// Creates a repository whose initial head is `root`.
    ///
    /// The initial content is not run through the commit hooks; the first
    /// commit repairs any nested CUG markers it touches.
    pub fn with_root(config: &ServerConfig, root: NodeState) -> Self {
        let cug_config = Arc::new(config.cug_config());
        let store = MemoryNodeStore::with_root(root)
            .with_hook(Arc::new(CugValidator::new(cug_config.clone())))
            .with_hook(Arc::new(NestedCugHook::new()))
            .into_shared();

        let acl = AccessControlStore::new()
            .with_admin_principals(config.acl.admin_principals.iter().cloned());
        let cache = Arc::new(CheckCache::new(config.cache_config()));
        let permissions = PermissionProvider::new(CugEvaluator::new(cug_config.clone()), acl.clone())
            .with_cache(cache.clone());

        info!(
            cug_enabled = cug_config.enabled,
            supported_paths = ?cug_config.supported_paths,
            cache_enabled = cache.is_enabled(),
            "repository initialized"
        );

        Self {
            store,
            directory: Arc::new(PrincipalDirectory::with_config(config.resolver_config())),
            policies: CugPolicyStore::new(cug_config),
            acl,
            permissions,
            cache,
        }
    }

    pub fn store(&self) -> &Arc<MemoryNodeStore> {
        &self.store
    }

    pub fn directory(&self) -> &Arc<PrincipalDirectory> {
        &self.directory
    }

    pub fn policies(&self) -> &CugPolicyStore {
        &self.policies
    }

    pub fn acl(&self) -> &AccessControlStore {
        &self.acl
    }

    pub fn permissions(&self) -> &PermissionProvider {
        &self.permissions
    }

    /// Opens a staging root on the current head.
    pub async fn login(&self) -> Root {
        Root::open(self.store.clone()).await
    }

    pub async fn head(&self) -> Snapshot {
        self.store.head().await
    }

    /// Commits `root` on behalf of `user_id`.
    ///
    /// Cached decisions of older revisions are dropped once the new head is
    /// published.
    #[instrument(skip(self, root))]
    pub async fn commit(&self, root: &mut Root, user_id: &str) -> DomainResult<Snapshot> {
        let head = root.commit(&CommitInfo::new(user_id)).await?;
        self.cache.invalidate_revisions_before(head.revision()).await;
        debug!(revision = head.revision(), "committed");
        Ok(head)
    }

    /// Resolves the principals of the user or group `id`.
    pub async fn principals_for(&self, id: &str) -> DomainResult<BTreeSet<String>> {
        self.directory.resolve_principals_for(id).await
    }

    /// Evaluates read access to `at` for the authorizable `id` on `snapshot`.
    pub async fn check(&self, snapshot: &Snapshot, id: &str, at: &str) -> DomainResult<ReadDecision> {
        let principals = self.principals_for(id).await?;
        Ok(self.permissions.check(snapshot, at, &principals).await)
    }

    /// Names of the children of `at` the authorizable `id` may read.
    pub async fn readable_children(
        &self,
        snapshot: &Snapshot,
        id: &str,
        at: &str,
    ) -> DomainResult<Vec<String>> {
        let principals = self.principals_for(id).await?;
        Ok(self
            .permissions
            .readable_children(snapshot.root(), at, &principals))
    }

    /// The nested CUG markers reachable from the root marker, keyed by owner.
    pub fn nested_index(&self, snapshot: &Snapshot) -> BTreeMap<String, BTreeSet<String>> {
        let mut index = BTreeMap::new();
        let mut pending = vec![path::ROOT_PATH.to_string()];
        while let Some(owner) = pending.pop() {
            if index.contains_key(&owner) {
                continue;
            }
            let nested = get_nested_paths(snapshot.root(), &owner);
            pending.extend(nested.iter().map(|rel| path::concat(&owner, rel)));
            index.insert(owner, nested);
        }
        index
    }
}

impl std::fmt::Debug for CugRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CugRepository")
            .field("permissions", &self.permissions)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repository_with_nested_cugs(config: &ServerConfig) -> (CugRepository, Snapshot) {
        let repo = CugRepository::new(config);
        repo.directory.create_group("g1", "g1").unwrap();
        repo.directory.create_user("u1", "u1").unwrap();
        repo.directory.add_member("g1", "u1").unwrap();

        let mut root = repo.login().await;
        root.ensure_path("/content/a/b").unwrap();
        root.ensure_path("/content/c").unwrap();
        repo.acl.set_read_entries(&mut root, "/content", ["everyone"]).unwrap();
        repo.policies.set_policy(&mut root, "/content/a", ["g1"]).unwrap();
        repo.policies.set_policy(&mut root, "/content/a/b", ["g2"]).unwrap();
        let head = repo.commit(&mut root, "admin").await.unwrap();
        (repo, head)
    }

    #[tokio::test]
    async fn test_nested_index_follows_markers_from_root() {
        let (repo, head) = repository_with_nested_cugs(&ServerConfig::default()).await;
        let index = repo.nested_index(&head);

        assert_eq!(index.len(), 3);
        assert_eq!(index["/"], BTreeSet::from(["content/a".to_string()]));
        assert_eq!(index["/content/a"], BTreeSet::from(["b".to_string()]));
        assert!(index["/content/a/b"].is_empty());
    }

    #[tokio::test]
    async fn test_check_resolves_principals() {
        let (repo, head) = repository_with_nested_cugs(&ServerConfig::default()).await;

        assert!(repo.check(&head, "u1", "/content/a").await.unwrap().allowed());
        assert!(!repo.check(&head, "u1", "/content/a/b").await.unwrap().allowed());
        assert!(repo.check(&head, "u1", "/content/c").await.unwrap().allowed());
        assert!(repo.check(&head, "nobody", "/content/c").await.is_err());
        assert_eq!(
            repo.readable_children(&head, "u1", "/content").await.unwrap(),
            vec!["a".to_string(), "c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_admin_and_excluded_principals_from_config() {
        let mut config = ServerConfig::default();
        config.cug.excluded_principals = vec!["admins".to_string()];
        config.acl.admin_principals = vec!["admins".to_string()];
        let (repo, head) = repository_with_nested_cugs(&config).await;
        repo.directory.create_group("admins", "admins").unwrap();
        repo.directory.create_user("root-user", "root-user").unwrap();
        repo.directory.add_member("admins", "root-user").unwrap();

        assert!(repo.check(&head, "root-user", "/content/a/b").await.unwrap().allowed());
        assert!(repo.check(&head, "root-user", "/").await.unwrap().allowed());
    }

    #[tokio::test]
    async fn test_commit_drops_cached_decisions_of_older_revisions() {
        let mut config = ServerConfig::default();
        config.cache.enabled = true;
        let (repo, head) = repository_with_nested_cugs(&config).await;

        assert!(repo.check(&head, "u1", "/content/a").await.unwrap().allowed());
        repo.cache.run_pending_tasks().await;
        assert_eq!(repo.cache.entry_count(), 1);

        let mut root = repo.login().await;
        repo.policies.remove_policy(&mut root, "/content/a").unwrap();
        let next = repo.commit(&mut root, "admin").await.unwrap();
        repo.cache.run_pending_tasks().await;
        assert_eq!(repo.cache.entry_count(), 0);

        assert_eq!(repo.nested_index(&next)["/"], BTreeSet::from(["content/a/b".to_string()]));
    }
}
