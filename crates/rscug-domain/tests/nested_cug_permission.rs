//! End-to-end read permissions with nested closed user groups.
//!
//! Layout:
//! - /content       : acl allows user1, user2
//! - /content/a     : cug group3 (user1, user2)
//! - /content/a/b1  : cug group1 (user1)
//! - /content/a/b2  : cug group2 (user2)

use std::collections::BTreeSet;
use std::sync::Arc;

use rscug_domain::cug::nested::get_nested_paths;
use rscug_domain::cug::{HIDDEN_NESTED_CUGS, REP_PRINCIPAL_NAMES};
use rscug_domain::{
    AccessControlStore, CugConfig, CugEvaluator, CugPolicyStore, CugValidator, NestedCugHook,
    PermissionProvider, PrincipalDirectory, PrincipalProvider,
};
use rscug_storage::{CommitInfo, MemoryNodeStore, NodeStore, PropertyValue, Root};

struct Repository {
    store: Arc<MemoryNodeStore>,
    directory: PrincipalDirectory,
    policies: CugPolicyStore,
    acl: AccessControlStore,
    permissions: PermissionProvider,
}

fn repository() -> Repository {
    let config = Arc::new(CugConfig::default().with_supported_paths(["/content"]));
    let store = MemoryNodeStore::new()
        .with_hook(Arc::new(CugValidator::new(config.clone())))
        .with_hook(Arc::new(NestedCugHook::new()))
        .into_shared();
    let acl = AccessControlStore::new();
    Repository {
        store,
        directory: PrincipalDirectory::new(),
        policies: CugPolicyStore::new(config.clone()),
        permissions: PermissionProvider::new(CugEvaluator::new(config), acl.clone()),
        acl,
    }
}

fn set(entries: &[&str]) -> BTreeSet<String> {
    entries.iter().map(|e| e.to_string()).collect()
}

async fn setup_nested_cugs_and_acls(repo: &Repository) -> Root {
    let dir = &repo.directory;
    for group in ["group1", "group2", "group3"] {
        dir.create_group(group, group).unwrap();
    }
    dir.create_user("user1", "user1").unwrap();
    dir.create_user("user2", "user2").unwrap();
    dir.add_member("group1", "user1").unwrap();
    dir.add_member("group2", "user2").unwrap();
    dir.add_member("group3", "user1").unwrap();
    dir.add_member("group3", "user2").unwrap();

    let mut root = Root::open(repo.store.clone()).await;
    root.ensure_path("/content/a/b1").unwrap();
    root.ensure_path("/content/a/b2").unwrap();
    repo.policies.set_policy(&mut root, "/content/a", ["group3"]).unwrap();
    repo.policies.set_policy(&mut root, "/content/a/b1", ["group1"]).unwrap();
    repo.policies.set_policy(&mut root, "/content/a/b2", ["group2"]).unwrap();
    repo.acl.grant_read(&mut root, "/content", "user1").unwrap();
    repo.acl.grant_read(&mut root, "/content", "user2").unwrap();
    root.commit(&CommitInfo::new("admin")).await.unwrap();
    root
}

#[tokio::test]
async fn test_nested_cug_permission() {
    let repo = repository();
    let mut root = setup_nested_cugs_and_acls(&repo).await;

    let head = repo.store.head().await;
    assert_eq!(get_nested_paths(head.root(), "/"), set(&["content/a"]));
    assert_eq!(get_nested_paths(head.root(), "/content/a"), set(&["b1", "b2"]));

    // Drop the marker while rewriting the nested policies; the commit restores it.
    root.remove_property("/content/a/rep:cugPolicy", HIDDEN_NESTED_CUGS)
        .unwrap();
    root.set_property(
        "/content/a/b1/rep:cugPolicy",
        REP_PRINCIPAL_NAMES,
        PropertyValue::Strings(vec!["group1".to_string()]),
    )
    .unwrap();
    root.set_property(
        "/content/a/b2/rep:cugPolicy",
        REP_PRINCIPAL_NAMES,
        PropertyValue::Strings(vec!["group2".to_string()]),
    )
    .unwrap();
    root.commit(&CommitInfo::new("admin")).await.unwrap();

    let head = repo.store.head().await;
    assert_eq!(get_nested_paths(head.root(), "/"), set(&["content/a"]));
    assert_eq!(get_nested_paths(head.root(), "/content/a"), set(&["b1", "b2"]));

    let user2 = repo.directory.resolve_principals_for("user2").await.unwrap();
    assert!(repo.permissions.can_read(&head, "/content/a", &user2).await);
    assert!(!repo.permissions.can_read(&head, "/content/a/b1", &user2).await);
    assert!(repo.permissions.can_read(&head, "/content/a/b2", &user2).await);
    assert_eq!(
        repo.permissions
            .readable_children(head.root(), "/content/a", &user2),
        vec!["b2".to_string()]
    );

    let user1 = repo.directory.resolve_principals_for("user1").await.unwrap();
    assert!(repo.permissions.can_read(&head, "/content/a/b1", &user1).await);
    assert!(!repo.permissions.can_read(&head, "/content/a/b2", &user1).await);
}

#[tokio::test]
async fn test_removing_nested_cug_reopens_to_enclosing_group() {
    let repo = repository();
    let mut root = setup_nested_cugs_and_acls(&repo).await;

    repo.policies.remove_policy(&mut root, "/content/a/b1").unwrap();
    let head = root.commit(&CommitInfo::new("admin")).await.unwrap();

    assert_eq!(get_nested_paths(head.root(), "/content/a"), set(&["b2"]));
    let user2 = repo.directory.resolve_principals_for("user2").await.unwrap();
    assert!(repo.permissions.can_read(&head, "/content/a/b1", &user2).await);
}

#[tokio::test]
async fn test_membership_changes_apply_without_touching_the_tree() {
    let repo = repository();
    setup_nested_cugs_and_acls(&repo).await;
    let head = repo.store.head().await;

    repo.directory.add_member("group1", "user2").unwrap();
    let user2 = repo.directory.resolve_principals_for("user2").await.unwrap();
    assert!(repo.permissions.can_read(&head, "/content/a/b1", &user2).await);

    repo.directory.remove_member("group3", "user2").unwrap();
    let user2 = repo.directory.resolve_principals_for("user2").await.unwrap();
    assert!(!repo.permissions.can_read(&head, "/content/a", &user2).await);
    assert!(repo.permissions.can_read(&head, "/content/a/b2", &user2).await);
}

#[tokio::test]
async fn test_readers_keep_their_snapshot_during_policy_changes() {
    let repo = repository();
    let mut root = setup_nested_cugs_and_acls(&repo).await;
    let before = repo.store.head().await;

    repo.policies.set_policy(&mut root, "/content/a/b2", ["group1"]).unwrap();
    let after = root.commit(&CommitInfo::new("admin")).await.unwrap();

    let user2 = repo.directory.resolve_principals_for("user2").await.unwrap();
    assert!(repo.permissions.can_read(&before, "/content/a/b2", &user2).await);
    assert!(!repo.permissions.can_read(&after, "/content/a/b2", &user2).await);
}
