//! Storage Integration Tests.
//!
//! These tests drive the in-memory node store through `Root` the way
//! concurrent sessions would: each task stages changes on its own root and
//! commits against a shared store.

use std::sync::Arc;

use rscug_storage::{
    CommitInfo, MemoryNodeStore, NodeStore, PropertyValue, Root, StorageError,
};

fn shared_store() -> Arc<dyn NodeStore> {
    Arc::new(MemoryNodeStore::new())
}

#[tokio::test]
async fn test_readers_keep_their_snapshot_while_writers_commit() {
    let store = shared_store();
    let mut writer = Root::open(Arc::clone(&store)).await;
    writer.ensure_path("/content").unwrap();
    writer.commit(&CommitInfo::default()).await.unwrap();

    let reader = Root::open(Arc::clone(&store)).await;

    writer.set_property("/content", "title", "v2").unwrap();
    writer.commit(&CommitInfo::default()).await.unwrap();

    assert!(reader.get_property("/content", "title").is_none());
    assert_eq!(reader.base().revision(), 1);
    assert_eq!(store.head().await.revision(), 2);
}

#[tokio::test]
async fn test_concurrent_disjoint_commits_all_succeed() {
    let store = shared_store();
    let mut setup = Root::open(Arc::clone(&store)).await;
    setup.ensure_path("/content").unwrap();
    setup.commit(&CommitInfo::default()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut root = Root::open(store).await;
            root.add_child("/content", &format!("node-{i}")).unwrap();
            root.commit(&CommitInfo::new(format!("user-{i}"))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let head = store.head().await;
    assert_eq!(head.node_at("/content").unwrap().child_count(), 16);
    assert_eq!(head.revision(), 17);
}

#[tokio::test]
async fn test_conflicting_commit_can_be_retried_after_refresh() {
    let store = shared_store();
    let mut first = Root::open(Arc::clone(&store)).await;
    let mut second = Root::open(Arc::clone(&store)).await;

    first.ensure_path("/content/a").unwrap();
    second.ensure_path("/content/a").unwrap();

    first.commit(&CommitInfo::default()).await.unwrap();
    let err = second.commit(&CommitInfo::default()).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict { .. }));

    second.refresh().await;
    second
        .set_property("/content/a", "owner", "second")
        .unwrap();
    second.commit(&CommitInfo::default()).await.unwrap();

    assert_eq!(
        store
            .head()
            .await
            .node_at("/content/a")
            .and_then(|n| n.property("owner"))
            .cloned(),
        Some(PropertyValue::String("second".to_string()))
    );
}

#[tokio::test]
async fn test_removal_of_concurrently_modified_node_conflicts() {
    let store = shared_store();
    let mut setup = Root::open(Arc::clone(&store)).await;
    setup.ensure_path("/content/a").unwrap();
    setup.commit(&CommitInfo::default()).await.unwrap();

    let mut editor = Root::open(Arc::clone(&store)).await;
    let mut remover = Root::open(Arc::clone(&store)).await;

    editor.set_property("/content/a", "title", "edited").unwrap();
    editor.commit(&CommitInfo::default()).await.unwrap();

    remover.remove("/content/a").unwrap();
    let err = remover.commit(&CommitInfo::default()).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(store.head().await.node_at("/content/a").is_some());
}
