//! Store fixtures for CUG tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use rscug_storage::{CommitInfo, MemoryNodeStore, NodeState, NodeStore, Root, Snapshot};

use crate::cug::{CugConfig, CugEvaluator, CugPolicyStore, CugValidator, NestedCugHook};

/// A memory store with the CUG validator and index hook installed.
pub struct CugFixture {
    pub store: Arc<MemoryNodeStore>,
    pub policies: CugPolicyStore,
    pub evaluator: CugEvaluator,
}

impl CugFixture {
    pub fn new() -> Self {
        Self::with_config(CugConfig::default().with_supported_paths(["/content"]))
    }

    pub fn with_config(config: CugConfig) -> Self {
        Self::with_root(config, NodeState::new())
    }

    /// Seeds the store with `root` as revision 0, bypassing the hooks.
    pub fn with_root(config: CugConfig, root: NodeState) -> Self {
        let config = Arc::new(config);
        let store = MemoryNodeStore::with_root(root)
            .with_hook(Arc::new(CugValidator::new(config.clone())))
            .with_hook(Arc::new(NestedCugHook::new()))
            .into_shared();
        Self {
            store,
            policies: CugPolicyStore::new(config.clone()),
            evaluator: CugEvaluator::new(config),
        }
    }

    pub async fn root(&self) -> Root {
        Root::open(self.store.clone()).await
    }

    pub async fn head(&self) -> Snapshot {
        self.store.head().await
    }

    /// Creates `/content/a` with CUGs g3 at a, g1 at a/b1 and g2 at a/b2.
    pub async fn nested_content(&self) -> Snapshot {
        let mut root = self.root().await;
        for at in ["/content/a/b1", "/content/a/b2", "/content/a/c"] {
            root.ensure_path(at).unwrap();
        }
        self.policies.set_policy(&mut root, "/content/a", ["g3"]).unwrap();
        self.policies.set_policy(&mut root, "/content/a/b1", ["g1"]).unwrap();
        self.policies.set_policy(&mut root, "/content/a/b2", ["g2"]).unwrap();
        commit(&mut root).await
    }
}

pub async fn commit(root: &mut Root) -> Snapshot {
    root.commit(&CommitInfo::new("admin")).await.unwrap()
}

pub fn principals(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

pub fn set(entries: &[&str]) -> BTreeSet<String> {
    principals(entries)
}
