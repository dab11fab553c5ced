//! The nested-CUG index.
//!
//! Every CUG policy node, and the root node, carries a hidden `:nestedCugs`
//! marker listing the directly nested CUGs below its owner, relative to the
//! owner path. The marker is derived state: [`repair`] recomputes it from the
//! tree and rewrites it only when it differs, and [`verify`] checks it against
//! the tree.
//!
//! Readers use [`get_nested_paths`], which never fails; an absent marker reads
//! as an empty set.

use std::collections::BTreeSet;

use rscug_storage::{is_hidden_name, path, CommitError, NodeState, PropertyValue};

use super::{has_cug, has_cug_at, HIDDEN_NESTED_CUGS, REP_CUG_POLICY};

/// Result of a marker repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The marker already matched the tree.
    Unchanged,
    /// The marker was rewritten.
    Rewritten { added: usize, removed: usize },
}

/// Path of the node holding the marker for `owner`.
pub fn marker_node_path(owner: &str) -> String {
    if path::denotes_root(owner) {
        path::ROOT_PATH.to_string()
    } else {
        path::concat(owner, REP_CUG_POLICY)
    }
}

/// Reads the marker of `owner`; `None` when it is absent or not multi-valued.
pub fn read_marker<'a>(tree: &'a NodeState, owner: &str) -> Option<&'a [String]> {
    tree.node_at(&marker_node_path(owner))?
        .property(HIDDEN_NESTED_CUGS)?
        .as_strings()
}

/// Returns the relative paths of the CUGs nested directly below `owner`.
pub fn get_nested_paths(tree: &NodeState, owner: &str) -> BTreeSet<String> {
    read_marker(tree, owner)
        .map(|entries| entries.iter().cloned().collect())
        .unwrap_or_default()
}

/// Computes the directly nested CUGs below `owner` from the tree itself.
///
/// Descent stops at every CUG-bearing node; CUGs below it belong to that
/// node's marker.
pub fn compute_nested(tree: &NodeState, owner: &str) -> BTreeSet<String> {
    let mut nested = BTreeSet::new();
    let Some(start) = tree.node_at(owner) else {
        return nested;
    };

    let mut stack = vec![(owner.to_string(), start)];
    while let Some((at, node)) = stack.pop() {
        for (name, child) in node.children() {
            if name == REP_CUG_POLICY || is_hidden_name(name) {
                continue;
            }
            let child_path = path::concat(&at, name);
            if has_cug(child) {
                if let Some(relative) = path::relative_to(owner, &child_path) {
                    nested.insert(relative.to_string());
                }
            } else {
                stack.push((child_path, child));
            }
        }
    }
    nested
}

/// Returns the nearest strict ancestor of `at` bearing a CUG, or the root.
///
/// `at` itself does not need to exist in the tree.
pub fn nearest_owner_above(tree: &NodeState, at: &str) -> String {
    path::ancestors_or_self(at)
        .into_iter()
        .skip(1)
        .find(|a| path::denotes_root(a) || has_cug_at(tree, a))
        .unwrap_or(path::ROOT_PATH)
        .to_string()
}

/// Returns the nearest CUG at or above `at`, never the root.
pub fn nearest_cug_at_or_above(tree: &NodeState, at: &str) -> Option<String> {
    path::ancestors_or_self(at)
        .into_iter()
        .find(|a| !path::denotes_root(a) && has_cug_at(tree, a))
        .map(str::to_string)
}

/// Recomputes the marker of `owner` and rewrites it when it differs.
///
/// Entries are stored sorted, so repairing a consistent marker leaves it
/// byte-identical.
pub fn repair(tree: &mut NodeState, owner: &str) -> Result<RepairOutcome, CommitError> {
    let expected: Vec<String> = compute_nested(tree, owner).into_iter().collect();
    let current: Option<BTreeSet<&String>> = read_marker(tree, owner).map(|m| m.iter().collect());

    if read_marker(tree, owner) == Some(expected.as_slice()) {
        return Ok(RepairOutcome::Unchanged);
    }

    let (added, removed) = match &current {
        Some(current) => {
            let expected_set: BTreeSet<&String> = expected.iter().collect();
            (
                expected_set.difference(current).count(),
                current.difference(&expected_set).count(),
            )
        }
        None => (expected.len(), 0),
    };

    let marker_path = marker_node_path(owner);
    let node = tree
        .node_at_mut(&marker_path)
        .ok_or_else(|| CommitError::InconsistentIndex {
            path: marker_path.clone(),
            message: "marker node does not exist".to_string(),
        })?;
    node.set_property(HIDDEN_NESTED_CUGS, PropertyValue::Strings(expected));

    Ok(RepairOutcome::Rewritten { added, removed })
}

/// Checks the marker of `owner` against the tree.
///
/// Every entry must name a CUG-bearing descendant with no other CUG between
/// it and the owner.
pub fn verify(tree: &NodeState, owner: &str) -> Result<(), CommitError> {
    let inconsistent = |message: String| CommitError::InconsistentIndex {
        path: marker_node_path(owner),
        message,
    };

    let entries = read_marker(tree, owner)
        .ok_or_else(|| inconsistent("marker is missing".to_string()))?;

    for entry in entries {
        if entry.is_empty() || entry.starts_with('/') {
            return Err(inconsistent(format!("malformed entry {entry:?}")));
        }
        let target = path::concat(owner, entry);
        if path::validate_path(&target).is_err() || !has_cug_at(tree, &target) {
            return Err(inconsistent(format!("{target} does not carry a policy")));
        }
        if nearest_owner_above(tree, &target) != owner {
            return Err(inconsistent(format!("{target} is not nested directly")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cug::REP_PRINCIPAL_NAMES;

    fn cug(principal: &str) -> NodeState {
        NodeState::new().with_child(
            REP_CUG_POLICY,
            NodeState::new().with_property(
                REP_PRINCIPAL_NAMES,
                PropertyValue::Strings(vec![principal.to_string()]),
            ),
        )
    }

    /// /content/a (cug) with b1 (cug), b2 (cug) and c/d (cug)
    fn tree() -> NodeState {
        let a = cug("g3")
            .with_child("b1", cug("g1"))
            .with_child("b2", cug("g2"))
            .with_child("c", NodeState::new().with_child("d", cug("g4")));
        NodeState::new().with_child("content", NodeState::new().with_child("a", a))
    }

    #[test]
    fn test_compute_nested_stops_at_nested_cugs() {
        let tree = tree();
        assert_eq!(
            compute_nested(&tree, "/"),
            BTreeSet::from(["content/a".to_string()])
        );
        assert_eq!(
            compute_nested(&tree, "/content/a"),
            BTreeSet::from(["b1".to_string(), "b2".to_string(), "c/d".to_string()])
        );
        assert!(compute_nested(&tree, "/content/a/b1").is_empty());
    }

    #[test]
    fn test_get_nested_paths_tolerates_missing_marker() {
        let tree = tree();
        assert!(get_nested_paths(&tree, "/content/a").is_empty());
        assert!(get_nested_paths(&tree, "/no/such/path").is_empty());
    }

    #[test]
    fn test_repair_writes_sorted_marker_and_is_idempotent() {
        let mut tree = tree();

        let outcome = repair(&mut tree, "/content/a").unwrap();
        assert_eq!(outcome, RepairOutcome::Rewritten { added: 3, removed: 0 });
        assert_eq!(
            read_marker(&tree, "/content/a"),
            Some(&["b1".to_string(), "b2".to_string(), "c/d".to_string()][..])
        );

        let before = tree.clone();
        assert_eq!(repair(&mut tree, "/content/a").unwrap(), RepairOutcome::Unchanged);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_repair_prunes_stale_entries() {
        let mut tree = tree();
        repair(&mut tree, "/content/a").unwrap();
        tree.node_at_mut("/content/a/b1")
            .unwrap()
            .remove_child(REP_CUG_POLICY);

        let outcome = repair(&mut tree, "/content/a").unwrap();
        assert_eq!(outcome, RepairOutcome::Rewritten { added: 0, removed: 1 });
        assert_eq!(
            get_nested_paths(&tree, "/content/a"),
            BTreeSet::from(["b2".to_string(), "c/d".to_string()])
        );
    }

    #[test]
    fn test_root_marker_lives_on_root_node() {
        let mut tree = tree();
        repair(&mut tree, "/").unwrap();
        assert_eq!(
            tree.property(HIDDEN_NESTED_CUGS),
            Some(&PropertyValue::Strings(vec!["content/a".to_string()]))
        );
    }

    #[test]
    fn test_verify_detects_inconsistent_markers() {
        let mut tree = tree();
        assert!(verify(&tree, "/content/a").is_err(), "missing marker");

        repair(&mut tree, "/content/a").unwrap();
        assert!(verify(&tree, "/content/a").is_ok());

        tree.node_at_mut("/content/a/rep:cugPolicy")
            .unwrap()
            .set_property(
                HIDDEN_NESTED_CUGS,
                PropertyValue::Strings(vec!["b1".to_string(), "missing".to_string()]),
            );
        assert!(matches!(
            verify(&tree, "/content/a"),
            Err(CommitError::InconsistentIndex { .. })
        ));
    }

    #[test]
    fn test_verify_rejects_indirect_nesting() {
        let mut tree = tree();
        tree.set_property(
            HIDDEN_NESTED_CUGS,
            PropertyValue::Strings(vec!["content/a".to_string(), "content/a/b1".to_string()]),
        );
        assert!(verify(&tree, "/").is_err());
    }

    #[test]
    fn test_nearest_owner_lookups() {
        let tree = tree();
        assert_eq!(nearest_owner_above(&tree, "/content/a/b1"), "/content/a");
        assert_eq!(nearest_owner_above(&tree, "/content/a"), "/");
        assert_eq!(nearest_owner_above(&tree, "/content/a/c/d/e"), "/content/a/c/d");
        assert_eq!(
            nearest_cug_at_or_above(&tree, "/content/a/c"),
            Some("/content/a".to_string())
        );
        assert_eq!(nearest_cug_at_or_above(&tree, "/content"), None);
        assert_eq!(
            nearest_cug_at_or_above(&tree, "/content/a/gone/x"),
            Some("/content/a".to_string())
        );
    }
}
