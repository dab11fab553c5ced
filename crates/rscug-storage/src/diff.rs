//! Structural comparison of two node states.

use std::sync::Arc;

use crate::node::NodeState;
use crate::path;

/// A single difference between two trees.
///
/// Added and removed nodes are reported once, at the root of the added or
/// removed subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    PropertyAdded { path: String, name: String },
    PropertyChanged { path: String, name: String },
    PropertyRemoved { path: String, name: String },
    NodeAdded { path: String },
    NodeRemoved { path: String },
}

impl Change {
    /// Path of the node the change applies to.
    pub fn path(&self) -> &str {
        match self {
            Change::PropertyAdded { path, .. }
            | Change::PropertyChanged { path, .. }
            | Change::PropertyRemoved { path, .. }
            | Change::NodeAdded { path }
            | Change::NodeRemoved { path } => path,
        }
    }

    /// Property name for property changes.
    pub fn property_name(&self) -> Option<&str> {
        match self {
            Change::PropertyAdded { name, .. }
            | Change::PropertyChanged { name, .. }
            | Change::PropertyRemoved { name, .. } => Some(name),
            Change::NodeAdded { .. } | Change::NodeRemoved { .. } => None,
        }
    }
}

/// Compares two trees and returns the changes, parents before children.
pub fn compare(before: &NodeState, after: &NodeState) -> Vec<Change> {
    let mut changes = Vec::new();
    compare_node(path::ROOT_PATH, before, after, &mut changes);
    changes
}

fn compare_node(at: &str, before: &NodeState, after: &NodeState, changes: &mut Vec<Change>) {
    for (name, value) in after.properties() {
        match before.property(name) {
            None => changes.push(Change::PropertyAdded {
                path: at.to_string(),
                name: name.to_string(),
            }),
            Some(old) if old != value => changes.push(Change::PropertyChanged {
                path: at.to_string(),
                name: name.to_string(),
            }),
            Some(_) => {}
        }
    }
    for (name, _) in before.properties() {
        if !after.has_property(name) {
            changes.push(Change::PropertyRemoved {
                path: at.to_string(),
                name: name.to_string(),
            });
        }
    }

    for (name, _) in before.children() {
        if !after.has_child(name) {
            changes.push(Change::NodeRemoved {
                path: path::concat(at, name),
            });
        }
    }
    for (name, _) in after.children() {
        let child_path = path::concat(at, name);
        match (before.shared_child(name), after.shared_child(name)) {
            (None, _) => changes.push(Change::NodeAdded { path: child_path }),
            (Some(b), Some(a)) if Arc::ptr_eq(b, a) => {}
            (Some(b), Some(a)) => compare_node(&child_path, b, a, changes),
            (Some(_), None) => {}
        }
    }
}
