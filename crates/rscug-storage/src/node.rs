//! Immutable node states and committed snapshots.
//!
//! A [`NodeState`] owns its properties and shares its children through `Arc`,
//! so a new revision only copies the nodes on the path to a modification.
//! Unchanged subtrees are pointer-equal between revisions, which the diff
//! uses to skip them.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path;

/// A property value.
///
/// Untagged so that YAML/JSON fixtures read naturally: a scalar string is a
/// `String`, a list is `Strings`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Long(i64),
    String(String),
    Strings(Vec<String>),
}

impl PropertyValue {
    /// Returns the single string value, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the values, if this is a multi-valued `Strings`.
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            PropertyValue::Strings(values) => Some(values),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a `Boolean`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, PropertyValue::Strings(_))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        PropertyValue::Strings(values)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

/// Returns true for hidden (system-owned) item names.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with(':')
}

/// A node in the content tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, PropertyValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, Arc<NodeState>>,
}

impl NodeState {
    /// Creates an empty node.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn child(&self, name: &str) -> Option<&NodeState> {
        self.children.get(name).map(|c| c.as_ref())
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// Iterates over the children in name order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &NodeState)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Resolves an absolute path below this node.
    pub fn node_at(&self, abs_path: &str) -> Option<&NodeState> {
        let mut node = self;
        for element in path::elements(abs_path) {
            node = node.child(element)?;
        }
        Some(node)
    }

    /// Resolves an absolute path for mutation, copying shared nodes on the way.
    pub fn node_at_mut(&mut self, abs_path: &str) -> Option<&mut NodeState> {
        let mut node = self;
        for element in path::elements(abs_path) {
            node = node.child_mut(element)?;
        }
        Some(node)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut NodeState> {
        self.children.get_mut(name).map(Arc::make_mut)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn remove_property(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name)
    }

    /// Adds or replaces a child and returns a mutable reference to it.
    pub fn set_child(&mut self, name: impl Into<String>, child: NodeState) -> &mut NodeState {
        let slot = match self.children.entry(name.into()) {
            Entry::Occupied(mut entry) => {
                entry.insert(Arc::new(child));
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(Arc::new(child)),
        };
        Arc::make_mut(slot)
    }

    /// Inserts a shared child without copying it.
    pub(crate) fn set_shared_child(&mut self, name: impl Into<String>, child: Arc<NodeState>) {
        self.children.insert(name.into(), child);
    }

    pub(crate) fn shared_child(&self, name: &str) -> Option<&Arc<NodeState>> {
        self.children.get(name)
    }

    pub fn remove_child(&mut self, name: &str) -> Option<NodeState> {
        self.children
            .remove(name)
            .map(|c| Arc::try_unwrap(c).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// Builder-style helper used by fixtures and tests.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Builder-style helper used by fixtures and tests.
    pub fn with_child(mut self, name: impl Into<String>, child: NodeState) -> Self {
        self.set_child(name, child);
        self
    }
}

/// An immutable, committed revision of the whole tree.
#[derive(Debug, Clone)]
pub struct Snapshot {
    revision: u64,
    committed_at: DateTime<Utc>,
    root: Arc<NodeState>,
}

impl Snapshot {
    pub(crate) fn new(revision: u64, root: Arc<NodeState>) -> Self {
        Self {
            revision,
            committed_at: Utc::now(),
            root,
        }
    }

    /// Monotonically increasing revision number; `0` is the initial, empty tree.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }

    /// The root node of this revision.
    pub fn root(&self) -> &NodeState {
        &self.root
    }

    pub(crate) fn shared_root(&self) -> &Arc<NodeState> {
        &self.root
    }

    /// Resolves an absolute path in this revision.
    pub fn node_at(&self, abs_path: &str) -> Option<&NodeState> {
        self.root.node_at(abs_path)
    }
}
