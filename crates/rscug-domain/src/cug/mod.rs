//! Closed user groups (CUG).
//!
//! A CUG is a path-scoped, default-deny read restriction naming the only
//! principals allowed to read a subtree. CUGs may be nested: a CUG defined at
//! a descendant overrides the enclosing one for everything below it.
//!
//! # Persisted layout
//!
//! ```text
//! /content/a
//! └── rep:cugPolicy
//!       rep:principalNames = [group-3]
//!       :nestedCugs        = [b1, b2]      (derived, hidden)
//! /content/a/b1
//! └── rep:cugPolicy
//!       rep:principalNames = [group-1]
//!       :nestedCugs        = []
//! ```
//!
//! The root node carries a `:nestedCugs` property listing the top-level CUGs.
//!
//! # Components
//!
//! - `policy`    - reading and staging policies
//! - `nested`    - the derived nested-CUG index
//! - `hook`      - commit hook keeping the index consistent
//! - `validator` - commit hook rejecting malformed policies
//! - `evaluator` - read access decisions

mod config;
mod evaluator;
mod hook;
pub mod nested;
mod policy;
mod validator;

#[cfg(test)]
mod tests;

pub use config::CugConfig;
pub use evaluator::{CugEvaluator, EffectiveAccess};
pub use hook::NestedCugHook;
pub use policy::{CugPolicy, CugPolicyStore};
pub use validator::CugValidator;

use rscug_storage::NodeState;

use crate::paths;

/// Name of the policy node below a CUG-governed node.
pub const REP_CUG_POLICY: &str = "rep:cugPolicy";

/// Multi-valued property on the policy node holding the principal names.
pub const REP_PRINCIPAL_NAMES: &str = "rep:principalNames";

/// Hidden property holding the nested CUG paths.
pub const HIDDEN_NESTED_CUGS: &str = ":nestedCugs";

/// True when the node carries a CUG policy.
pub fn has_cug(node: &NodeState) -> bool {
    node.has_child(REP_CUG_POLICY)
}

/// True when a node at `at` exists in the tree and carries a CUG policy.
pub fn has_cug_at(tree: &NodeState, at: &str) -> bool {
    tree.node_at(at).is_some_and(has_cug)
}

/// Returns the owner path when `at` is a policy node or lies inside one.
pub(crate) fn policy_owner_of(at: &str) -> Option<&str> {
    paths::is_control_path(at, REP_CUG_POLICY).then(|| paths::control_owner(at, REP_CUG_POLICY))
}
