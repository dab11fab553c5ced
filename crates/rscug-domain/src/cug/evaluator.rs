//! Read access evaluation for closed user groups.
//!
//! The governing CUG of a path is the nearest CUG at or above it. The
//! evaluator finds it by descending the nested-CUG index from the root
//! marker, one nesting level per step. When a marker on the way is missing or
//! names a node without a policy, it falls back to walking the ancestors of
//! the path. Evaluation never fails.

use std::collections::BTreeSet;
use std::sync::Arc;

use rscug_storage::{path, NodeState};
use tracing::{debug, trace};

use super::nested;
use super::{has_cug_at, CugConfig, CugPolicy, REP_CUG_POLICY};
use crate::paths;

/// Outcome of a CUG read evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectiveAccess {
    /// A governing CUG lists one of the accessor's principals.
    Granted,
    /// A governing CUG exists and lists none of the accessor's principals.
    Denied,
    /// No CUG governs the path; access is left to the ACLs.
    NotApplicable,
}

impl EffectiveAccess {
    pub fn is_denied(self) -> bool {
        self == EffectiveAccess::Denied
    }
}

/// Result of a lookup through the nested-CUG index.
#[derive(Debug, PartialEq, Eq)]
enum Lookup {
    Governed(String),
    Ungoverned,
    Stale,
}

/// Evaluates read access against the CUG policies of a tree.
#[derive(Debug, Clone)]
pub struct CugEvaluator {
    config: Arc<CugConfig>,
}

impl CugEvaluator {
    pub fn new(config: Arc<CugConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CugConfig {
        &self.config
    }

    /// Decides whether `principals` may read `at` in `tree`.
    pub fn has_read_access(
        &self,
        tree: &NodeState,
        at: &str,
        principals: &BTreeSet<String>,
    ) -> EffectiveAccess {
        if !self.config.enabled || path::validate_path(at).is_err() {
            return EffectiveAccess::NotApplicable;
        }
        let target = paths::control_owner(at, REP_CUG_POLICY);
        if !self.config.is_supported_path(target) || self.config.is_excluded(principals) {
            return EffectiveAccess::NotApplicable;
        }

        let Some(owner) = self.governing_policy(tree, target) else {
            trace!(path = %at, "no governing cug");
            return EffectiveAccess::NotApplicable;
        };
        let Some(policy) = CugPolicy::read(tree, &owner) else {
            return EffectiveAccess::NotApplicable;
        };

        let access = if policy.grants(principals) {
            EffectiveAccess::Granted
        } else {
            EffectiveAccess::Denied
        };
        trace!(path = %at, cug = %owner, ?access, "evaluated cug");
        access
    }

    /// Returns the path of the CUG governing `at`, if any.
    pub fn governing_policy(&self, tree: &NodeState, at: &str) -> Option<String> {
        match lookup_indexed(tree, at) {
            Lookup::Governed(owner) => Some(owner),
            Lookup::Ungoverned => None,
            Lookup::Stale => {
                debug!(path = %at, "nested cug index is stale, walking ancestors");
                nested::nearest_cug_at_or_above(tree, at)
            }
        }
    }
}

/// Descends the nested-CUG index from the root towards `at`.
fn lookup_indexed(tree: &NodeState, at: &str) -> Lookup {
    let mut owner = path::ROOT_PATH.to_string();
    loop {
        let Some(entries) = nested::read_marker(tree, &owner) else {
            return Lookup::Stale;
        };

        let mut next = None;
        for entry in entries {
            if entry.is_empty() {
                return Lookup::Stale;
            }
            let candidate = path::concat(&owner, entry);
            if path::is_ancestor_or_self(&candidate, at) {
                next = Some(candidate);
                break;
            }
        }

        match next {
            Some(candidate) if has_cug_at(tree, &candidate) => owner = candidate,
            Some(_) => return Lookup::Stale,
            None if path::denotes_root(&owner) => return Lookup::Ungoverned,
            None => return Lookup::Governed(owner),
        }
    }
}
