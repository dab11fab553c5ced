//! Configuration for closed user group evaluation.

use std::collections::BTreeSet;

use rscug_storage::path;

/// Configuration for CUG policies and their evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CugConfig {
    /// Whether CUG policies take part in read evaluation.
    ///
    /// When disabled, policies can still be written and the nested index is
    /// still maintained, but every evaluation is `NotApplicable`.
    pub enabled: bool,
    /// Subtrees in which CUG policies may be created and are evaluated.
    pub supported_paths: Vec<String>,
    /// Principals for which CUG policies never apply (e.g. administrators).
    pub excluded_principals: BTreeSet<String>,
}

impl Default for CugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            supported_paths: vec![path::ROOT_PATH.to_string()],
            excluded_principals: BTreeSet::new(),
        }
    }
}

impl CugConfig {
    /// Enables or disables CUG evaluation.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Replaces the supported paths.
    pub fn with_supported_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a principal that is exempt from CUG evaluation.
    pub fn with_excluded_principal(mut self, principal: impl Into<String>) -> Self {
        self.excluded_principals.insert(principal.into());
        self
    }

    /// True when `at` lies in (or is) a supported path.
    pub fn is_supported_path(&self, at: &str) -> bool {
        self.supported_paths
            .iter()
            .any(|supported| path::is_ancestor_or_self(supported, at))
    }

    /// True when any of the principals is excluded from CUG evaluation.
    pub fn is_excluded(&self, principals: &BTreeSet<String>) -> bool {
        !self.excluded_principals.is_disjoint(principals)
    }
}
