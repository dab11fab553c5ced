//! Principal resolution trait.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::DomainResult;

/// Resolves the principal names an accessor holds.
#[async_trait]
pub trait PrincipalProvider: Send + Sync + 'static {
    /// Returns the accessor's own principal, every group principal it is a
    /// transitive member of, and `everyone`.
    async fn resolve_principals_for(&self, id: &str) -> DomainResult<BTreeSet<String>>;
}
