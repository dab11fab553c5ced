//! rscug-domain: Closed user group authorization
//!
//! This crate contains the authorization logic built on the content tree:
//! - CUG policies, the nested-CUG index and its commit hooks
//! - CUG read evaluation
//! - Users, groups and principal resolution
//! - Allow-read ACLs and the composite permission provider
//! - Read decision caching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                rscug-domain                  │
//! ├─────────────────────────────────────────────┤
//! │  cug/        - Policies, index, evaluator   │
//! │  principal/  - Users, groups, resolution    │
//! │  acl.rs      - Allow-read ACLs              │
//! │  permission  - CUG + ACL decisions          │
//! │  cache/      - Read decision caching        │
//! └─────────────────────────────────────────────┘
//! ```

pub mod acl;
pub mod cache;
pub mod cug;
pub mod error;
mod paths;
pub mod permission;
pub mod principal;

// Re-export commonly used types at the crate root
pub use acl::AccessControlStore;
pub use cache::{CacheKey, CheckCache, CheckCacheConfig};
pub use cug::{
    CugConfig, CugEvaluator, CugPolicy, CugPolicyStore, CugValidator, EffectiveAccess,
    NestedCugHook,
};
pub use error::{DomainError, DomainResult};
pub use permission::{PermissionProvider, ReadDecision};
pub use principal::{PrincipalDirectory, PrincipalProvider, ResolverConfig};
