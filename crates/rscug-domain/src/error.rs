//! Domain error types for CUG and principal operations.

use rscug_storage::StorageError;
use thiserror::Error;

/// Domain-specific errors.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No node, or no policy, exists at the path.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// The path is not covered by any configured supported path.
    #[error("closed user groups are not supported at {path}")]
    UnsupportedPath { path: String },

    /// The policy content is malformed.
    #[error("invalid policy at {path}: {message}")]
    InvalidPolicy { path: String, message: String },

    /// An authorizable with this id or principal name already exists.
    #[error("authorizable already exists: {id}")]
    AuthorizableExists { id: String },

    /// No authorizable with this id.
    #[error("authorizable not found: {id}")]
    AuthorizableNotFound { id: String },

    /// The authorizable is a user where a group is required.
    #[error("authorizable is not a group: {id}")]
    NotAGroup { id: String },

    /// Adding the member would make a group (transitively) contain itself.
    #[error("cyclic group membership: {group} -> {member}")]
    CyclicMembership { group: String, member: String },

    /// The principal name is reserved.
    #[error("reserved principal name: {name}")]
    ReservedPrincipal { name: String },

    /// The id or principal name of an authorizable is empty.
    #[error("invalid authorizable {id:?}: {message}")]
    InvalidAuthorizable { id: String, message: String },

    /// Depth limit exceeded while expanding group membership.
    #[error("depth limit exceeded (max: {max_depth})")]
    DepthLimitExceeded { max_depth: u32 },

    /// Error from the content tree.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
