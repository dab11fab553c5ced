//! Storage error types.

use thiserror::Error;

/// Errors raised by a commit hook or validator.
///
/// Any of these aborts the enclosing commit; nothing of the staged change set
/// becomes visible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    /// The staged content violates a content rule.
    #[error("validation failed at {path}: {message}")]
    Validation { path: String, message: String },

    /// A structural constraint (e.g. a reserved node layout) is violated.
    #[error("constraint violation at {path}: {message}")]
    Constraint { path: String, message: String },

    /// A derived index could not be reconciled with the tree it describes.
    #[error("inconsistent index at {path}: {message}")]
    InconsistentIndex { path: String, message: String },
}

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Path is not absolute or contains an invalid segment.
    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    /// Node or property name is empty or contains a reserved character.
    #[error("invalid name: {name}")]
    InvalidName { name: String },

    /// No node exists at the path.
    #[error("node not found: {path}")]
    NodeNotFound { path: String },

    /// A node already exists at the path.
    #[error("node already exists: {path}")]
    NodeAlreadyExists { path: String },

    /// Concurrent modification detected while rebasing a commit.
    #[error("commit conflict at {path}: {message}")]
    Conflict { path: String, message: String },

    /// A commit hook rejected the commit.
    #[error("commit rejected: {0}")]
    CommitFailed(#[from] CommitError),

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

impl StorageError {
    /// Returns true when retrying the commit on a refreshed root may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
