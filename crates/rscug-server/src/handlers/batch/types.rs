//! Data types for batch read checks.

use serde::{Deserialize, Serialize};

/// Maximum number of items per batch request.
pub const MAX_BATCH_SIZE: usize = 50;

/// A single read check within a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct BatchCheckItem {
    /// Id of the user or group performing the read (e.g., "user1").
    pub user: String,
    /// Absolute path of the node to read (e.g., "/content/a").
    pub path: String,
}

impl BatchCheckItem {
    pub fn new(user: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            path: path.into(),
        }
    }
}

/// Request for batch read checks.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BatchCheckRequest {
    pub checks: Vec<BatchCheckItem>,
}

impl BatchCheckRequest {
    pub fn new(checks: Vec<BatchCheckItem>) -> Self {
        Self { checks }
    }
}

/// Result of a single check within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchCheckItemResult {
    /// Whether the read is allowed.
    pub allowed: bool,
    /// Error message if the check could not be evaluated.
    pub error: Option<String>,
}

/// Response from a batch check operation.
#[derive(Debug, Clone, Serialize)]
pub struct BatchCheckResponse {
    /// Revision of the snapshot every item was evaluated against.
    pub revision: u64,
    /// Results for each check, in the same order as the request.
    pub results: Vec<BatchCheckItemResult>,
}

/// Errors that reject a whole batch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BatchCheckError {
    #[error("batch request cannot be empty")]
    EmptyBatch,

    #[error("batch size {size} exceeds maximum allowed {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("invalid check at index {index}: {message}")]
    InvalidCheck { index: usize, message: String },
}

/// Result type for batch check operations.
pub type BatchCheckResult<T> = Result<T, BatchCheckError>;
