//! Batch read-check handler with intra-batch deduplication.
//!
//! This handler evaluates multiple read checks in a single request:
//!
//! 1. **One snapshot**: every item is evaluated against the same head revision
//! 2. **Intra-batch deduplication**: identical `(user, path)` items execute once
//! 3. **Principal resolution once per user**: each distinct user is resolved a
//!    single time per batch
//!
//! Decision caching is handled by the permission provider.

mod handler;
mod types;

pub use handler::BatchReadCheckHandler;
pub use types::{
    BatchCheckError, BatchCheckItem, BatchCheckItemResult, BatchCheckRequest, BatchCheckResponse,
    BatchCheckResult, MAX_BATCH_SIZE,
};
