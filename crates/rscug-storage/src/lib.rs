//! rscug-storage: Versioned content tree
//!
//! This crate provides the content tree the CUG resolver is built on:
//! - Immutable, structurally shared node states and snapshots
//! - A transient `Root` that stages mutations for one commit
//! - The `NodeStore` trait and an in-memory MVCC implementation
//! - Commit hooks that run inside a merge and may rewrite or reject it
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rscug-storage                  │
//! ├─────────────────────────────────────────────┤
//! │  path.rs   - Path utilities                 │
//! │  node.rs   - NodeState, Snapshot            │
//! │  diff.rs   - Tree comparison                │
//! │  hook.rs   - CommitHook trait               │
//! │  root.rs   - Staging Root                   │
//! │  traits.rs - NodeStore trait definition     │
//! │  memory.rs - In-memory implementation       │
//! └─────────────────────────────────────────────┘
//! ```

pub mod diff;
pub mod error;
pub mod hook;
pub mod memory;
pub mod node;
pub mod path;
pub mod root;
pub mod traits;

// Re-export commonly used types
pub use diff::{compare, Change};
pub use error::{CommitError, StorageError, StorageResult};
pub use hook::{CommitHook, CommitInfo};
pub use memory::MemoryNodeStore;
pub use node::{is_hidden_name, NodeState, PropertyValue, Snapshot};
pub use root::Root;
pub use traits::NodeStore;
