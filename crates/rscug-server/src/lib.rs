//! rscug-server: Repository wiring, handlers and configuration
//!
//! This crate contains the service layer including:
//! - Configuration management
//! - Logging initialisation
//! - Repository wiring (store, commit hooks, directory, permissions)
//! - YAML fixtures
//! - Batch read-check handler with deduplication
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rscug-server                   │
//! ├─────────────────────────────────────────────┤
//! │  config.rs     - Configuration management   │
//! │  logging.rs    - tracing-subscriber setup   │
//! │  repository.rs - Store and provider wiring  │
//! │  fixtures.rs   - YAML repository content    │
//! │  handlers/     - Request handlers           │
//! │    batch/        - Batch read checks        │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod fixtures;
pub mod handlers;
pub mod logging;
pub mod repository;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServerConfig};
pub use fixtures::{Fixture, FixtureError};
pub use handlers::batch::BatchReadCheckHandler;
pub use repository::CugRepository;
