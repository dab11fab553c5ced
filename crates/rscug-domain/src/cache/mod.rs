//! Read decision caching.
//!
//! This module provides a decision cache using Moka for concurrent access
//! with built-in TTL-based eviction.
//!
//! # Key Design
//!
//! Cache keys include `(revision, path, principals)`. Snapshots are immutable,
//! so a decision cached for a revision never goes stale; entries for old
//! revisions age out through TTL and capacity, or eagerly through
//! [`CheckCache::invalidate_revisions_before`].
//!
//! By default, caching is **disabled** (`enabled: false`).
//!
//! # Example
//!
//! ```rust,ignore
//! use rscug_domain::cache::{CacheKey, CheckCache, CheckCacheConfig};
//!
//! let cache = CheckCache::new(CheckCacheConfig::default().with_enabled(true));
//! let key = CacheKey::new(7, "/content/a", principals);
//! cache.insert(key.clone(), decision).await;
//! assert_eq!(cache.get(&key).await, Some(decision));
//! ```

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use moka::future::Cache;
use moka::notification::RemovalCause;
use tracing::trace;

use crate::permission::ReadDecision;

/// Configuration for the check cache.
#[derive(Debug, Clone)]
pub struct CheckCacheConfig {
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,
    /// Default TTL for cache entries.
    pub default_ttl: Duration,
}

impl Default for CheckCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_capacity: 100_000,
            default_ttl: Duration::from_secs(10),
        }
    }
}

impl CheckCacheConfig {
    /// Enables or disables caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Sets the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Cache key that uniquely identifies a read check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Revision of the evaluated snapshot.
    pub revision: u64,
    /// The checked path.
    pub path: String,
    /// The accessor's resolved principals.
    pub principals: BTreeSet<String>,
}

impl CacheKey {
    pub fn new(revision: u64, path: impl Into<String>, principals: BTreeSet<String>) -> Self {
        Self {
            revision,
            path: path.into(),
            principals,
        }
    }
}

/// Read decision cache with TTL support.
///
/// Keeps a secondary index from revision to keys so that all entries of
/// superseded revisions can be dropped without scanning the cache. Entries
/// leave the index when the cache evicts them.
pub struct CheckCache {
    cache: Cache<CacheKey, ReadDecision>,
    config: CheckCacheConfig,
    /// Secondary index: revision -> cache keys for that revision.
    by_revision: Arc<DashMap<u64, HashSet<CacheKey>>>,
}

impl std::fmt::Debug for CheckCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckCache")
            .field("config", &self.config)
            .field("entry_count", &self.cache.entry_count())
            .field("revision_index_size", &self.by_revision.len())
            .field("indexed_keys", &self.indexed_key_count())
            .finish()
    }
}

impl CheckCache {
    /// Creates a new check cache with the given configuration.
    pub fn new(config: CheckCacheConfig) -> Self {
        let by_revision: Arc<DashMap<u64, HashSet<CacheKey>>> = Arc::new(DashMap::new());
        let index = Arc::clone(&by_revision);
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.default_ttl)
            .eviction_listener(move |key: Arc<CacheKey>, _, cause| {
                // A replaced entry keeps its key.
                if cause != RemovalCause::Replaced {
                    forget(&index, &key);
                }
            })
            .build();

        Self {
            cache,
            config,
            by_revision,
        }
    }

    pub fn config(&self) -> &CheckCacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Inserts a decision into the cache. No-op when caching is disabled.
    pub async fn insert(&self, key: CacheKey, decision: ReadDecision) {
        if !self.config.enabled {
            return;
        }
        self.by_revision
            .entry(key.revision)
            .or_default()
            .insert(key.clone());
        self.cache.insert(key, decision).await;
    }

    /// Retrieves a cached decision.
    ///
    /// Returns `None` if the key is not cached, has expired, or caching is
    /// disabled.
    pub async fn get(&self, key: &CacheKey) -> Option<ReadDecision> {
        if !self.config.enabled {
            return None;
        }
        let result = self.cache.get(key).await;
        trace!(path = %key.path, revision = key.revision, hit = result.is_some(), "check cache lookup");
        result
    }

    /// Drops every entry cached for a revision older than `revision`.
    pub async fn invalidate_revisions_before(&self, revision: u64) {
        let stale: Vec<u64> = self
            .by_revision
            .iter()
            .map(|entry| *entry.key())
            .filter(|r| *r < revision)
            .collect();

        for old in stale {
            // Atomic remove so concurrent inserts for this revision are not lost
            // from the index while their entries are invalidated.
            if let Some((_, keys)) = self.by_revision.remove(&old) {
                for key in &keys {
                    self.cache.invalidate(key).await;
                }
            }
        }
    }

    /// Returns the number of keys held by the revision index.
    pub fn indexed_key_count(&self) -> usize {
        self.by_revision.iter().map(|entry| entry.value().len()).sum()
    }

    /// Returns the approximate number of entries in the cache.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending maintenance tasks.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

/// Removes an evicted key from the revision index, dropping empty revisions.
fn forget(index: &DashMap<u64, HashSet<CacheKey>>, key: &CacheKey) {
    if let Some(mut keys) = index.get_mut(&key.revision) {
        keys.remove(key);
    }
    index.remove_if(&key.revision, |_, keys| keys.is_empty());
}
