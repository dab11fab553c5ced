//! Batch read-check handler implementation.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use rscug_storage::{path, Snapshot};
use tracing::{debug, instrument};

use super::types::{
    BatchCheckError, BatchCheckItem, BatchCheckItemResult, BatchCheckRequest, BatchCheckResponse,
    BatchCheckResult, MAX_BATCH_SIZE,
};
use crate::repository::CugRepository;

/// Handler for batch read checks.
pub struct BatchReadCheckHandler {
    repository: Arc<CugRepository>,
}

impl BatchReadCheckHandler {
    pub fn new(repository: Arc<CugRepository>) -> Self {
        Self { repository }
    }

    /// Validates a batch check request.
    pub fn validate(&self, request: &BatchCheckRequest) -> BatchCheckResult<()> {
        if request.checks.is_empty() {
            return Err(BatchCheckError::EmptyBatch);
        }

        if request.checks.len() > MAX_BATCH_SIZE {
            return Err(BatchCheckError::BatchTooLarge {
                size: request.checks.len(),
                max: MAX_BATCH_SIZE,
            });
        }

        for (index, check) in request.checks.iter().enumerate() {
            if check.user.trim().is_empty() {
                return Err(BatchCheckError::InvalidCheck {
                    index,
                    message: "user cannot be empty".to_string(),
                });
            }
            if let Err(e) = path::validate_path(&check.path) {
                return Err(BatchCheckError::InvalidCheck {
                    index,
                    message: e.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Executes a batch check request against the current head.
    ///
    /// The results are returned in the same order as the input checks.
    pub async fn check(&self, request: BatchCheckRequest) -> BatchCheckResult<BatchCheckResponse> {
        self.validate(&request)?;
        let snapshot = self.repository.head().await;
        Ok(self.check_at(&snapshot, &request).await)
    }

    /// Executes a validated request against `snapshot`.
    #[instrument(skip(self, snapshot, request), fields(revision = snapshot.revision(), size = request.checks.len()))]
    pub(super) async fn check_at(&self, snapshot: &Snapshot, request: &BatchCheckRequest) -> BatchCheckResponse {
        // Build the unique checks and track which positions map to each one
        let mut unique_checks: Vec<&BatchCheckItem> = Vec::new();
        let mut key_to_index: HashMap<&BatchCheckItem, usize> = HashMap::new();
        let mut position_to_unique: Vec<usize> = Vec::with_capacity(request.checks.len());

        for check in &request.checks {
            let unique_index = *key_to_index.entry(check).or_insert_with(|| {
                let idx = unique_checks.len();
                unique_checks.push(check);
                idx
            });
            position_to_unique.push(unique_index);
        }

        let principals = self.resolve_users(&unique_checks).await;

        let check_futures: Vec<_> = unique_checks
            .iter()
            .map(|check| self.execute_check(snapshot, check, &principals))
            .collect();
        let unique_results: Vec<BatchCheckItemResult> = join_all(check_futures).await;

        debug!(unique = unique_results.len(), users = principals.len(), "batch evaluated");

        let results = position_to_unique
            .iter()
            .map(|&idx| unique_results[idx].clone())
            .collect();

        BatchCheckResponse {
            revision: snapshot.revision(),
            results,
        }
    }

    /// Resolves the principals of every distinct user in the batch.
    async fn resolve_users(
        &self,
        checks: &[&BatchCheckItem],
    ) -> HashMap<String, Result<BTreeSet<String>, String>> {
        let users: BTreeSet<&str> = checks.iter().map(|c| c.user.as_str()).collect();
        let resolved = join_all(users.iter().map(|user| async move {
            let principals = self
                .repository
                .principals_for(user)
                .await
                .map_err(|e| e.to_string());
            (user.to_string(), principals)
        }))
        .await;
        resolved.into_iter().collect()
    }

    async fn execute_check(
        &self,
        snapshot: &Snapshot,
        check: &BatchCheckItem,
        principals: &HashMap<String, Result<BTreeSet<String>, String>>,
    ) -> BatchCheckItemResult {
        match principals.get(&check.user) {
            Some(Ok(principals)) => BatchCheckItemResult {
                allowed: self
                    .repository
                    .permissions()
                    .can_read(snapshot, &check.path, principals)
                    .await,
                error: None,
            },
            Some(Err(e)) => BatchCheckItemResult {
                allowed: false,
                error: Some(e.clone()),
            },
            None => BatchCheckItemResult {
                allowed: false,
                error: Some(format!("principals of {} were not resolved", check.user)),
            },
        }
    }

    /// Returns statistics about deduplication for a batch request.
    /// Returns (total_checks, unique_checks, distinct_users).
    pub fn dedup_stats(&self, request: &BatchCheckRequest) -> (usize, usize, usize) {
        let unique: HashSet<&BatchCheckItem> = request.checks.iter().collect();
        let users: HashSet<&str> = request.checks.iter().map(|c| c.user.as_str()).collect();
        (request.checks.len(), unique.len(), users.len())
    }
}
