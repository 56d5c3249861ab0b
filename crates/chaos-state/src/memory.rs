//! In-memory result store
//!
//! `MemoryResultStore` satisfies the [`ResultStore`] contract without any
//! external dependencies. Data is lost on process restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::retention::{RetentionPolicy, RetentionReport};
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct Results {
    by_id: HashMap<ResultId, ExperimentResult>,
    /// Insertion order
    order: Vec<ResultId>,
}

/// In-memory result store backed by a `HashMap<ResultId, ExperimentResult>`.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    results: Mutex<Results>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop results according to `policy`, evaluated at `now`.
    ///
    /// This sits outside the append-only [`ResultStore`] contract: the
    /// lifecycle engine never calls it, an operator does.
    pub fn apply_retention(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> RetentionReport {
        let mut results = self.lock();
        let expired = policy.select_expired(
            results
                .order
                .iter()
                .filter_map(|id| results.by_id.get(id))
                .map(|r| (r.id, r.completed_at)),
            now,
        );

        if !expired.is_empty() {
            let Results { by_id, order } = &mut *results;
            for id in &expired {
                by_id.remove(id);
            }
            order.retain(|id| by_id.contains_key(id));
        }

        tracing::debug!(
            removed = expired.len(),
            remaining = results.order.len(),
            "result retention applied"
        );
        RetentionReport {
            remaining_count: results.order.len(),
            removed_ids: expired,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Results> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, result: ExperimentResult) -> StorageResult<ResultId> {
        let mut results = self.lock();
        let id = result.id;
        if results.by_id.contains_key(&id) {
            return Err(StorageError::DuplicateResult {
                result_id: id.to_string(),
            });
        }
        results.by_id.insert(id, result);
        results.order.push(id);
        Ok(id)
    }

    async fn get(&self, result_id: &ResultId) -> StorageResult<ExperimentResult> {
        let results = self.lock();
        results
            .by_id
            .get(result_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                result_id: result_id.to_string(),
            })
    }

    async fn list_by_experiment(
        &self,
        experiment_id: &ExperimentId,
    ) -> StorageResult<Vec<ExperimentResult>> {
        let results = self.lock();
        Ok(results
            .order
            .iter()
            .filter_map(|id| results.by_id.get(id))
            .filter(|r| r.experiment_id == *experiment_id)
            .cloned()
            .collect())
    }

    async fn list(&self) -> StorageResult<Vec<ExperimentResult>> {
        let results = self.lock();
        Ok(results
            .order
            .iter()
            .filter_map(|id| results.by_id.get(id))
            .cloned()
            .collect())
    }
}
