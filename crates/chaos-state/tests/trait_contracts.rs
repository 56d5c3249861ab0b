//! Trait contract tests for ResultStore.
//!
//! These tests verify the behavioral contract of the result store using the
//! in-memory implementation. Any conforming backend must pass these.

use chaos_state::storage_traits::*;
use chaos_state::{MemoryResultStore, RetentionPolicy, StorageError};
use chrono::{Duration, Utc};

fn result_for(experiment_id: ExperimentId, outcome: Outcome) -> ExperimentResult {
    ExperimentResult {
        id: ResultId::new(),
        experiment_id,
        outcome,
        reason: None,
        metrics: None,
        completed_at: Utc::now(),
    }
}

#[tokio::test]
async fn put_returns_the_record_id() {
    let store = MemoryResultStore::new();
    let result = result_for(ExperimentId::new(), Outcome::Completed);
    let expected = result.id;

    let id = store.put(result).await.unwrap();
    assert_eq!(id, expected);
}

#[tokio::test]
async fn get_round_trip() {
    let store = MemoryResultStore::new();
    let mut result = result_for(ExperimentId::new(), Outcome::Failed);
    result.reason = Some("executor crashed".to_string());
    result.metrics = Some(ResultMetrics {
        error_rate: 1.5,
        latency_ms: 210.0,
        availability: 99.7,
    });

    let id = store.put(result.clone()).await.unwrap();
    assert_eq!(store.get(&id).await.unwrap(), result);
}

#[tokio::test]
async fn get_not_found() {
    let store = MemoryResultStore::new();
    let err = store.get(&ResultId::new()).await.unwrap_err();

    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_put_is_rejected_and_original_kept() {
    let store = MemoryResultStore::new();
    let original = result_for(ExperimentId::new(), Outcome::Completed);
    let id = store.put(original.clone()).await.unwrap();

    let mut clash = result_for(ExperimentId::new(), Outcome::Stopped);
    clash.id = id;
    let err = store.put(clash).await.unwrap_err();

    assert!(matches!(err, StorageError::DuplicateResult { .. }));
    assert_eq!(store.get(&id).await.unwrap(), original);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn list_by_experiment_filters_and_keeps_order() {
    let store = MemoryResultStore::new();
    let exp_a = ExperimentId::new();
    let exp_b = ExperimentId::new();

    let first = store.put(result_for(exp_a, Outcome::Completed)).await.unwrap();
    store.put(result_for(exp_b, Outcome::Stopped)).await.unwrap();
    let second = store.put(result_for(exp_a, Outcome::Failed)).await.unwrap();

    let ids: Vec<ResultId> = store
        .list_by_experiment(&exp_a)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![first, second]);
}

#[tokio::test]
async fn list_by_unknown_experiment_is_empty() {
    let store = MemoryResultStore::new();
    store
        .put(result_for(ExperimentId::new(), Outcome::Completed))
        .await
        .unwrap();

    let results = store.list_by_experiment(&ExperimentId::new()).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn list_returns_everything_in_insertion_order() {
    let store = MemoryResultStore::new();
    assert!(store.list().await.unwrap().is_empty());

    let mut expected = Vec::new();
    for _ in 0..3 {
        expected.push(
            store
                .put(result_for(ExperimentId::new(), Outcome::Completed))
                .await
                .unwrap(),
        );
    }

    let ids: Vec<ResultId> = store.list().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn retention_evicts_old_results_only_when_invoked() {
    let store = MemoryResultStore::new();
    let now = Utc::now();

    let mut old = result_for(ExperimentId::new(), Outcome::Completed);
    old.completed_at = now - Duration::hours(2);
    let old_id = store.put(old).await.unwrap();
    let fresh_id = store
        .put(result_for(ExperimentId::new(), Outcome::Completed))
        .await
        .unwrap();

    // Nothing is removed until a policy is applied.
    assert_eq!(store.len(), 2);

    let report = store.apply_retention(
        &RetentionPolicy {
            max_age_secs: Some(3600),
            max_results: None,
        },
        now,
    );

    assert_eq!(report.removed_ids, vec![old_id]);
    assert_eq!(report.remaining_count, 1);
    assert!(matches!(
        store.get(&old_id).await.unwrap_err(),
        StorageError::NotFound { .. }
    ));
    assert!(store.get(&fresh_id).await.is_ok());
}
