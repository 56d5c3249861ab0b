//! Lifecycle metrics as seen through the registry.

use std::sync::Arc;

use chaos_core::fakes::{FailingMetricsSink, ManualExecutor, StepClock};
use chaos_core::{
    ExperimentDefinition, ExperimentId, ExperimentMetrics, ExperimentRegistry, ExperimentStatus,
    InjectionOutcome, Outcome,
};
use chrono::{TimeZone, Utc};

async fn start_one(registry: &ExperimentRegistry, kind: &str) -> ExperimentId {
    let id = registry
        .create(ExperimentDefinition::new(kind))
        .await
        .expect("create")
        .id;
    registry
        .wait_for(id, |s| s == ExperimentStatus::Scheduled)
        .await
        .expect("scheduled");
    registry.start(id).await.expect("start");
    id
}

#[tokio::test(start_paused = true)]
async fn test_network_latency_scenario_counts() {
    let metrics = Arc::new(ExperimentMetrics::new());
    let executor = Arc::new(ManualExecutor::new());
    let registry = ExperimentRegistry::builder(executor.clone())
        .metrics(metrics.clone())
        .clock(Arc::new(StepClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            chrono::Duration::seconds(1),
        )))
        .build();

    let a = start_one(&registry, "network-latency").await;
    let b = start_one(&registry, "network-latency").await;
    let c = start_one(&registry, "network-latency").await;

    executor.resolve(a, InjectionOutcome::Completed);
    executor.resolve(b, InjectionOutcome::Completed);
    registry.wait_for_terminal(a).await.expect("a terminal");
    registry.wait_for_terminal(b).await.expect("b terminal");
    registry.stop(c).await.expect("stop c");

    assert_eq!(metrics.created("network-latency"), 3);
    assert_eq!(metrics.created_total(), 3);
    assert_eq!(metrics.completed("network-latency", Outcome::Completed), 2);
    assert_eq!(metrics.completed("network-latency", Outcome::Stopped), 1);
    assert_eq!(metrics.completed("network-latency", Outcome::Failed), 0);

    let durations = metrics.durations("network-latency");
    assert_eq!(durations.count, 3);
    assert_eq!(durations.buckets[0], 3);
    assert!(durations.sum > 0.0);

    let text = metrics.render_prometheus();
    assert!(text.contains("chaos_experiments_created_total{type=\"network-latency\"} 3"));
    assert!(text.contains(
        "chaos_experiments_completed_total{type=\"network-latency\",status=\"stopped\"} 1"
    ));
    assert!(text.contains("chaos_experiment_duration_seconds_count{type=\"network-latency\"} 3"));
}

#[tokio::test(start_paused = true)]
async fn test_admission_failure_records_no_duration() {
    use chaos_core::MaxActive;

    let metrics = Arc::new(ExperimentMetrics::new());
    let registry = ExperimentRegistry::builder(Arc::new(ManualExecutor::new()))
        .metrics(metrics.clone())
        .admission(Arc::new(MaxActive {
            per_kind: None,
            total: Some(0),
        }))
        .build();

    let id = registry
        .create(ExperimentDefinition::new("cpu-stress"))
        .await
        .expect("create")
        .id;
    let done = registry.wait_for_terminal(id).await.expect("terminal");
    assert_eq!(done.status, ExperimentStatus::Failed);

    assert_eq!(metrics.completed("cpu-stress", Outcome::Failed), 1);
    assert_eq!(metrics.durations("cpu-stress").count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failing_sink_never_fails_lifecycle() {
    let sink = Arc::new(FailingMetricsSink::new());
    let executor = Arc::new(ManualExecutor::new());
    let registry = ExperimentRegistry::builder(executor.clone())
        .metrics(sink.clone())
        .build();

    let id = start_one(&registry, "cpu-stress").await;
    executor.resolve(id, InjectionOutcome::Completed);
    let done = registry.wait_for_terminal(id).await.expect("terminal");

    assert_eq!(done.status, ExperimentStatus::Completed);
    assert!(done.result_id.is_some());
    // created + duration + completed
    assert_eq!(sink.attempts(), 3);
}
