//! Observability tests for the experiment lifecycle.
//!
//! These verify that structured tracing events are emitted for each
//! transition and for the failures the registry swallows.

use std::sync::Arc;

use chaos_core::fakes::{FailingMetricsSink, ManualExecutor};
use chaos_core::{
    emit_experiment_created, emit_experiment_finished, emit_experiment_started,
    ExperimentDefinition, ExperimentId, ExperimentRegistry, ExperimentSpan, ExperimentStatus,
    InjectionOutcome, Outcome, ResultId,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_experiment_created_logs_kind() {
    emit_experiment_created(&ExperimentId::new(), "cpu-stress");
    assert!(logs_contain("experiment.created"));
    assert!(logs_contain("cpu-stress"));
}

#[traced_test]
#[test]
fn test_emit_experiment_finished_logs_outcome_and_result() {
    let result_id = ResultId::new();
    emit_experiment_finished(
        &ExperimentId::new(),
        "io-delay",
        Outcome::Stopped,
        Some(1500),
        Some(&result_id),
    );
    assert!(logs_contain("experiment.finished"));
    assert!(logs_contain("stopped"));
    assert!(logs_contain(&result_id.to_string()));
}

#[traced_test]
#[test]
fn test_experiment_span_enter_creates_span() {
    let id = ExperimentId::new();
    let span = ExperimentSpan::enter(&id);
    emit_experiment_started(&id, "pod-failure");
    drop(span);
    assert!(logs_contain("experiment.started"));
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_lifecycle_emits_transition_events() {
    let executor = Arc::new(ManualExecutor::new());
    let registry = ExperimentRegistry::builder(executor.clone()).build();

    let id = registry
        .create(ExperimentDefinition::new("network-latency"))
        .await
        .expect("create")
        .id;
    registry
        .wait_for(id, |s| s == ExperimentStatus::Scheduled)
        .await
        .expect("scheduled");
    registry.start(id).await.expect("start");
    executor.resolve(id, InjectionOutcome::Completed);
    registry.wait_for_terminal(id).await.expect("terminal");

    assert!(logs_contain("experiment.created"));
    assert!(logs_contain("experiment.scheduled"));
    assert!(logs_contain("experiment.started"));
    assert!(logs_contain("experiment.finished"));
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_rejected_transition_and_sink_errors_are_logged() {
    let executor = Arc::new(ManualExecutor::new());
    let registry = ExperimentRegistry::builder(executor.clone())
        .metrics(Arc::new(FailingMetricsSink::new()))
        .build();

    let id = registry
        .create(ExperimentDefinition::new("cpu-stress"))
        .await
        .expect("create")
        .id;
    assert!(registry.stop(id).await.is_err());

    assert!(logs_contain("experiment.transition_rejected"));
    assert!(logs_contain("experiment.sink_error"));
    assert!(logs_contain("metrics backend down"));
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_timer_events_carry_experiment_span() {
    let executor = Arc::new(ManualExecutor::new());
    let registry = ExperimentRegistry::builder(executor.clone()).build();

    let id = registry
        .create(ExperimentDefinition::new("io-delay"))
        .await
        .expect("create")
        .id;
    registry
        .wait_for(id, |s| s == ExperimentStatus::Scheduled)
        .await
        .expect("scheduled");
    registry.start(id).await.expect("start");
    executor.resolve(id, InjectionOutcome::Completed);
    registry.wait_for_terminal(id).await.expect("terminal");

    assert!(logs_contain("chaos.experiment"));
    assert!(logs_contain("phase=\"schedule\""));
    assert!(logs_contain("phase=\"injection\""));
}
