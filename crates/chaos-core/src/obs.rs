//! Structured observability hooks for the experiment lifecycle.
//!
//! This module provides:
//! - Experiment-scoped tracing spans: [`experiment_span`] for spawned
//!   registry tasks, the `ExperimentSpan` RAII guard for synchronous callers
//! - Emission functions for every lifecycle transition and for the
//!   best-effort failures the registry swallows
//!
//! Transitions are emitted at `info!`; swallowed sink failures at `warn!`;
//! invariant violations at `error!`. Filter with `CHAOS_LOG` (see
//! [`init_tracing`](crate::init_tracing)).

use chaos_state::{ExperimentId, Outcome, ResultId};
use tracing::{debug, error, info, warn, Span};

use crate::domain::ExperimentStatus;

/// Span tagged with the experiment id and the lifecycle phase it covers.
///
/// The registry instruments its scheduling and injection tasks with it.
pub fn experiment_span(experiment_id: &ExperimentId, phase: &'static str) -> Span {
    tracing::info_span!("chaos.experiment", experiment_id = %experiment_id, phase = phase)
}

/// RAII guard that enters an experiment-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = ExperimentSpan::enter(&experiment.id);
/// // every event below carries experiment_id
/// ```
pub struct ExperimentSpan {
    _span: tracing::span::EnteredSpan,
}

impl ExperimentSpan {
    /// Create and enter a span tagged with the experiment id.
    pub fn enter(experiment_id: &ExperimentId) -> Self {
        Self {
            _span: experiment_span(experiment_id, "client").entered(),
        }
    }
}

/// Emit event: experiment created (status pending).
pub fn emit_experiment_created(experiment_id: &ExperimentId, kind: &str) {
    info!(event = "experiment.created", experiment_id = %experiment_id, kind = %kind);
}

/// Emit event: scheduling delay elapsed and admission granted.
pub fn emit_experiment_scheduled(experiment_id: &ExperimentId) {
    info!(event = "experiment.scheduled", experiment_id = %experiment_id);
}

/// Emit event: admission policy refused the experiment.
pub fn emit_admission_rejected(experiment_id: &ExperimentId, reason: &str) {
    warn!(event = "experiment.admission_rejected", experiment_id = %experiment_id, reason = %reason);
}

/// Emit event: experiment started, injection handed to the executor.
pub fn emit_experiment_started(experiment_id: &ExperimentId, kind: &str) {
    info!(event = "experiment.started", experiment_id = %experiment_id, kind = %kind);
}

/// Emit event: client asked to stop a running experiment.
pub fn emit_stop_requested(experiment_id: &ExperimentId) {
    info!(event = "experiment.stop_requested", experiment_id = %experiment_id);
}

/// Emit event: executor did not acknowledge cancellation within the grace period.
pub fn emit_cancel_unacknowledged(experiment_id: &ExperimentId, grace_ms: u64) {
    warn!(
        event = "experiment.cancel_unacknowledged",
        experiment_id = %experiment_id,
        grace_ms = grace_ms,
    );
}

/// Emit event: injection run exceeded the configured run timeout.
pub fn emit_run_timed_out(experiment_id: &ExperimentId, timeout_ms: u64) {
    warn!(event = "experiment.run_timed_out", experiment_id = %experiment_id, timeout_ms = timeout_ms);
}

/// Emit event: terminal transition applied.
pub fn emit_experiment_finished(
    experiment_id: &ExperimentId,
    kind: &str,
    outcome: Outcome,
    duration_ms: Option<u64>,
    result_id: Option<&ResultId>,
) {
    info!(
        event = "experiment.finished",
        experiment_id = %experiment_id,
        kind = %kind,
        outcome = %outcome,
        duration_ms = duration_ms,
        result_id = result_id.map(tracing::field::display),
    );
}

/// Emit event: a client transition was refused for the current status.
pub fn emit_transition_rejected(
    experiment_id: &ExperimentId,
    operation: &str,
    current: ExperimentStatus,
) {
    info!(
        event = "experiment.transition_rejected",
        experiment_id = %experiment_id,
        operation = %operation,
        current = %current,
    );
}

/// Emit event: a duplicate completion signal was dropped.
pub fn emit_completion_ignored(experiment_id: &ExperimentId, current: ExperimentStatus) {
    debug!(
        event = "experiment.completion_ignored",
        experiment_id = %experiment_id,
        current = %current,
    );
}

/// Emit event: a stale timer fired after the experiment moved on.
pub fn emit_stale_timer(experiment_id: &ExperimentId, expected: ExperimentStatus, current: ExperimentStatus) {
    debug!(
        event = "experiment.stale_timer",
        experiment_id = %experiment_id,
        expected = %expected,
        current = %current,
    );
}

/// Emit event: a metrics, monitoring or result-store write failed and was
/// suppressed (warning level).
pub fn emit_sink_error(experiment_id: &ExperimentId, sink: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "experiment.sink_error",
        experiment_id = %experiment_id,
        sink = %sink,
        error = %error,
    );
}

/// Emit event: an internal invariant was violated (error level).
pub fn emit_invariant_violation(detail: &str) {
    error!(event = "registry.invariant_violation", detail = %detail);
}
