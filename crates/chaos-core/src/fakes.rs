//! Deterministic collaborators for tests.
//!
//! - `ManualExecutor`: injection runs that end only when the test says so
//! - `FailingMetricsSink`: a sink whose every call errors
//! - `FixedMonitoring`: always reports the same result metrics
//! - `FixedIds`: an id generator that always repeats itself
//! - `StepClock`: a clock that moves by a fixed step on every read

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chaos_state::{ExperimentId, Outcome, ResultMetrics};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::clock::{Clock, IdGenerator};
use crate::domain::{Experiment, ExperimentDefinition};
use crate::executor::{InjectionExecutor, InjectionOutcome};
use crate::metrics::{MetricsError, MetricsSink};
use crate::monitoring::{MonitoringError, MonitoringSource};

// ---------------------------------------------------------------------------
// ManualExecutor
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PendingRun {
    outcome: Mutex<Option<InjectionOutcome>>,
    ready: Notify,
}

/// Executor whose runs block until [`ManualExecutor::resolve`] is called.
///
/// By default `cancel` acknowledges immediately and resolves the run as
/// failed; [`ManualExecutor::unresponsive`] builds one whose `cancel` never
/// returns.
#[derive(Debug, Default)]
pub struct ManualExecutor {
    runs: DashMap<ExperimentId, Arc<PendingRun>>,
    started: AtomicU64,
    cancels: Mutex<Vec<ExperimentId>>,
    unresponsive: bool,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor that never acknowledges cancellation.
    pub fn unresponsive() -> Self {
        Self {
            unresponsive: true,
            ..Self::default()
        }
    }

    /// Finish the run for `experiment_id` (or pre-arm it if the run has not
    /// begun yet).
    pub fn resolve(&self, experiment_id: ExperimentId, outcome: InjectionOutcome) {
        let run = self.pending(experiment_id);
        *run.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        run.ready.notify_one();
    }

    /// Number of `run` calls received.
    pub fn runs_started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    /// Experiments `cancel` was called for, in call order.
    pub fn cancel_requests(&self) -> Vec<ExperimentId> {
        self.cancels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn pending(&self, experiment_id: ExperimentId) -> Arc<PendingRun> {
        Arc::clone(self.runs.entry(experiment_id).or_default().value())
    }
}

#[async_trait]
impl InjectionExecutor for ManualExecutor {
    async fn run(
        &self,
        experiment_id: ExperimentId,
        _definition: &ExperimentDefinition,
    ) -> InjectionOutcome {
        self.started.fetch_add(1, Ordering::SeqCst);
        let run = self.pending(experiment_id);
        loop {
            let ready = run
                .outcome
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(outcome) = ready {
                return outcome;
            }
            run.ready.notified().await;
        }
    }

    async fn cancel(&self, experiment_id: ExperimentId) {
        self.cancels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(experiment_id);
        if self.unresponsive {
            std::future::pending::<()>().await;
        }
        self.resolve(experiment_id, InjectionOutcome::failed("injection cancelled"));
    }
}

// ---------------------------------------------------------------------------
// FailingMetricsSink
// ---------------------------------------------------------------------------

/// Metrics sink that rejects every call.
#[derive(Debug, Default)]
pub struct FailingMetricsSink {
    attempts: AtomicU64,
}

impl FailingMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received (all of which failed).
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail(&self) -> Result<(), MetricsError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MetricsError::Unavailable("metrics backend down".to_string()))
    }
}

impl MetricsSink for FailingMetricsSink {
    fn record_created(&self, _kind: &str) -> Result<(), MetricsError> {
        self.fail()
    }

    fn record_completed(&self, _kind: &str, _outcome: Outcome) -> Result<(), MetricsError> {
        self.fail()
    }

    fn observe_duration(&self, _kind: &str, _seconds: f64) -> Result<(), MetricsError> {
        self.fail()
    }
}

// ---------------------------------------------------------------------------
// FixedMonitoring
// ---------------------------------------------------------------------------

/// Monitoring source returning canned metrics, or a canned error.
#[derive(Debug, Clone)]
pub struct FixedMonitoring {
    metrics: Option<ResultMetrics>,
}

impl FixedMonitoring {
    pub fn new(metrics: ResultMetrics) -> Self {
        Self {
            metrics: Some(metrics),
        }
    }

    /// A source that is always unavailable.
    pub fn unavailable() -> Self {
        Self { metrics: None }
    }
}

#[async_trait]
impl MonitoringSource for FixedMonitoring {
    async fn collect(&self, _experiment: &Experiment) -> Result<ResultMetrics, MonitoringError> {
        self.metrics
            .ok_or_else(|| MonitoringError::Unavailable("no monitoring backend".to_string()))
    }
}

// ---------------------------------------------------------------------------
// FixedIds / StepClock
// ---------------------------------------------------------------------------

/// Id generator that returns the same id every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedIds(pub Uuid);

impl IdGenerator for FixedIds {
    fn new_id(&self) -> Uuid {
        self.0
    }
}

/// Clock that advances by `step` on every read. A negative step simulates a
/// wall clock running backwards.
#[derive(Debug)]
pub struct StepClock {
    next: Mutex<DateTime<Utc>>,
    step: chrono::Duration,
}

impl StepClock {
    pub fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let now = *next;
        *next = now + self.step;
        now
    }
}
