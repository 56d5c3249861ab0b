//! Injection executor contract.
//!
//! The executor performs the actual fault (latency, partition, process kill,
//! ...). The registry calls [`InjectionExecutor::run`] once an experiment is
//! running and turns the returned [`InjectionOutcome`] into the terminal
//! transition. Retries, if any, are the executor's business.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chaos_state::{ExperimentId, Outcome};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::debug;

use crate::domain::ExperimentDefinition;

/// What an injection run reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InjectionOutcome {
    Completed,
    Failed { reason: String },
}

impl InjectionOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        InjectionOutcome::Failed {
            reason: reason.into(),
        }
    }

    /// Terminal outcome plus failure reason.
    pub fn into_parts(self) -> (Outcome, Option<String>) {
        match self {
            InjectionOutcome::Completed => (Outcome::Completed, None),
            InjectionOutcome::Failed { reason } => (Outcome::Failed, Some(reason)),
        }
    }
}

/// External fault-injection mechanism.
#[async_trait]
pub trait InjectionExecutor: Send + Sync {
    /// Perform the injection and report how it ended.
    async fn run(&self, experiment_id: ExperimentId, definition: &ExperimentDefinition)
        -> InjectionOutcome;

    /// Ask a running injection to unwind. Returning is the acknowledgment;
    /// the registry bounds how long it waits.
    async fn cancel(&self, experiment_id: ExperimentId);
}

/// Parameter that makes [`TimedExecutor`] report a failure.
pub const FAIL_WITH_PARAM: &str = "fail_with";

/// Reference executor that holds the fault for the requested window.
///
/// Each run lasts `definition.duration_ms` (or the default window) and then
/// reports `Completed`, unless the definition carries a string
/// `parameters.fail_with`, in which case it reports `Failed` with that reason.
/// `cancel` wakes the run immediately.
#[derive(Debug)]
pub struct TimedExecutor {
    default_window: Duration,
    active: DashMap<ExperimentId, Arc<Notify>>,
}

impl TimedExecutor {
    pub fn new(default_window: Duration) -> Self {
        Self {
            default_window,
            active: DashMap::new(),
        }
    }

    /// Runs currently holding a fault.
    pub fn active_runs(&self) -> usize {
        self.active.len()
    }

    fn register(&self, experiment_id: ExperimentId) -> (Arc<Notify>, ActiveRun<'_>) {
        let cancelled = Arc::new(Notify::new());
        self.active.insert(experiment_id, Arc::clone(&cancelled));
        let guard = ActiveRun {
            active: &self.active,
            experiment_id,
        };
        (cancelled, guard)
    }
}

/// Deregisters a run when its future finishes or is dropped mid-window.
struct ActiveRun<'a> {
    active: &'a DashMap<ExperimentId, Arc<Notify>>,
    experiment_id: ExperimentId,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.experiment_id);
    }
}

impl Default for TimedExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl InjectionExecutor for TimedExecutor {
    async fn run(
        &self,
        experiment_id: ExperimentId,
        definition: &ExperimentDefinition,
    ) -> InjectionOutcome {
        let (cancelled, _active) = self.register(experiment_id);
        let window = definition
            .duration_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_window);

        debug!(experiment_id = %experiment_id, window_ms = window.as_millis() as u64, "injection window opened");

        tokio::select! {
            _ = tokio::time::sleep(window) => {
                match definition.parameters.get(FAIL_WITH_PARAM).and_then(|v| v.as_str()) {
                    Some(reason) => InjectionOutcome::failed(reason),
                    None => InjectionOutcome::Completed,
                }
            }
            _ = cancelled.notified() => InjectionOutcome::failed("injection cancelled"),
        }
    }

    async fn cancel(&self, experiment_id: ExperimentId) {
        // No active run means nothing to wake; never leave an entry behind.
        let signal = self
            .active
            .get(&experiment_id)
            .map(|entry| Arc::clone(entry.value()));
        if let Some(signal) = signal {
            signal.notify_one();
        }
    }
}
