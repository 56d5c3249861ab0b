//! Experiment registry: the lifecycle engine.
//!
//! ```text
//! Pending --(scheduling delay + admission)--> Scheduled
//! Scheduled --start--> Running
//! Running --stop--> Stopped
//! Running --executor: completed--> Completed
//! Running --executor: failed / run timeout--> Failed
//! Pending --admission rejected--> Failed
//! ```
//!
//! Locking: every experiment has its own async *transition lock*. All state
//! changes for one experiment happen while holding it, so a `stop` racing an
//! executor completion is decided by whoever takes the lock first; the loser
//! finds a terminal status and becomes a no-op. The experiment record itself
//! sits behind a short-held `RwLock` that is never held across an await, so
//! `get`/`list` never wait on a transition in progress. The id→slot map is a
//! sharded `DashMap`; insertion order lives in its own short-held mutex.
//!
//! Timer-driven transitions (promotion, injection completion) run as spawned
//! tasks that take the transition lock only when they fire and re-check the
//! expected status first; each runs in a child span of the caller's span.
//! A registry must therefore be used from within a Tokio runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chaos_state::{
    ExperimentId, ExperimentResult, MemoryResultStore, Outcome, ResultId, ResultMetrics,
    ResultStore, StorageError,
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{warn, Instrument};

use crate::admission::{AdmissionContext, AdmissionDecision, AdmissionPolicy, AdmitAll};
use crate::clock::{Clock, IdGenerator, RandomIds, SystemClock};
use crate::config::RegistryConfig;
use crate::domain::{Experiment, ExperimentDefinition, ExperimentStatus, RegistryError, Result};
use crate::executor::{InjectionExecutor, InjectionOutcome};
use crate::metrics::{ExperimentMetrics, MetricsError, MetricsSink};
use crate::monitoring::MonitoringSource;
use crate::obs;

/// Per-experiment state.
struct Slot {
    /// Serializes transitions. May be held across awaits.
    transition: tokio::sync::Mutex<()>,
    /// Current record. Never held across an await.
    state: RwLock<Experiment>,
    status: watch::Sender<ExperimentStatus>,
}

impl Slot {
    fn new(experiment: Experiment) -> Self {
        let (status, _) = watch::channel(experiment.status);
        Self {
            transition: tokio::sync::Mutex::new(()),
            state: RwLock::new(experiment),
            status,
        }
    }

    fn snapshot(&self) -> Experiment {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish a new record. Callers must hold the transition lock.
    fn replace(&self, experiment: Experiment) {
        let status = experiment.status;
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = experiment;
        self.status.send_replace(status);
    }
}

struct Inner {
    config: RegistryConfig,
    experiments: DashMap<ExperimentId, Arc<Slot>>,
    order: Mutex<Vec<ExperimentId>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    metrics: Arc<dyn MetricsSink>,
    results: Arc<dyn ResultStore>,
    executor: Arc<dyn InjectionExecutor>,
    admission: Arc<dyn AdmissionPolicy>,
    monitoring: Option<Arc<dyn MonitoringSource>>,
}

impl Inner {
    fn slot(&self, id: ExperimentId) -> Result<Arc<Slot>> {
        self.experiments
            .get(&id)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or(RegistryError::NotFound(id))
    }

    fn order(&self) -> MutexGuard<'_, Vec<ExperimentId>> {
        self.order.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current time, never earlier than `floor`, so lifecycle timestamps
    /// stay ordered even if the wall clock steps backwards.
    fn stamp(&self, floor: DateTime<Utc>) -> DateTime<Utc> {
        self.clock.now().max(floor)
    }

    fn record<F>(&self, id: &ExperimentId, sink: &str, f: F)
    where
        F: FnOnce(&dyn MetricsSink) -> std::result::Result<(), MetricsError>,
    {
        if let Err(e) = f(self.metrics.as_ref()) {
            obs::emit_sink_error(id, sink, &e);
        }
    }

    fn admission_context(&self, candidate: &Experiment) -> AdmissionContext {
        let mut context = AdmissionContext::default();
        for entry in self.experiments.iter() {
            if *entry.key() == candidate.id {
                continue;
            }
            let experiment = entry.value().snapshot();
            if experiment.status.is_active() {
                context.active_total += 1;
                if experiment.kind() == candidate.kind() {
                    context.active_of_kind += 1;
                }
            }
        }
        context
    }

    /// Ask the executor to cancel, waiting at most the grace period.
    /// Returns whether the executor acknowledged in time.
    async fn cancel_with_grace(&self, id: ExperimentId) -> bool {
        let grace = self.config.stop_grace();
        let acknowledged = tokio::time::timeout(grace, self.executor.cancel(id))
            .await
            .is_ok();
        if !acknowledged {
            obs::emit_cancel_unacknowledged(&id, self.config.stop_grace_ms);
        }
        acknowledged
    }

    async fn collect_metrics(&self, experiment: &Experiment) -> Option<ResultMetrics> {
        let source = self.monitoring.as_ref()?;
        let limit = self.config.monitoring_timeout();
        match tokio::time::timeout(limit, source.collect(experiment)).await {
            Ok(Ok(metrics)) => Some(metrics),
            Ok(Err(e)) => {
                obs::emit_sink_error(&experiment.id, "monitoring", &e);
                None
            }
            Err(_) => {
                obs::emit_sink_error(
                    &experiment.id,
                    "monitoring",
                    &format!("timed out after {}ms", self.config.monitoring_timeout_ms),
                );
                None
            }
        }
    }
}

/// Builder for [`ExperimentRegistry`].
///
/// Only the executor is required; everything else has an in-process default
/// (`MemoryResultStore`, `ExperimentMetrics`, `SystemClock`, `RandomIds`,
/// `AdmitAll`, no monitoring).
pub struct RegistryBuilder {
    config: RegistryConfig,
    executor: Arc<dyn InjectionExecutor>,
    results: Option<Arc<dyn ResultStore>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    admission: Arc<dyn AdmissionPolicy>,
    monitoring: Option<Arc<dyn MonitoringSource>>,
}

impl RegistryBuilder {
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn result_store(mut self, results: Arc<dyn ResultStore>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn admission(mut self, admission: Arc<dyn AdmissionPolicy>) -> Self {
        self.admission = admission;
        self
    }

    pub fn monitoring(mut self, monitoring: Arc<dyn MonitoringSource>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    pub fn build(self) -> ExperimentRegistry {
        ExperimentRegistry {
            inner: Arc::new(Inner {
                config: self.config,
                experiments: DashMap::new(),
                order: Mutex::new(Vec::new()),
                clock: self.clock,
                ids: self.ids,
                metrics: self
                    .metrics
                    .unwrap_or_else(|| Arc::new(ExperimentMetrics::new())),
                results: self
                    .results
                    .unwrap_or_else(|| Arc::new(MemoryResultStore::new())),
                executor: self.executor,
                admission: self.admission,
                monitoring: self.monitoring,
            }),
        }
    }
}

/// Shared handle to the lifecycle engine. Cloning is cheap; all clones see
/// the same experiments.
#[derive(Clone)]
pub struct ExperimentRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ExperimentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentRegistry")
            .field("config", &self.inner.config)
            .field("experiments", &self.inner.experiments.len())
            .finish()
    }
}

impl ExperimentRegistry {
    /// Start building a registry around `executor`.
    pub fn builder(executor: Arc<dyn InjectionExecutor>) -> RegistryBuilder {
        RegistryBuilder {
            config: RegistryConfig::default(),
            executor,
            results: None,
            metrics: None,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds),
            admission: Arc::new(AdmitAll),
            monitoring: None,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Register a new experiment in `Pending` and arm its scheduling timer.
    pub async fn create(&self, definition: ExperimentDefinition) -> Result<Experiment> {
        definition.validate()?;

        let id = ExperimentId(self.inner.ids.new_id());
        let experiment = Experiment::new(id, definition, self.inner.clock.now());

        match self.inner.experiments.entry(id) {
            Entry::Occupied(_) => {
                let detail = format!("experiment id collision: {id}");
                obs::emit_invariant_violation(&detail);
                return Err(RegistryError::InternalInvariantViolation(detail));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(Slot::new(experiment.clone())));
            }
        }
        self.inner.order().push(id);

        self.inner
            .record(&id, "metrics", |m| m.record_created(experiment.kind()));
        obs::emit_experiment_created(&id, experiment.kind());

        self.spawn_promotion(id);
        Ok(experiment)
    }

    /// `Scheduled -> Running`; hands the injection to the executor.
    pub async fn start(&self, id: ExperimentId) -> Result<Experiment> {
        let slot = self.inner.slot(id)?;
        let _transition = slot.transition.lock().await;

        let mut experiment = slot.snapshot();
        if experiment.status != ExperimentStatus::Scheduled {
            return Err(self.reject(id, "start", experiment.status));
        }

        experiment.status = ExperimentStatus::Running;
        experiment.started_at = Some(self.inner.stamp(experiment.last_transition_at()));
        slot.replace(experiment.clone());
        obs::emit_experiment_started(&id, experiment.kind());

        self.spawn_injection(id, experiment.definition.clone());
        Ok(experiment)
    }

    /// `Running -> Stopped`. Cancels the injection, waiting at most the
    /// configured grace period for the executor to acknowledge.
    pub async fn stop(&self, id: ExperimentId) -> Result<Experiment> {
        let slot = self.inner.slot(id)?;
        let _transition = slot.transition.lock().await;

        let experiment = slot.snapshot();
        if experiment.status != ExperimentStatus::Running {
            return Err(self.reject(id, "stop", experiment.status));
        }

        obs::emit_stop_requested(&id);
        self.inner.cancel_with_grace(id).await;
        self.finalize(&slot, experiment, Outcome::Stopped, None).await
    }

    /// Apply a terminal outcome to a running experiment.
    ///
    /// Idempotent: returns `Ok(None)` without side effects when the
    /// experiment is already terminal. Fails with `InvalidTransition` for
    /// experiments that never started.
    pub async fn complete(&self, id: ExperimentId, outcome: Outcome) -> Result<Option<Experiment>> {
        self.complete_with_reason(id, outcome, None).await
    }

    /// [`complete`](Self::complete) with a failure reason.
    pub async fn complete_with_reason(
        &self,
        id: ExperimentId,
        outcome: Outcome,
        reason: Option<String>,
    ) -> Result<Option<Experiment>> {
        let slot = self.inner.slot(id)?;
        let _transition = slot.transition.lock().await;

        let experiment = slot.snapshot();
        if experiment.status.is_terminal() {
            obs::emit_completion_ignored(&id, experiment.status);
            return Ok(None);
        }
        if experiment.status != ExperimentStatus::Running {
            return Err(self.reject(id, "complete", experiment.status));
        }

        self.finalize(&slot, experiment, outcome, reason)
            .await
            .map(Some)
    }

    pub async fn get(&self, id: ExperimentId) -> Result<Experiment> {
        Ok(self.inner.slot(id)?.snapshot())
    }

    /// Snapshot of every experiment, in creation order.
    pub async fn list(&self) -> Vec<Experiment> {
        let order = self.inner.order().clone();
        order
            .into_iter()
            .filter_map(|id| self.inner.experiments.get(&id).map(|s| Arc::clone(s.value())))
            .map(|slot| slot.snapshot())
            .collect()
    }

    /// Snapshot of experiments currently in `status`, in creation order.
    pub async fn list_by_status(&self, status: ExperimentStatus) -> Vec<Experiment> {
        self.list()
            .await
            .into_iter()
            .filter(|e| e.status == status)
            .collect()
    }

    /// Resolve once the experiment's status satisfies `predicate`
    /// (immediately if it already does).
    pub async fn wait_for<F>(&self, id: ExperimentId, mut predicate: F) -> Result<Experiment>
    where
        F: FnMut(ExperimentStatus) -> bool,
    {
        let slot = self.inner.slot(id)?;
        let mut status = slot.status.subscribe();
        status
            .wait_for(|s| predicate(*s))
            .await
            .map_err(|_| {
                RegistryError::InternalInvariantViolation(format!(
                    "status channel closed for experiment {id}"
                ))
            })?;
        Ok(slot.snapshot())
    }

    /// Resolve once the experiment reaches a terminal status.
    pub async fn wait_for_terminal(&self, id: ExperimentId) -> Result<Experiment> {
        self.wait_for(id, |s| s.is_terminal()).await
    }

    pub async fn get_result(&self, result_id: ResultId) -> Result<ExperimentResult> {
        match self.inner.results.get(&result_id).await {
            Ok(result) => Ok(result),
            Err(StorageError::NotFound { .. }) => Err(RegistryError::ResultNotFound(result_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Results recorded for an experiment (at most one under correct locking).
    pub async fn results_for(&self, id: ExperimentId) -> Result<Vec<ExperimentResult>> {
        Ok(self.inner.results.list_by_experiment(&id).await?)
    }

    /// Every stored result.
    pub async fn results(&self) -> Result<Vec<ExperimentResult>> {
        Ok(self.inner.results.list().await?)
    }

    fn reject(&self, id: ExperimentId, operation: &'static str, current: ExperimentStatus) -> RegistryError {
        obs::emit_transition_rejected(&id, operation, current);
        RegistryError::InvalidTransition {
            id,
            operation,
            current,
        }
    }

    fn spawn_promotion(&self, id: ExperimentId) {
        let registry = self.clone();
        let delay = self.inner.config.scheduling_delay();
        tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = registry.promote(id).await {
                    warn!(experiment_id = %id, error = %e, "scheduling timer failed");
                }
            }
            .instrument(obs::experiment_span(&id, "schedule")),
        );
    }

    /// Scheduling timer body: `Pending -> Scheduled`, or `Failed` when the
    /// admission policy refuses.
    async fn promote(&self, id: ExperimentId) -> Result<()> {
        let slot = self.inner.slot(id)?;
        let _transition = slot.transition.lock().await;

        let mut experiment = slot.snapshot();
        if experiment.status != ExperimentStatus::Pending {
            obs::emit_stale_timer(&id, ExperimentStatus::Pending, experiment.status);
            return Ok(());
        }

        let context = self.inner.admission_context(&experiment);
        match self.inner.admission.admit(&experiment, &context).await {
            AdmissionDecision::Admit => {
                experiment.status = ExperimentStatus::Scheduled;
                experiment.scheduled_at = Some(self.inner.stamp(experiment.last_transition_at()));
                slot.replace(experiment);
                obs::emit_experiment_scheduled(&id);
            }
            AdmissionDecision::Reject { reason } => {
                obs::emit_admission_rejected(&id, &reason);
                self.finalize(&slot, experiment, Outcome::Failed, Some(reason))
                    .await?;
            }
        }
        Ok(())
    }

    fn spawn_injection(&self, id: ExperimentId, definition: ExperimentDefinition) {
        let registry = self.clone();
        tokio::spawn(
            async move {
                let (outcome, reason) = registry.run_injection(id, &definition).await.into_parts();
                if let Err(e) = registry.complete_with_reason(id, outcome, reason).await {
                    warn!(experiment_id = %id, error = %e, "injection completion failed");
                }
            }
            .instrument(obs::experiment_span(&id, "injection")),
        );
    }

    async fn run_injection(&self, id: ExperimentId, definition: &ExperimentDefinition) -> InjectionOutcome {
        let executor = &self.inner.executor;
        let Some(limit) = self.inner.config.run_timeout() else {
            return executor.run(id, definition).await;
        };

        match tokio::time::timeout(limit, executor.run(id, definition)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let limit_ms = limit.as_millis() as u64;
                obs::emit_run_timed_out(&id, limit_ms);
                self.inner.cancel_with_grace(id).await;
                InjectionOutcome::failed(format!("injection exceeded run timeout of {limit_ms}ms"))
            }
        }
    }

    /// Terminal transition. Callers must hold the slot's transition lock and
    /// pass the current, non-terminal record.
    async fn finalize(
        &self,
        slot: &Slot,
        mut experiment: Experiment,
        outcome: Outcome,
        reason: Option<String>,
    ) -> Result<Experiment> {
        let id = experiment.id;
        let completed_at = self.inner.stamp(experiment.last_transition_at());
        experiment.status = outcome.into();
        experiment.completed_at = Some(completed_at);
        experiment.failure_reason = reason.clone();

        let metrics = self.inner.collect_metrics(&experiment).await;
        let result = ExperimentResult {
            id: ResultId(self.inner.ids.new_id()),
            experiment_id: id,
            outcome,
            reason,
            metrics,
            completed_at,
        };

        experiment.result_id = match self.inner.results.put(result).await {
            Ok(result_id) => Some(result_id),
            Err(StorageError::DuplicateResult { result_id }) => {
                let detail = format!("result id collision for experiment {id}: {result_id}");
                obs::emit_invariant_violation(&detail);
                return Err(RegistryError::InternalInvariantViolation(detail));
            }
            Err(e) => {
                obs::emit_sink_error(&id, "result_store", &e);
                None
            }
        };
        slot.replace(experiment.clone());

        let duration = experiment.duration();
        if let Some(duration) = duration {
            self.inner.record(&id, "metrics", |m| {
                m.observe_duration(experiment.kind(), duration.as_secs_f64())
            });
        }
        self.inner
            .record(&id, "metrics", |m| m.record_completed(experiment.kind(), outcome));
        obs::emit_experiment_finished(
            &id,
            experiment.kind(),
            outcome,
            duration.map(|d| d.as_millis() as u64),
            experiment.result_id.as_ref(),
        );

        Ok(experiment)
    }
}
