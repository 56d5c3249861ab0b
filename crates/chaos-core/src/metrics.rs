//! Experiment metrics: the sink contract and an in-memory recorder.
//!
//! The registry reports every creation, completion and run duration to a
//! [`MetricsSink`]. Sinks are best-effort: an `Err` is logged by the caller
//! and never fails a lifecycle operation.
//!
//! [`ExperimentMetrics`] keeps labelled counters and a duration histogram in
//! memory. Call [`ExperimentMetrics::flush`] to emit current values as a
//! single `tracing::info!` event, or [`ExperimentMetrics::render_prometheus`]
//! for the text exposition format.

use std::fmt::Write as _;

use chaos_state::Outcome;
use dashmap::DashMap;

/// Upper bounds (seconds) of the duration histogram buckets.
pub const DURATION_BUCKETS: [f64; 5] = [60.0, 300.0, 600.0, 1800.0, 3600.0];

/// Errors a metrics sink may report.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("invalid duration observation: {0}")]
    InvalidObservation(f64),

    #[error("metrics backend unavailable: {0}")]
    Unavailable(String),
}

/// Recorder for lifecycle metrics, keyed by experiment type and outcome.
pub trait MetricsSink: Send + Sync {
    /// An experiment of `kind` was created.
    fn record_created(&self, kind: &str) -> Result<(), MetricsError>;

    /// An experiment of `kind` reached a terminal outcome.
    fn record_completed(&self, kind: &str, outcome: Outcome) -> Result<(), MetricsError>;

    /// Observe the run duration of an experiment of `kind`.
    fn observe_duration(&self, kind: &str, seconds: f64) -> Result<(), MetricsError>;
}

/// Histogram state for one label set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DurationHistogram {
    /// Non-cumulative count per bucket in [`DURATION_BUCKETS`]; observations
    /// above the last bound are only reflected in `count`.
    pub buckets: [u64; DURATION_BUCKETS.len()],
    pub count: u64,
    pub sum: f64,
}

impl DurationHistogram {
    fn observe(&mut self, seconds: f64) {
        if let Some(i) = DURATION_BUCKETS.iter().position(|bound| seconds <= *bound) {
            self.buckets[i] += 1;
        }
        self.count += 1;
        self.sum += seconds;
    }
}

/// In-memory metrics sink.
#[derive(Debug, Default)]
pub struct ExperimentMetrics {
    created: DashMap<String, u64>,
    completed: DashMap<(String, Outcome), u64>,
    durations: DashMap<String, DurationHistogram>,
}

impl ExperimentMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Experiments created with this type.
    pub fn created(&self, kind: &str) -> u64 {
        self.created.get(kind).map(|v| *v).unwrap_or(0)
    }

    /// Experiments created across all types.
    pub fn created_total(&self) -> u64 {
        self.created.iter().map(|e| *e.value()).sum()
    }

    /// Experiments of this type that ended with `outcome`.
    pub fn completed(&self, kind: &str, outcome: Outcome) -> u64 {
        self.completed
            .get(&(kind.to_string(), outcome))
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// Histogram snapshot for this type (empty if never observed).
    pub fn durations(&self, kind: &str) -> DurationHistogram {
        self.durations
            .get(kind)
            .map(|h| h.value().clone())
            .unwrap_or_default()
    }

    /// Emit all current values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a suite, shutdown)
    /// rather than on every increment.
    pub fn flush(&self) {
        let completed: u64 = self.completed.iter().map(|e| *e.value()).sum();
        let observed: u64 = self.durations.iter().map(|e| e.value().count).sum();
        tracing::info!(
            metric = "flush",
            experiments_created = self.created_total(),
            experiments_completed = completed,
            durations_observed = observed,
        );
    }

    /// Render all series in the Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        let mut created: Vec<(String, u64)> = self
            .created
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        created.sort();
        out.push_str("# HELP chaos_experiments_created_total Total number of chaos experiments created\n");
        out.push_str("# TYPE chaos_experiments_created_total counter\n");
        for (kind, value) in created {
            let _ = writeln!(
                out,
                "chaos_experiments_created_total{{type=\"{}\"}} {}",
                escape_label(&kind),
                value
            );
        }

        let mut completed: Vec<(String, Outcome, u64)> = self
            .completed
            .iter()
            .map(|e| (e.key().0.clone(), e.key().1, *e.value()))
            .collect();
        completed.sort_by(|a, b| (&a.0, a.1.as_str()).cmp(&(&b.0, b.1.as_str())));
        out.push_str("# HELP chaos_experiments_completed_total Total number of chaos experiments completed\n");
        out.push_str("# TYPE chaos_experiments_completed_total counter\n");
        for (kind, outcome, value) in completed {
            let _ = writeln!(
                out,
                "chaos_experiments_completed_total{{type=\"{}\",status=\"{}\"}} {}",
                escape_label(&kind),
                outcome,
                value
            );
        }

        let mut durations: Vec<(String, DurationHistogram)> = self
            .durations
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        durations.sort_by(|a, b| a.0.cmp(&b.0));
        out.push_str("# HELP chaos_experiment_duration_seconds Duration of chaos experiments in seconds\n");
        out.push_str("# TYPE chaos_experiment_duration_seconds histogram\n");
        for (kind, histogram) in durations {
            let kind = escape_label(&kind);
            let mut cumulative = 0;
            for (bound, count) in DURATION_BUCKETS.iter().zip(histogram.buckets.iter()) {
                cumulative += count;
                let _ = writeln!(
                    out,
                    "chaos_experiment_duration_seconds_bucket{{type=\"{kind}\",le=\"{bound}\"}} {cumulative}"
                );
            }
            let _ = writeln!(
                out,
                "chaos_experiment_duration_seconds_bucket{{type=\"{kind}\",le=\"+Inf\"}} {}",
                histogram.count
            );
            let _ = writeln!(
                out,
                "chaos_experiment_duration_seconds_sum{{type=\"{kind}\"}} {}",
                histogram.sum
            );
            let _ = writeln!(
                out,
                "chaos_experiment_duration_seconds_count{{type=\"{kind}\"}} {}",
                histogram.count
            );
        }

        out
    }

    /// Reset all series (useful in tests).
    pub fn reset(&self) {
        self.created.clear();
        self.completed.clear();
        self.durations.clear();
    }
}

impl MetricsSink for ExperimentMetrics {
    fn record_created(&self, kind: &str) -> Result<(), MetricsError> {
        *self.created.entry(kind.to_string()).or_insert(0) += 1;
        tracing::trace!(metric = "experiments_created", kind = %kind, "counter incremented");
        Ok(())
    }

    fn record_completed(&self, kind: &str, outcome: Outcome) -> Result<(), MetricsError> {
        *self
            .completed
            .entry((kind.to_string(), outcome))
            .or_insert(0) += 1;
        tracing::trace!(
            metric = "experiments_completed",
            kind = %kind,
            outcome = %outcome,
            "counter incremented"
        );
        Ok(())
    }

    fn observe_duration(&self, kind: &str, seconds: f64) -> Result<(), MetricsError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(MetricsError::InvalidObservation(seconds));
        }
        self.durations
            .entry(kind.to_string())
            .or_default()
            .observe(seconds);
        Ok(())
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
