//! Chaos Core Library
//!
//! The experiment lifecycle engine of the chaos control plane: experiment
//! definitions and state machine, the concurrent registry that drives them,
//! lifecycle metrics, and the suite runner built on top.

pub mod admission;
pub mod clock;
pub mod config;
pub mod domain;
pub mod executor;
pub mod fakes;
pub mod metrics;
pub mod monitoring;
pub mod obs;
pub mod registry;
pub mod reporting;
pub mod suite;
pub mod telemetry;

pub use admission::{AdmissionContext, AdmissionDecision, AdmissionPolicy, AdmitAll, MaxActive};
pub use clock::{Clock, IdGenerator, RandomIds, SystemClock};
pub use config::{ConfigError, RegistryConfig};
pub use domain::{Experiment, ExperimentDefinition, ExperimentStatus, RegistryError, Result};
pub use executor::{InjectionExecutor, InjectionOutcome, TimedExecutor, FAIL_WITH_PARAM};
pub use metrics::{DurationHistogram, ExperimentMetrics, MetricsError, MetricsSink, DURATION_BUCKETS};
pub use monitoring::{MonitoringError, MonitoringSource};
pub use registry::{ExperimentRegistry, RegistryBuilder};
pub use reporting::{render_suite_report_md, write_suite_report_json, write_suite_report_md};
pub use suite::{
    load_definitions, run_suite, SuiteEntry, SuiteError, SuiteOptions, SuiteReport, SuiteRun,
};

pub use chaos_state::{
    ExperimentId, ExperimentResult, MemoryResultStore, Outcome, ResultId, ResultMetrics,
    ResultStore, RetentionPolicy, RetentionReport, StorageError,
};

pub use obs::{
    emit_experiment_created, emit_experiment_finished, emit_experiment_started, experiment_span,
    ExperimentSpan,
};
pub use telemetry::init_tracing;

/// Chaos control plane version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
