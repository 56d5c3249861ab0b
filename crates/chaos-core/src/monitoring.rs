//! Monitoring integration contract.
//!
//! Result metrics (error rate, latency, availability) describe the target
//! system while the fault was active. They come from an external monitoring
//! system; the engine never invents them. When no source is configured, or
//! the source fails, the result carries no metrics.

use async_trait::async_trait;
use chaos_state::ResultMetrics;

use crate::domain::Experiment;

/// Errors reported by a monitoring source.
#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("monitoring source unavailable: {0}")]
    Unavailable(String),

    #[error("monitoring query failed: {0}")]
    Query(String),
}

/// Supplies outcome metrics for a finished experiment.
#[async_trait]
pub trait MonitoringSource: Send + Sync {
    /// Collect metrics covering the experiment's run window. `completed_at`
    /// is set when called; `started_at` is absent if the experiment never ran.
    async fn collect(&self, experiment: &Experiment) -> Result<ResultMetrics, MonitoringError>;
}
