//! Storage trait definitions for the chaos control plane
//!
//! - `ExperimentId` / `ResultId`: opaque identifiers shared by every layer
//! - `ExperimentResult`: the durable record of a terminated experiment
//! - `ResultStore`: append-only result persistence (put/get/list)
//!
//! The trait is async and backend-agnostic. An in-memory implementation is
//! provided in the `memory` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(pub Uuid);

impl ExperimentId {
    /// Generate a new random ExperimentId
    pub fn new() -> Self {
        ExperimentId(Uuid::new_v4())
    }
}

impl Default for ExperimentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ExperimentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ExperimentId)
    }
}

/// Unique identifier of a result record. Never shares a value with the
/// experiment it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultId(pub Uuid);

impl ResultId {
    /// Generate a new random ResultId
    pub fn new() -> Self {
        ResultId(Uuid::new_v4())
    }
}

impl Default for ResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ResultId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ResultId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ResultId)
    }
}

// ---------------------------------------------------------------------------
// Result record
// ---------------------------------------------------------------------------

/// Terminal outcome of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Stopped,
    Failed,
}

impl Outcome {
    /// Lowercase label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Stopped => "stopped",
            Outcome::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of the target system observed over an experiment, as reported by
/// a monitoring integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultMetrics {
    /// Error rate in percent
    pub error_rate: f64,
    /// Latency in milliseconds
    pub latency_ms: f64,
    /// Availability in percent
    pub availability: f64,
}

/// Immutable record of a terminated experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub id: ResultId,
    /// Back-reference for lookup; the result does not own the experiment.
    pub experiment_id: ExperimentId,
    pub outcome: Outcome,
    /// Failure reason for `Failed` outcomes
    pub reason: Option<String>,
    /// `None` when no monitoring source was available
    pub metrics: Option<ResultMetrics>,
    /// Copy of the experiment's completion timestamp
    pub completed_at: DateTime<Utc>,
}

/// Append-only result store.
///
/// Guarantees:
/// - `put` never overwrites; a second `put` with a known id fails with
///   `StorageError::DuplicateResult`.
/// - `get` returns the exact record previously stored.
/// - `list_by_experiment` and `list` preserve insertion order.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Store a result and return its id.
    async fn put(&self, result: ExperimentResult) -> StorageResult<ResultId>;

    /// Retrieve a result by id. Returns `StorageError::NotFound` if absent.
    async fn get(&self, result_id: &ResultId) -> StorageResult<ExperimentResult>;

    /// All results recorded for one experiment (empty if none).
    async fn list_by_experiment(
        &self,
        experiment_id: &ExperimentId,
    ) -> StorageResult<Vec<ExperimentResult>>;

    /// Every stored result.
    async fn list(&self) -> StorageResult<Vec<ExperimentResult>>;
}
