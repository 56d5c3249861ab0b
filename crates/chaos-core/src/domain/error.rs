//! Error taxonomy for the experiment lifecycle engine.

use chaos_state::{ExperimentId, ResultId, StorageError};

use super::experiment::ExperimentStatus;

/// Errors returned by [`ExperimentRegistry`](crate::ExperimentRegistry)
/// operations.
///
/// Executor failures are not represented here: they become the terminal
/// status `Failed` of the experiment, never a call-time error.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid experiment definition: {0}")]
    InvalidDefinition(String),

    #[error("experiment not found: {0}")]
    NotFound(ExperimentId),

    #[error("result not found: {0}")]
    ResultNotFound(ResultId),

    #[error("cannot {operation} experiment {id}: current status is {current}")]
    InvalidTransition {
        id: ExperimentId,
        operation: &'static str,
        current: ExperimentStatus,
    },

    /// Indicates a bug (id collision, corrupted lifecycle state).
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RegistryError {
    /// The status the experiment was in when a transition was refused.
    pub fn current_status(&self) -> Option<ExperimentStatus> {
        match self {
            RegistryError::InvalidTransition { current, .. } => Some(*current),
            _ => None,
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
