//! Experiment definition, status and lifecycle record.

use chaos_state::{ExperimentId, Outcome, ResultId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{RegistryError, Result};

/// Operator-supplied description of a chaos experiment.
///
/// The engine only interprets `type`; everything else is passed through to
/// the injection executor untouched.
///
/// ```json
/// { "name": "checkout-latency", "type": "network-latency",
///   "parameters": { "delay_ms": 250 }, "duration_ms": 60000 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Fault type discriminator (e.g. "cpu-stress"). Used as a metrics label.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Free-form executor parameters.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,

    /// Requested injection window, interpreted by the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ExperimentDefinition {
    /// Create a definition of the given fault type with no parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            name: None,
            kind: kind.into(),
            parameters: serde_json::Map::new(),
            duration_ms: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Reject definitions without a usable `type`.
    pub fn validate(&self) -> Result<()> {
        if self.kind.trim().is_empty() {
            return Err(RegistryError::InvalidDefinition(
                "experiment type must be present and non-empty".to_string(),
            ));
        }
        if self.kind.chars().any(char::is_control) {
            return Err(RegistryError::InvalidDefinition(format!(
                "experiment type contains control characters: {:?}",
                self.kind
            )));
        }
        Ok(())
    }
}

/// Lifecycle status of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl ExperimentStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExperimentStatus::Completed | ExperimentStatus::Stopped | ExperimentStatus::Failed
        )
    }

    /// Scheduled or running: admitted and not yet finished.
    pub fn is_active(&self) -> bool {
        matches!(self, ExperimentStatus::Scheduled | ExperimentStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Pending => "pending",
            ExperimentStatus::Scheduled => "scheduled",
            ExperimentStatus::Running => "running",
            ExperimentStatus::Completed => "completed",
            ExperimentStatus::Stopped => "stopped",
            ExperimentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Outcome> for ExperimentStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed => ExperimentStatus::Completed,
            Outcome::Stopped => ExperimentStatus::Stopped,
            Outcome::Failed => ExperimentStatus::Failed,
        }
    }
}

/// A single chaos run: its definition plus lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub definition: ExperimentDefinition,
    pub status: ExperimentStatus,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once, when a terminal status is reached and the result is stored.
    pub result_id: Option<ResultId>,
    /// Executor or admission failure reason for `Failed` experiments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Experiment {
    /// A freshly created, pending experiment.
    pub fn new(id: ExperimentId, definition: ExperimentDefinition, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            definition,
            status: ExperimentStatus::Pending,
            created_at,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            result_id: None,
            failure_reason: None,
        }
    }

    /// Fault type label.
    pub fn kind(&self) -> &str {
        &self.definition.kind
    }

    /// `completed_at - started_at`, when both are present.
    pub fn duration(&self) -> Option<std::time::Duration> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        (completed - started).to_std().ok()
    }

    /// Latest lifecycle timestamp recorded so far.
    pub fn last_transition_at(&self) -> DateTime<Utc> {
        self.completed_at
            .or(self.started_at)
            .or(self.scheduled_at)
            .unwrap_or(self.created_at)
    }

    /// Whether the recorded timestamps are consistent with the status and
    /// appear in non-decreasing lifecycle order.
    pub fn timeline_is_consistent(&self) -> bool {
        let stamps = [
            Some(self.created_at),
            self.scheduled_at,
            self.started_at,
            self.completed_at,
        ];
        let present: Vec<DateTime<Utc>> = stamps.iter().flatten().copied().collect();
        let ordered = present.windows(2).all(|w| w[0] <= w[1]);

        let status_allows = match self.status {
            ExperimentStatus::Pending => {
                self.scheduled_at.is_none() && self.started_at.is_none() && self.completed_at.is_none()
            }
            ExperimentStatus::Scheduled => {
                self.scheduled_at.is_some() && self.started_at.is_none() && self.completed_at.is_none()
            }
            ExperimentStatus::Running => self.started_at.is_some() && self.completed_at.is_none(),
            _ => self.completed_at.is_some(),
        };

        ordered && status_allows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_parses_type_field() {
        let def: ExperimentDefinition = serde_json::from_value(json!({
            "name": "checkout-latency",
            "type": "network-latency",
            "parameters": {"delay_ms": 250},
            "duration_ms": 60000
        }))
        .expect("parse definition");

        assert_eq!(def.kind, "network-latency");
        assert_eq!(def.name.as_deref(), Some("checkout-latency"));
        assert_eq!(def.parameters["delay_ms"], json!(250));
        assert_eq!(def.duration_ms, Some(60_000));
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_missing_type_is_invalid() {
        let def: ExperimentDefinition =
            serde_json::from_value(json!({"parameters": {"cpu": 2}})).expect("parse");
        let err = def.validate().unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDefinition(_)));

        let blank = ExperimentDefinition::new("   ");
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ExperimentStatus::Pending.is_terminal());
        assert!(!ExperimentStatus::Scheduled.is_terminal());
        assert!(!ExperimentStatus::Running.is_terminal());
        assert!(ExperimentStatus::Completed.is_terminal());
        assert!(ExperimentStatus::Stopped.is_terminal());
        assert!(ExperimentStatus::Failed.is_terminal());
        assert_eq!(ExperimentStatus::from(Outcome::Stopped), ExperimentStatus::Stopped);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ExperimentStatus::Scheduled).unwrap(),
            "\"scheduled\""
        );
    }

    #[test]
    fn test_duration_requires_start() {
        let now = Utc::now();
        let mut exp = Experiment::new(ExperimentId::new(), ExperimentDefinition::new("io"), now);
        exp.completed_at = Some(now + chrono::Duration::seconds(5));
        assert_eq!(exp.duration(), None);

        exp.started_at = Some(now + chrono::Duration::seconds(1));
        assert_eq!(exp.duration(), Some(std::time::Duration::from_secs(4)));
    }

    #[test]
    fn test_timeline_consistency() {
        let now = Utc::now();
        let mut exp = Experiment::new(ExperimentId::new(), ExperimentDefinition::new("io"), now);
        assert!(exp.timeline_is_consistent());

        // A start stamp without the matching status is inconsistent.
        exp.started_at = Some(now);
        assert!(!exp.timeline_is_consistent());

        exp.status = ExperimentStatus::Running;
        exp.scheduled_at = Some(now + chrono::Duration::seconds(1));
        // scheduled after started
        assert!(!exp.timeline_is_consistent());
    }
}
