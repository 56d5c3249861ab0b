//! Admission control, evaluated when an experiment's scheduling delay ends.
//!
//! A rejected experiment never becomes `Scheduled`; it is failed with the
//! rejection reason instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::Experiment;

/// Registry-wide load at the moment of the admission check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionContext {
    /// Scheduled or running experiments, all types.
    pub active_total: usize,
    /// Scheduled or running experiments of the candidate's type.
    pub active_of_kind: usize,
}

/// Verdict of an admission policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AdmissionDecision {
    Admit,
    Reject { reason: String },
}

/// Decides whether a pending experiment may be scheduled.
#[async_trait]
pub trait AdmissionPolicy: Send + Sync {
    async fn admit(&self, experiment: &Experiment, context: &AdmissionContext)
        -> AdmissionDecision;
}

/// Admits everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdmitAll;

#[async_trait]
impl AdmissionPolicy for AdmitAll {
    async fn admit(&self, _experiment: &Experiment, _context: &AdmissionContext) -> AdmissionDecision {
        AdmissionDecision::Admit
    }
}

/// Caps concurrently active experiments, per type and overall.
///
/// The counts are a snapshot; two promotions firing at the same instant may
/// both observe room for one more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxActive {
    pub per_kind: Option<usize>,
    pub total: Option<usize>,
}

#[async_trait]
impl AdmissionPolicy for MaxActive {
    async fn admit(&self, experiment: &Experiment, context: &AdmissionContext) -> AdmissionDecision {
        if let Some(limit) = self.per_kind {
            if context.active_of_kind >= limit {
                return AdmissionDecision::Reject {
                    reason: format!(
                        "{} active {} experiment(s), limit is {}",
                        context.active_of_kind,
                        experiment.kind(),
                        limit
                    ),
                };
            }
        }
        if let Some(limit) = self.total {
            if context.active_total >= limit {
                return AdmissionDecision::Reject {
                    reason: format!(
                        "{} active experiment(s), limit is {}",
                        context.active_total, limit
                    ),
                };
            }
        }
        AdmissionDecision::Admit
    }
}
