//! Terminal outcomes of a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pollux_hal::{ErrorKind, Payload, WorkUnitId};

/// Result of driving a work unit to a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The backend completed the job and returned its result.
    Success {
        /// Result produced by the backend.
        result_payload: Payload,
    },
    /// The job did not produce a result.
    Failure {
        /// Classified failure reason.
        error_kind: ErrorKind,
        /// Human-readable detail (backend message, timeout budget, ...).
        message: String,
    },
}

impl Outcome {
    /// Build a failure outcome.
    pub fn failure(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Outcome::Failure {
            error_kind,
            message: message.into(),
        }
    }

    /// Check if this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// The result payload, if successful.
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Outcome::Success { result_payload } => Some(result_payload),
            Outcome::Failure { .. } => None,
        }
    }

    /// The failure kind, if failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { error_kind, .. } => Some(*error_kind),
        }
    }
}

/// Write-once record of a work unit's terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Work unit the outcome belongs to.
    pub work_unit_id: WorkUnitId,
    /// Terminal outcome.
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Time the outcome was recorded.
    pub completed_at: DateTime<Utc>,
}

impl ResultEntry {
    /// Create an entry stamped with the current time.
    pub fn new(work_unit_id: WorkUnitId, outcome: Outcome) -> Self {
        Self {
            work_unit_id,
            outcome,
            completed_at: Utc::now(),
        }
    }
}
