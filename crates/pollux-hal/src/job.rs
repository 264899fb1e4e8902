//! Job lifecycle types.
//!
//! The job state machine:
//!
//! ```text
//!   submit() ──→ Queued ──→ Running ──→ Completed
//!                  │           │
//!                  │           ├──→ Failed(reason)
//!                  │           │
//!                  └───────────┴──→ Cancelled
//! ```
//!
//! **Invariants:**
//! - `submit()` MUST return a handle in `Queued`.
//! - Transitions are monotonic — a job never moves backward.
//! - Terminal states (`Completed`, `Failed`, `Cancelled`) are permanent.
//! - `fetch_result()` is only valid when status is `Completed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::work::WorkUnitId;

/// Backend-native identifier of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Job is waiting in queue.
    Queued,
    /// Job is currently running.
    Running,
    /// Job completed successfully.
    Completed,
    /// Job failed with a backend-supplied message.
    Failed(String),
    /// Job was cancelled.
    Cancelled,
}

impl JobStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed(_) | JobStatus::Cancelled
        )
    }

    /// Check if the job completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }

    /// Position in the total order of the state machine.
    ///
    /// All terminal states share the highest rank.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed(_) | JobStatus::Cancelled => 2,
        }
    }

    /// Short name without the failure message.
    pub fn name(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::Running => "Running",
            JobStatus::Completed => "Completed",
            JobStatus::Failed(_) => "Failed",
            JobStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Failed(msg) => write!(f, "Failed: {msg}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Reference to a job submitted to a backend.
///
/// Created by `Backend::submit` and mutated only by the polling loop that
/// owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Work unit this job executes.
    pub work_unit_id: WorkUnitId,
    /// Backend-native job identifier.
    pub job_id: JobId,
    /// Name of the backend the job was submitted to.
    pub backend_name: String,
    /// Time the backend accepted the job.
    pub submitted_at: DateTime<Utc>,
    /// Last observed status.
    pub status: JobStatus,
    /// Time of the last status query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl JobHandle {
    /// Create a freshly submitted handle in `Queued`.
    pub fn new(
        work_unit_id: WorkUnitId,
        job_id: impl Into<JobId>,
        backend_name: impl Into<String>,
    ) -> Self {
        Self {
            work_unit_id,
            job_id: job_id.into(),
            backend_name: backend_name.into(),
            submitted_at: Utc::now(),
            status: JobStatus::Queued,
            last_polled_at: None,
        }
    }

    /// Record a status observation.
    ///
    /// The poll time is always updated. The status only moves forward:
    /// regressions and anything after a terminal state are ignored, so the
    /// handle never reports statuses out of order. Returns the status the
    /// handle holds afterwards.
    pub fn observe(&mut self, status: JobStatus) -> &JobStatus {
        self.last_polled_at = Some(Utc::now());

        if self.status.is_terminal() {
            if status != self.status {
                warn!(
                    "Ignoring status {} for job {}: already terminal ({})",
                    status, self.job_id, self.status
                );
            }
        } else if status.rank() < self.status.rank() {
            warn!(
                "Ignoring backward transition {} -> {} for job {}",
                self.status, status, self.job_id
            );
        } else {
            self.status = status;
        }

        &self.status
    }

    /// Check if the handle has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
