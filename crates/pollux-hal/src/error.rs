//! Error types for the HAL crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in HAL operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Backend cannot currently accept or serve work.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// Work unit failed validation.
    #[error("Invalid work unit: {0}")]
    InvalidWorkUnit(String),

    /// Backend no longer recognizes the job handle.
    #[error("Job handle expired: {0}")]
    HandleExpired(String),

    /// Result requested before the job completed.
    #[error("Result not ready for job {0}")]
    ResultNotReady(String),

    /// Backend reported completion but no longer holds the result.
    #[error("Result unavailable for job {0}")]
    ResultUnavailable(String),

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unsupported feature.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Generic backend error.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl HalError {
    /// Classify this error into the outcome taxonomy.
    ///
    /// Transport and unclassified backend errors are reported as
    /// [`ErrorKind::BackendUnavailable`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            HalError::InvalidWorkUnit(_)
            | HalError::Unsupported(_)
            | HalError::Serialization(_) => ErrorKind::InvalidWorkUnit,
            HalError::HandleExpired(_) => ErrorKind::HandleExpired,
            HalError::ResultNotReady(_) => ErrorKind::ResultNotReady,
            HalError::ResultUnavailable(_) => ErrorKind::ResultUnavailable,
            HalError::BackendUnavailable(_)
            | HalError::Network(_)
            | HalError::Configuration(_)
            | HalError::Backend(_) => ErrorKind::BackendUnavailable,
        }
    }
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;

/// Closed taxonomy of failure kinds recorded in job outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Target could not accept or serve work.
    BackendUnavailable,
    /// Payload or parameters were rejected.
    InvalidWorkUnit,
    /// Backend discarded the job's state.
    HandleExpired,
    /// Result was requested too early.
    ResultNotReady,
    /// Job completed but its result was lost.
    ResultUnavailable,
    /// Polling budget ran out before a terminal status.
    PollingTimeout,
    /// Backend reported the job as failed.
    BackendReportedFailure,
    /// Job was cancelled by the caller or the backend.
    Cancelled,
    /// A result was already recorded for the work unit.
    DuplicateResult,
    /// No result is recorded for the work unit.
    NotFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::BackendUnavailable => "BackendUnavailable",
            ErrorKind::InvalidWorkUnit => "InvalidWorkUnit",
            ErrorKind::HandleExpired => "HandleExpired",
            ErrorKind::ResultNotReady => "ResultNotReady",
            ErrorKind::ResultUnavailable => "ResultUnavailable",
            ErrorKind::PollingTimeout => "PollingTimeout",
            ErrorKind::BackendReportedFailure => "BackendReportedFailure",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::DuplicateResult => "DuplicateResult",
            ErrorKind::NotFound => "NotFound",
        };
        f.write_str(name)
    }
}
