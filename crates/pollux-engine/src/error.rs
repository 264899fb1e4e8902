//! Error handling for the polling engine.

use pollux_hal::{ErrorKind, HalError, WorkUnitId};
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the engine and result stores.
///
/// Expected operating conditions (timeouts, cancellation, backend-reported
/// failures) are not errors; they are recorded as failure outcomes.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Work unit was rejected at submission.
    #[error("Invalid work unit: {0}")]
    InvalidWorkUnit(String),

    /// Backend could not accept the submission.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// A result is already recorded for this work unit.
    #[error("Duplicate result for work unit {0}")]
    DuplicateResult(WorkUnitId),

    /// No result is recorded for this work unit.
    #[error("No result for work unit {0}")]
    NotFound(WorkUnitId),

    /// Polling policy is not usable.
    #[error("Invalid polling policy: {0}")]
    InvalidPolicy(String),

    /// Persistence error.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classified by [`HalError::kind`], so submission errors land on the same
/// side as they would in a recorded outcome.
impl From<HalError> for EngineError {
    fn from(e: HalError) -> Self {
        match (e.kind(), e) {
            (_, HalError::InvalidWorkUnit(msg) | HalError::Unsupported(msg)) => {
                EngineError::InvalidWorkUnit(msg)
            }
            (ErrorKind::InvalidWorkUnit, other) => EngineError::InvalidWorkUnit(other.to_string()),
            (_, other) => EngineError::BackendUnavailable(other.to_string()),
        }
    }
}
