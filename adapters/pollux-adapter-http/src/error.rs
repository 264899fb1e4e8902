//! Error types for the remote backend adapter.

use std::fmt;

use pollux_hal::HalError;
use thiserror::Error;

/// Result type for remote backend operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// REST operation that produced an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `POST /jobs`
    Submit,
    /// `GET /jobs/{id}`
    Status,
    /// `GET /jobs/{id}/result`
    Result,
    /// `POST /jobs/{id}/cancel`
    Cancel,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Submit => write!(f, "submit"),
            Operation::Status => write!(f, "status"),
            Operation::Result => write!(f, "result"),
            Operation::Cancel => write!(f, "cancel"),
        }
    }
}

/// Errors that can occur when talking to a remote job service.
#[derive(Debug, Error)]
pub enum HttpError {
    /// No API token configured.
    #[error("API token not found. Set the {0} environment variable.")]
    MissingToken(String),

    /// Token cannot be sent as a header value.
    #[error("Invalid API token")]
    InvalidToken,

    /// No endpoint configured.
    #[error("No endpoint configured for remote backend {0}")]
    MissingEndpoint(String),

    /// Endpoint is not an absolute http(s)-style URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Service answered with a non-success status code.
    #[error("{operation} request returned {status}: {message}")]
    Api {
        /// Operation that was attempted.
        operation: Operation,
        /// HTTP status code.
        status: u16,
        /// Error body, or the canonical reason if the body was empty.
        message: String,
    },

    /// Service reported a status outside the known vocabulary.
    #[error("Unrecognized job status: {0}")]
    UnknownStatus(String),
}

impl From<HttpError> for HalError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::MissingToken(_)
            | HttpError::InvalidToken
            | HttpError::MissingEndpoint(_)
            | HttpError::InvalidEndpoint(_) => HalError::Configuration(e.to_string()),
            HttpError::Request(err) if err.is_connect() || err.is_timeout() => {
                HalError::BackendUnavailable(err.to_string())
            }
            HttpError::Request(err) => HalError::Network(err),
            HttpError::Api {
                operation, status, ..
            } => {
                let msg = e.to_string();
                match (operation, status) {
                    (_, 401 | 403 | 500..=599) => HalError::BackendUnavailable(msg),
                    (Operation::Submit, 400 | 413 | 422) => HalError::InvalidWorkUnit(msg),
                    (Operation::Status | Operation::Cancel, 404 | 410) => {
                        HalError::HandleExpired(msg)
                    }
                    (Operation::Result, 404 | 410) => HalError::ResultUnavailable(msg),
                    (Operation::Result, 409 | 425) => HalError::ResultNotReady(msg),
                    _ => HalError::Backend(msg),
                }
            }
            HttpError::UnknownStatus(_) => HalError::Backend(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(operation: Operation, status: u16) -> HalError {
        HttpError::Api {
            operation,
            status,
            message: "nope".into(),
        }
        .into()
    }

    #[test]
    fn test_missing_token_display() {
        let err = HttpError::MissingToken("POLLUX_API_KEY".into());
        assert!(err.to_string().contains("POLLUX_API_KEY"));
    }

    #[test]
    fn test_api_error_display() {
        let err = HttpError::Api {
            operation: Operation::Result,
            status: 409,
            message: "job still running".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("result"));
        assert!(msg.contains("409"));
        assert!(msg.contains("job still running"));
    }

    #[test]
    fn test_config_errors_to_hal() {
        let hal: HalError = HttpError::MissingToken("X".into()).into();
        assert!(matches!(hal, HalError::Configuration(_)));
        let hal: HalError = HttpError::MissingEndpoint("remote".into()).into();
        assert!(matches!(hal, HalError::Configuration(_)));
        let hal: HalError = HttpError::InvalidEndpoint("jobs".into()).into();
        assert!(matches!(hal, HalError::Configuration(_)));
    }

    #[test]
    fn test_auth_and_server_errors_are_unavailable() {
        for op in [Operation::Submit, Operation::Status, Operation::Result] {
            for status in [401, 403, 500, 502, 503] {
                assert!(matches!(api(op, status), HalError::BackendUnavailable(_)));
            }
        }
    }

    #[test]
    fn test_submit_rejections_are_invalid_work() {
        for status in [400, 413, 422] {
            assert!(matches!(
                api(Operation::Submit, status),
                HalError::InvalidWorkUnit(_)
            ));
        }
    }

    #[test]
    fn test_missing_job_depends_on_operation() {
        assert!(matches!(
            api(Operation::Status, 404),
            HalError::HandleExpired(_)
        ));
        assert!(matches!(
            api(Operation::Status, 410),
            HalError::HandleExpired(_)
        ));
        assert!(matches!(
            api(Operation::Result, 404),
            HalError::ResultUnavailable(_)
        ));
        assert!(matches!(
            api(Operation::Result, 410),
            HalError::ResultUnavailable(_)
        ));
    }

    #[test]
    fn test_result_conflict_is_not_ready() {
        assert!(matches!(
            api(Operation::Result, 409),
            HalError::ResultNotReady(_)
        ));
        assert!(matches!(
            api(Operation::Result, 425),
            HalError::ResultNotReady(_)
        ));
    }

    #[test]
    fn test_other_statuses_are_backend_errors() {
        assert!(matches!(api(Operation::Status, 400), HalError::Backend(_)));
        assert!(matches!(api(Operation::Submit, 404), HalError::Backend(_)));
    }

    #[test]
    fn test_unknown_status_to_hal_backend() {
        let hal: HalError = HttpError::UnknownStatus("SLEEPING".into()).into();
        assert!(matches!(hal, HalError::Backend(msg) if msg.contains("SLEEPING")));
    }
}
