//! Backend trait and configuration.
//!
//! The [`Backend`] trait defines the lifecycle for running a work unit on a
//! remote or local executor:
//!
//! ```text
//!   submit() ──→ query_status() ... ──→ fetch_result()
//!    (async)        (async)              (async)
//!        └──────────→ cancel() (best effort)
//! ```
//!
//! ## Method table
//!
//! | Method | Kind | Required | Returns |
//! |--------|------|----------|---------|
//! | `name()` | sync | yes | `&str` |
//! | `kind()` | sync | yes | `BackendKind` |
//! | `submit()` | async | yes | `HalResult<JobHandle>` |
//! | `status()` | async | yes | `HalResult<JobStatus>` |
//! | `fetch_result()` | async | yes | `HalResult<Payload>` |
//! | `cancel()` | async | yes | `HalResult<bool>` |
//! | `query_status()` | async | provided | `HalResult<JobStatus>` |

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HalResult;
use crate::job::{JobHandle, JobStatus};
use crate::work::{Payload, WorkUnit};

/// Configuration for a backend instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Name of the backend.
    pub name: String,
    /// API endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Authentication token.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Additional configuration.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BackendConfig {
    /// Create a new backend configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            token: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the endpoint URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the authentication token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Add extra configuration.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Read an unsigned integer from the extra configuration.
    pub fn extra_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(serde_json::Value::as_u64)
    }

    /// Read a string from the extra configuration.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(serde_json::Value::as_str)
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("token", &"[REDACTED]")
            .field("extra", &self.extra)
            .finish()
    }
}

/// Broad class of executor behind a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Local, deterministic executor.
    Simulator,
    /// Network-bound executor with variable latency.
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Simulator => write!(f, "simulator"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

/// Trait for job execution backends.
///
/// # Contract
///
/// - `submit()` fails with `BackendUnavailable` when the target cannot take
///   work and with `InvalidWorkUnit` when backend-specific validation fails.
///   On success the handle MUST be in `Queued`.
/// - `status()` fails with `HandleExpired` once the backend has forgotten
///   the job.
/// - `fetch_result()` is only valid in `Completed`; otherwise it fails with
///   `ResultNotReady`. A purged result is `ResultUnavailable`.
/// - `cancel()` is best effort and reports whether the request was
///   accepted. The job may still complete.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Get the class of executor behind this backend.
    fn kind(&self) -> BackendKind;

    /// Submit a work unit for execution.
    async fn submit(&self, work_unit: &WorkUnit) -> HalResult<JobHandle>;

    /// Query the backend-side status of a job.
    ///
    /// Callers normally go through [`Backend::query_status`], which also
    /// records the observation on the handle.
    async fn status(&self, handle: &JobHandle) -> HalResult<JobStatus>;

    /// Get the result payload of a completed job.
    async fn fetch_result(&self, handle: &JobHandle) -> HalResult<Payload>;

    /// Request cancellation of a job.
    async fn cancel(&self, handle: &JobHandle) -> HalResult<bool>;

    /// Query the status of a job and record it on the handle.
    ///
    /// Updates `last_polled_at` and advances the handle monotonically. The
    /// returned status is the handle's status after the observation.
    async fn query_status(&self, handle: &mut JobHandle) -> HalResult<JobStatus> {
        let status = self.status(handle).await?;
        Ok(handle.observe(status).clone())
    }
}

/// Trait for creating backends from configuration.
pub trait BackendFactory: Backend + Sized {
    /// Create a backend from configuration.
    fn from_config(config: BackendConfig) -> HalResult<Self>;
}
