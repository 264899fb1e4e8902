//! REST client for a remote job service.

use std::fmt;
use std::time::Duration;

use pollux_hal::{JobStatus, Parameters, Payload, WorkUnitId};
use reqwest::{Client, Response, StatusCode, Url, header};
use serde::{Deserialize, Serialize};

use crate::error::{HttpError, HttpResult, Operation};

/// Environment variable consulted for the bearer token by default.
pub const DEFAULT_TOKEN_ENV: &str = "POLLUX_API_KEY";

const USER_AGENT: &str = concat!("pollux/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the job service.
#[derive(Clone)]
pub struct RemoteClient {
    client: Client,
    endpoint: String,
    base: Url,
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("endpoint", &self.endpoint)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl RemoteClient {
    /// Create a client for `endpoint` authenticating with `token`.
    pub fn new(endpoint: impl Into<String>, token: &str) -> HttpResult<Self> {
        Self::with_timeout(endpoint, token, Duration::from_secs(60))
    }

    /// Create a client with a custom per-request timeout.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        token: &str,
        timeout: Duration,
    ) -> HttpResult<Self> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| HttpError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let base = Url::parse(&endpoint)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| HttpError::InvalidEndpoint(endpoint.clone()))?;
        Ok(Self {
            client,
            endpoint,
            base,
        })
    }

    /// Base URL requests are made against.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Endpoint URL extended by `segments`, each percent-encoded.
    fn url(&self, segments: &[&str]) -> HttpResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| HttpError::InvalidEndpoint(self.endpoint.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Submit a job.
    pub async fn submit_job(&self, request: &SubmitRequest<'_>) -> HttpResult<SubmitResponse> {
        let url = self.url(&["jobs"])?;
        let response = self.client.post(url).json(request).send().await?;
        let response = check(response, Operation::Submit).await?;
        response.json().await.map_err(HttpError::from)
    }

    /// Get job status.
    pub async fn get_job_status(&self, job_id: &str) -> HttpResult<JobStatusResponse> {
        let url = self.url(&["jobs", job_id])?;
        let response = self.client.get(url).send().await?;
        let response = check(response, Operation::Status).await?;
        response.json().await.map_err(HttpError::from)
    }

    /// Get the result of a completed job.
    pub async fn get_job_result(&self, job_id: &str) -> HttpResult<JobResultResponse> {
        let url = self.url(&["jobs", job_id, "result"])?;
        let response = self.client.get(url).send().await?;
        let response = check(response, Operation::Result).await?;
        response.json().await.map_err(HttpError::from)
    }

    /// Request cancellation of a job.
    ///
    /// A `409 Conflict` means the job already finished and is reported as
    /// not accepted.
    pub async fn cancel_job(&self, job_id: &str) -> HttpResult<CancelResponse> {
        let url = self.url(&["jobs", job_id, "cancel"])?;
        let response = self.client.post(url).send().await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(CancelResponse { accepted: false });
        }
        let response = check(response, Operation::Cancel).await?;
        response.json().await.map_err(HttpError::from)
    }
}

async fn check(response: Response, operation: Operation) -> HttpResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(err) => err.message,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("no body")
            .to_string(),
        Err(_) => body,
    };
    Err(HttpError::Api {
        operation,
        status: status.as_u16(),
        message,
    })
}

// ============================================================================
// Request types
// ============================================================================

/// Job submission body.
#[derive(Debug, Serialize)]
pub struct SubmitRequest<'a> {
    /// Caller-assigned work unit id.
    pub id: &'a WorkUnitId,
    /// Opaque payload.
    pub payload: &'a Payload,
    /// Execution parameters.
    pub parameters: &'a Parameters,
}

// ============================================================================
// Response types
// ============================================================================

/// Job submission response.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Backend-assigned job id.
    pub job_id: String,
}

/// Job status response.
#[derive(Debug, Deserialize)]
pub struct JobStatusResponse {
    /// Native status string.
    pub status: String,
    /// Failure reason, if any.
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatusResponse {
    /// Map the native status onto the job state machine.
    pub fn job_status(&self) -> HttpResult<JobStatus> {
        map_status(&self.status, self.error.as_deref())
    }
}

/// Job result response.
#[derive(Debug, Deserialize)]
pub struct JobResultResponse {
    /// Result payload.
    pub result: Payload,
}

/// Cancel response.
#[derive(Debug, Deserialize)]
pub struct CancelResponse {
    /// Whether the service accepted the request.
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(alias = "error")]
    message: String,
}

/// Map a native status string onto [`JobStatus`], case-insensitively.
///
/// `error` becomes the failure message for failed jobs.
pub fn map_status(native: &str, error: Option<&str>) -> HttpResult<JobStatus> {
    let status = match native.trim().to_ascii_lowercase().as_str() {
        "waiting" | "queued" | "pending" | "submitted" => JobStatus::Queued,
        "executing" | "running" | "finishing" | "cancelling" => JobStatus::Running,
        "succeeded" | "completed" | "done" => JobStatus::Completed,
        "failed" | "error" => JobStatus::Failed(
            error
                .filter(|msg| !msg.is_empty())
                .unwrap_or("job failed without a reason")
                .to_string(),
        ),
        "cancelled" | "canceled" => JobStatus::Cancelled,
        _ => return Err(HttpError::UnknownStatus(native.to_string())),
    };
    Ok(status)
}
