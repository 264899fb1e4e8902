//! Remote backend adapter for Pollux.
//!
//! Talks to a job service over a small JSON REST API:
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | submit | `POST {endpoint}/jobs` | `{"job_id": ...}` |
//! | status | `GET {endpoint}/jobs/{job_id}` | `{"status": ..., "error": ...}` |
//! | result | `GET {endpoint}/jobs/{job_id}/result` | `{"result": ...}` |
//! | cancel | `POST {endpoint}/jobs/{job_id}/cancel` | `{"accepted": ...}` |
//!
//! Requests carry `Authorization: Bearer <token>`. The token is taken from
//! the backend configuration or, failing that, from the environment variable
//! named by the `token_env` extra (default `POLLUX_API_KEY`).
//!
//! # Example
//!
//! ```ignore
//! use pollux_adapter_http::RemoteBackend;
//! use pollux_hal::{Backend, Parameters, WorkUnit};
//!
//! let backend = RemoteBackend::new("remote", "https://jobs.example.com/api", "token")?;
//! let work = WorkUnit::generate("2+2", Parameters::new())?;
//! let handle = backend.submit(&work).await?;
//! ```

mod api;
mod backend;
mod error;

pub use api::{
    CancelResponse, DEFAULT_TOKEN_ENV, JobResultResponse, JobStatusResponse, RemoteClient,
    SubmitRequest, SubmitResponse, map_status,
};
pub use backend::RemoteBackend;
pub use error::{HttpError, HttpResult, Operation};
