//! Remote backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use pollux_hal::{
    Backend, BackendConfig, BackendFactory, BackendKind, HalError, HalResult, JobHandle,
    JobStatus, Payload, WorkUnit,
};
use tracing::{debug, instrument, warn};

use crate::api::{DEFAULT_TOKEN_ENV, RemoteClient, SubmitRequest};
use crate::error::{HttpError, HttpResult};

/// Backend that runs work units on a remote job service.
#[derive(Debug)]
pub struct RemoteBackend {
    name: String,
    client: RemoteClient,
}

impl RemoteBackend {
    /// Create a backend for `endpoint` with an explicit token.
    pub fn new(name: impl Into<String>, endpoint: &str, token: &str) -> HttpResult<Self> {
        Ok(Self {
            name: name.into(),
            client: RemoteClient::new(endpoint, token)?,
        })
    }

    /// Create a backend from configuration.
    ///
    /// Recognized extras: `token_env` (variable holding the token when
    /// `config.token` is unset) and `request_timeout_ms`.
    pub fn with_config(config: &BackendConfig) -> HttpResult<Self> {
        Self::with_config_and_env(config, |var| std::env::var(var).ok())
    }

    fn with_config_and_env(
        config: &BackendConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> HttpResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| HttpError::MissingEndpoint(config.name.clone()))?;

        let token_env = config.extra_str("token_env").unwrap_or(DEFAULT_TOKEN_ENV);
        let token = match &config.token {
            Some(token) => token.clone(),
            None => env(token_env).ok_or_else(|| HttpError::MissingToken(token_env.to_string()))?,
        };

        let client = match config.extra_u64("request_timeout_ms") {
            Some(ms) => RemoteClient::with_timeout(endpoint, &token, Duration::from_millis(ms))?,
            None => RemoteClient::new(endpoint, &token)?,
        };

        Ok(Self {
            name: config.name.clone(),
            client,
        })
    }

    /// Base URL of the job service.
    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    #[instrument(skip(self, work_unit), fields(work_unit = %work_unit.id()))]
    async fn submit(&self, work_unit: &WorkUnit) -> HalResult<JobHandle> {
        let request = SubmitRequest {
            id: work_unit.id(),
            payload: work_unit.payload(),
            parameters: work_unit.parameters(),
        };
        let response = self.client.submit_job(&request).await?;
        debug!(
            "Work unit {} accepted by {} as job {}",
            work_unit.id(),
            self.client.endpoint(),
            response.job_id
        );

        Ok(JobHandle::new(
            work_unit.id().clone(),
            response.job_id,
            self.name.clone(),
        ))
    }

    #[instrument(skip(self, handle), fields(job = %handle.job_id))]
    async fn status(&self, handle: &JobHandle) -> HalResult<JobStatus> {
        let response = self.client.get_job_status(&handle.job_id.0).await?;
        Ok(response.job_status()?)
    }

    #[instrument(skip(self, handle), fields(job = %handle.job_id))]
    async fn fetch_result(&self, handle: &JobHandle) -> HalResult<Payload> {
        let response = self.client.get_job_result(&handle.job_id.0).await?;
        Ok(response.result)
    }

    #[instrument(skip(self, handle), fields(job = %handle.job_id))]
    async fn cancel(&self, handle: &JobHandle) -> HalResult<bool> {
        let response = self.client.cancel_job(&handle.job_id.0).await?;
        if !response.accepted {
            warn!("Job service declined to cancel job {}", handle.job_id);
        }
        Ok(response.accepted)
    }
}

impl BackendFactory for RemoteBackend {
    fn from_config(config: BackendConfig) -> HalResult<Self> {
        Self::with_config(&config).map_err(HalError::from)
    }
}
