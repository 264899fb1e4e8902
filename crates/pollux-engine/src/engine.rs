//! Submit → poll → retrieve driver.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use pollux_hal::{Backend, ErrorKind, HalError, JobHandle, JobStatus, WorkUnit};

use crate::error::{EngineError, EngineResult};
use crate::outcome::{Outcome, ResultEntry};
use crate::policy::PollPolicy;
use crate::store::ResultStore;

/// How long an abandoning run waits for the backend to answer its cancel.
pub const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Drives work units from submission to a recorded [`ResultEntry`].
///
/// Each `run` owns the [`JobHandle`] it creates; the only state shared
/// between concurrent runs is the result store. Sleeping between polls is
/// an async suspension point, so any number of runs can be in flight on the
/// same runtime.
pub struct PollingEngine {
    store: Arc<dyn ResultStore>,
}

impl PollingEngine {
    /// Create an engine recording outcomes into `store`.
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    /// The store outcomes are recorded into.
    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Run a work unit to completion.
    ///
    /// Returns `Err` only when the run never got a job onto the backend
    /// (invalid policy, duplicate id, submission rejected) or when the
    /// outcome could not be recorded. Every other path, including timeout,
    /// yields an entry.
    pub async fn run(
        &self,
        work_unit: &WorkUnit,
        backend: &dyn Backend,
        policy: &PollPolicy,
    ) -> EngineResult<ResultEntry> {
        self.run_with_cancel(work_unit, backend, policy, &CancellationToken::new())
            .await
    }

    /// Run a work unit, stopping early when `cancel` fires.
    ///
    /// Caller cancellation stops polling at once, issues one best-effort
    /// backend cancel and records a `Cancelled` failure.
    #[instrument(skip_all, fields(work_unit = %work_unit.id(), backend = backend.name()))]
    pub async fn run_with_cancel(
        &self,
        work_unit: &WorkUnit,
        backend: &dyn Backend,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> EngineResult<ResultEntry> {
        policy.validate()?;

        if self.store.contains(work_unit.id()).await? {
            return Err(EngineError::DuplicateResult(work_unit.id().clone()));
        }

        let mut handle = backend.submit(work_unit).await.map_err(|e| {
            warn!("Submission rejected: {}", e);
            EngineError::from(e)
        })?;
        debug!("Submitted as job {}", handle.job_id);

        let outcome = drive(&mut handle, backend, policy, cancel).await;
        let entry = ResultEntry::new(work_unit.id().clone(), outcome);

        self.store.put(entry.clone()).await?;

        match &entry.outcome {
            Outcome::Success { .. } => info!("Job {} completed", handle.job_id),
            Outcome::Failure {
                error_kind,
                message,
            } => info!("Job {} failed ({}): {}", handle.job_id, error_kind, message),
        }

        Ok(entry)
    }

    /// Run independent work units concurrently on one backend.
    ///
    /// Results are returned in input order.
    pub async fn run_many(
        &self,
        work_units: &[WorkUnit],
        backend: &dyn Backend,
        policy: &PollPolicy,
    ) -> Vec<EngineResult<ResultEntry>> {
        join_all(
            work_units
                .iter()
                .map(|unit| self.run(unit, backend, policy)),
        )
        .await
    }
}

/// Poll a submitted job until it resolves to an outcome.
async fn drive(
    handle: &mut JobHandle,
    backend: &dyn Backend,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Outcome {
    let deadline = Instant::now() + policy.timeout;
    let mut backoff = policy.backoff();
    let mut attempts: u32 = 0;

    loop {
        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            let reason = format!("no terminal status after {attempts} status queries");
            return abandon(handle, backend, ErrorKind::PollingTimeout, reason).await;
        }

        let now = Instant::now();
        if now >= deadline {
            return timed_out(handle, backend, policy).await;
        }

        let wait = backoff.current().min(deadline - now);
        let woke = tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = sleep(wait) => true,
        };
        if !woke {
            return caller_cancelled(handle, backend).await;
        }
        if Instant::now() >= deadline {
            return timed_out(handle, backend, policy).await;
        }

        attempts += 1;
        let polled = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            res = timeout_at(deadline, backend.query_status(handle)) => Some(res),
        };

        let status = match polled {
            None => return caller_cancelled(handle, backend).await,
            Some(Err(_elapsed)) => return timed_out(handle, backend, policy).await,
            Some(Ok(Err(HalError::HandleExpired(msg)))) => {
                warn!("Handle for job {} expired: {}", handle.job_id, msg);
                return Outcome::failure(
                    ErrorKind::HandleExpired,
                    format!("backend no longer recognizes job {}: {msg}", handle.job_id),
                );
            }
            Some(Ok(Err(e))) => {
                let reason = format!("status query failed: {e}");
                return abandon(handle, backend, ErrorKind::BackendUnavailable, reason).await;
            }
            Some(Ok(Ok(status))) => status,
        };

        debug!(attempt = attempts, "Job {} is {}", handle.job_id, status);

        match status {
            JobStatus::Completed => return fetch(handle, backend).await,
            JobStatus::Failed(msg) => {
                return Outcome::failure(ErrorKind::BackendReportedFailure, msg);
            }
            JobStatus::Cancelled => {
                return Outcome::failure(ErrorKind::Cancelled, "cancelled on the backend");
            }
            JobStatus::Queued | JobStatus::Running => backoff.grow(),
        }
    }
}

async fn fetch(handle: &JobHandle, backend: &dyn Backend) -> Outcome {
    match backend.fetch_result(handle).await {
        Ok(result_payload) => Outcome::Success { result_payload },
        Err(e) => {
            warn!(
                "Job {} reported completion but its result could not be fetched: {}",
                handle.job_id, e
            );
            Outcome::failure(e.kind(), e.to_string())
        }
    }
}

async fn timed_out(handle: &JobHandle, backend: &dyn Backend, policy: &PollPolicy) -> Outcome {
    let reason = format!("no terminal status within {:?}", policy.timeout);
    abandon(handle, backend, ErrorKind::PollingTimeout, reason).await
}

async fn caller_cancelled(handle: &JobHandle, backend: &dyn Backend) -> Outcome {
    abandon(
        handle,
        backend,
        ErrorKind::Cancelled,
        "cancelled by caller".to_string(),
    )
    .await
}

/// Stop tracking a job: one best-effort backend cancel, then a failure.
///
/// The job may still finish on the backend; that is reported in the
/// message but not awaited. The cancel itself is bounded by [`CANCEL_GRACE`].
async fn abandon(
    handle: &JobHandle,
    backend: &dyn Backend,
    kind: ErrorKind,
    reason: String,
) -> Outcome {
    let note = match timeout(CANCEL_GRACE, backend.cancel(handle)).await {
        Ok(Ok(true)) => "backend accepted cancellation".to_string(),
        Ok(Ok(false)) => {
            warn!("Backend refused to cancel job {}", handle.job_id);
            "backend refused cancellation; the job may still complete".to_string()
        }
        Ok(Err(e)) => {
            warn!("Failed to cancel job {}: {}", handle.job_id, e);
            format!("cancel request failed ({e}); the job may still complete")
        }
        Err(_) => {
            warn!(
                "Cancel request for job {} got no answer within {:?}",
                handle.job_id, CANCEL_GRACE
            );
            "cancel request timed out; the job may still complete".to_string()
        }
    };

    Outcome::failure(
        kind,
        format!("{reason} (last status: {}; {note})", handle.status),
    )
}
