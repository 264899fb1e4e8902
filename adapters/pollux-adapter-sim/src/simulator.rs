//! Simulator backend implementation.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};
use uuid::Uuid;

use pollux_hal::{
    Backend, BackendConfig, BackendFactory, BackendKind, HalError, HalResult, JobHandle,
    JobStatus, Payload, WorkUnit,
};

/// Default cap on the encoded payload size.
const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// How submitted jobs progress.
#[derive(Debug, Clone)]
enum Script {
    /// One status per query; the last one repeats.
    Statuses(Vec<JobStatus>),
    /// `Running` until the delay since submission has passed.
    After(Duration),
}

/// Why the simulator refuses a submission.
#[derive(Debug, Clone)]
pub enum Rejection {
    /// Backend cannot accept work (`BackendUnavailable`).
    Unavailable(String),
    /// Work unit fails validation (`InvalidWorkUnit`).
    Invalid(String),
}

/// Snapshot of how often each backend operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `submit` calls.
    pub submits: usize,
    /// `status` calls.
    pub status_queries: usize,
    /// `fetch_result` calls.
    pub fetches: usize,
    /// `cancel` calls.
    pub cancels: usize,
}

#[derive(Debug, Default)]
struct Counters {
    submits: AtomicUsize,
    status_queries: AtomicUsize,
    fetches: AtomicUsize,
    cancels: AtomicUsize,
}

/// Job data for the simulator.
struct SimJob {
    status: JobStatus,
    polls: usize,
    submitted: Instant,
    result: Option<Payload>,
}

/// Local simulated backend.
///
/// Jobs never leave the process; their progression is driven entirely by
/// the configured script and faults.
pub struct SimulatorBackend {
    /// Backend configuration.
    config: BackendConfig,
    script: Script,
    /// Canned result; the submitted payload is echoed when unset.
    result: Option<Payload>,
    rejection: Option<Rejection>,
    failure: Option<String>,
    purge_results: bool,
    expire_after_polls: Option<usize>,
    refuse_cancel: bool,
    max_payload_bytes: usize,
    /// Active jobs.
    jobs: Arc<Mutex<FxHashMap<String, SimJob>>>,
    counters: Arc<Counters>,
}

impl SimulatorBackend {
    /// Create a simulator that completes on the first poll and echoes the
    /// submitted payload.
    pub fn new() -> Self {
        Self::with_script(BackendConfig::new("simulator"), Script::Statuses(vec![]))
    }

    /// Complete after exactly `polls` non-terminal status queries.
    ///
    /// The job reports `Queued` once, then `Running`, then `Completed` on
    /// query `polls + 1`.
    pub fn completing_after(polls: usize, result: impl Into<Payload>) -> Self {
        Self::with_statuses(statuses_completing_after(polls)).with_result(result)
    }

    /// Report the given statuses on successive queries; the last repeats.
    pub fn with_statuses(statuses: Vec<JobStatus>) -> Self {
        Self::with_script(BackendConfig::new("simulator"), Script::Statuses(statuses))
    }

    /// Stay `Running` until `delay` has passed since submission.
    pub fn with_delay(delay: Duration) -> Self {
        Self::with_script(BackendConfig::new("simulator"), Script::After(delay))
    }

    fn with_script(config: BackendConfig, script: Script) -> Self {
        Self {
            config,
            script,
            result: None,
            rejection: None,
            failure: None,
            purge_results: false,
            expire_after_polls: None,
            refuse_cancel: false,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            jobs: Arc::new(Mutex::new(FxHashMap::default())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Return a canned result instead of echoing the payload.
    pub fn with_result(mut self, result: impl Into<Payload>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Refuse every submission.
    pub fn rejecting(mut self, rejection: Rejection) -> Self {
        self.rejection = Some(rejection);
        self
    }

    /// Report `Failed(message)` where the script would complete.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Report completion but lose every result.
    pub fn purging_results(mut self) -> Self {
        self.purge_results = true;
        self
    }

    /// Forget a job after it has answered `polls` status queries.
    pub fn expiring_after(mut self, polls: usize) -> Self {
        self.expire_after_polls = Some(polls);
        self
    }

    /// Answer every cancellation request with `false`.
    pub fn refusing_cancel(mut self) -> Self {
        self.refuse_cancel = true;
        self
    }

    /// Reject payloads whose encoded size exceeds `bytes`.
    pub fn with_max_payload_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    /// Rename the backend.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// How often each operation has been invoked so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            submits: self.counters.submits.load(Ordering::SeqCst),
            status_queries: self.counters.status_queries.load(Ordering::SeqCst),
            fetches: self.counters.fetches.load(Ordering::SeqCst),
            cancels: self.counters.cancels.load(Ordering::SeqCst),
        }
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, FxHashMap<String, SimJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Status the script dictates for a job's `polls`-th query.
    fn scripted_status(&self, job: &SimJob) -> JobStatus {
        let status = match &self.script {
            Script::Statuses(statuses) => statuses
                .get(job.polls.saturating_sub(1))
                .or_else(|| statuses.last())
                .cloned()
                .unwrap_or(JobStatus::Completed),
            Script::After(delay) => {
                if job.submitted.elapsed() >= *delay {
                    JobStatus::Completed
                } else {
                    JobStatus::Running
                }
            }
        };

        match (&status, &self.failure) {
            (JobStatus::Completed, Some(message)) => JobStatus::Failed(message.clone()),
            _ => status,
        }
    }
}

/// `Queued` once, `Running` until `polls` queries have passed, then `Completed`.
fn statuses_completing_after(polls: usize) -> Vec<JobStatus> {
    let mut statuses = Vec::with_capacity(polls + 1);
    if polls > 0 {
        statuses.push(JobStatus::Queued);
        statuses.extend(std::iter::repeat_n(JobStatus::Running, polls - 1));
    }
    statuses.push(JobStatus::Completed);
    statuses
}

impl Default for SimulatorBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for SimulatorBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Simulator
    }

    #[instrument(skip(self, work_unit), fields(work_unit = %work_unit.id()))]
    async fn submit(&self, work_unit: &WorkUnit) -> HalResult<JobHandle> {
        self.counters.submits.fetch_add(1, Ordering::SeqCst);

        match &self.rejection {
            Some(Rejection::Unavailable(msg)) => {
                return Err(HalError::BackendUnavailable(msg.clone()));
            }
            Some(Rejection::Invalid(msg)) => return Err(HalError::InvalidWorkUnit(msg.clone())),
            None => {}
        }

        let size = work_unit.payload().encoded_len();
        if size > self.max_payload_bytes {
            return Err(HalError::InvalidWorkUnit(format!(
                "Payload is {} bytes but simulator only accepts {}",
                size, self.max_payload_bytes
            )));
        }

        let job_id = Uuid::new_v4().to_string();
        let result = if self.purge_results {
            None
        } else {
            Some(
                self.result
                    .clone()
                    .unwrap_or_else(|| work_unit.payload().clone()),
            )
        };

        self.lock_jobs().insert(
            job_id.clone(),
            SimJob {
                status: JobStatus::Queued,
                polls: 0,
                submitted: Instant::now(),
                result,
            },
        );

        debug!("Submitted job: {}", job_id);

        Ok(JobHandle::new(
            work_unit.id().clone(),
            job_id,
            self.config.name.clone(),
        ))
    }

    async fn status(&self, handle: &JobHandle) -> HalResult<JobStatus> {
        self.counters.status_queries.fetch_add(1, Ordering::SeqCst);

        let mut jobs = self.lock_jobs();
        let job = jobs
            .get_mut(&handle.job_id.0)
            .ok_or_else(|| HalError::HandleExpired(handle.job_id.0.clone()))?;

        job.polls += 1;
        if self.expire_after_polls.is_some_and(|limit| job.polls > limit) {
            jobs.remove(&handle.job_id.0);
            debug!("Expired job: {}", handle.job_id);
            return Err(HalError::HandleExpired(handle.job_id.0.clone()));
        }

        if !job.status.is_terminal() {
            job.status = self.scripted_status(job);
        }
        Ok(job.status.clone())
    }

    async fn fetch_result(&self, handle: &JobHandle) -> HalResult<Payload> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);

        let jobs = self.lock_jobs();
        let job = jobs
            .get(&handle.job_id.0)
            .ok_or_else(|| HalError::ResultUnavailable(handle.job_id.0.clone()))?;

        if !job.status.is_success() {
            return Err(HalError::ResultNotReady(handle.job_id.0.clone()));
        }
        job.result
            .clone()
            .ok_or_else(|| HalError::ResultUnavailable(handle.job_id.0.clone()))
    }

    async fn cancel(&self, handle: &JobHandle) -> HalResult<bool> {
        self.counters.cancels.fetch_add(1, Ordering::SeqCst);

        let mut jobs = self.lock_jobs();
        let job = jobs
            .get_mut(&handle.job_id.0)
            .ok_or_else(|| HalError::HandleExpired(handle.job_id.0.clone()))?;

        if self.refuse_cancel || job.status.is_terminal() {
            return Ok(false);
        }
        job.status = JobStatus::Cancelled;
        debug!("Cancelled job: {}", handle.job_id);
        Ok(true)
    }
}

impl BackendFactory for SimulatorBackend {
    /// Recognized extras: `polls_to_complete`, `delay_ms`, `result`,
    /// `fail_with`, `max_payload_bytes`.
    fn from_config(config: BackendConfig) -> HalResult<Self> {
        let script = match (config.extra_u64("delay_ms"), config.extra_u64("polls_to_complete")) {
            (Some(_), Some(_)) => {
                return Err(HalError::Configuration(
                    "simulator accepts either delay_ms or polls_to_complete, not both".into(),
                ));
            }
            (Some(ms), None) => Script::After(Duration::from_millis(ms)),
            (None, Some(polls)) => {
                let polls = usize::try_from(polls).map_err(|_| {
                    HalError::Configuration(format!("polls_to_complete out of range: {polls}"))
                })?;
                Script::Statuses(statuses_completing_after(polls))
            }
            (None, None) => Script::Statuses(vec![]),
        };

        let result = config.extra.get("result").cloned().map(Payload);
        let failure = config.extra_str("fail_with").map(str::to_string);
        let max_payload_bytes = config
            .extra_u64("max_payload_bytes")
            .map_or(DEFAULT_MAX_PAYLOAD_BYTES, |v| {
                usize::try_from(v).unwrap_or(usize::MAX)
            });

        let mut backend = Self::with_script(config, script);
        backend.result = result;
        backend.failure = failure;
        backend.max_payload_bytes = max_payload_bytes;
        Ok(backend)
    }
}
