//! End-to-end engine scenarios against the simulated backend.
//!
//! All tests run on a paused tokio clock, so backoff sleeps and timeouts
//! elapse instantly while staying deterministic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pollux_adapter_sim::{Rejection, SimulatorBackend};
use pollux_engine::{
    CANCEL_GRACE, EngineError, ErrorKind, JsonResultStore, MemoryResultStore, Outcome,
    PollPolicy, PollingEngine, ResultStore,
};
use pollux_hal::{
    Backend, BackendKind, HalResult, JobHandle, JobStatus, Parameters, Payload, WorkUnit,
    WorkUnitId,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn setup() -> (PollingEngine, Arc<MemoryResultStore>) {
    let store = Arc::new(MemoryResultStore::new());
    (PollingEngine::new(store.clone()), store)
}

fn unit(id: &str, payload: &str) -> WorkUnit {
    WorkUnit::new(id, payload, Parameters::new()).unwrap()
}

/// Simulator wrapper that records when each status query arrives and can
/// leave cancel requests unanswered.
struct Observed {
    inner: SimulatorBackend,
    silent_cancel: bool,
    polled_at: Mutex<Vec<Instant>>,
}

impl Observed {
    fn new(inner: SimulatorBackend) -> Self {
        Self {
            inner,
            silent_cancel: false,
            polled_at: Mutex::new(Vec::new()),
        }
    }

    fn never_answering_cancel(mut self) -> Self {
        self.silent_cancel = true;
        self
    }

    fn poll_gaps(&self, submitted: Instant) -> Vec<Duration> {
        let polled = self.polled_at.lock().unwrap();
        let mut previous = submitted;
        polled
            .iter()
            .map(|at| {
                let gap = *at - previous;
                previous = *at;
                gap
            })
            .collect()
    }
}

#[async_trait]
impl Backend for Observed {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn submit(&self, work_unit: &WorkUnit) -> HalResult<JobHandle> {
        self.inner.submit(work_unit).await
    }

    async fn status(&self, handle: &JobHandle) -> HalResult<JobStatus> {
        self.polled_at.lock().unwrap().push(Instant::now());
        self.inner.status(handle).await
    }

    async fn fetch_result(&self, handle: &JobHandle) -> HalResult<Payload> {
        self.inner.fetch_result(handle).await
    }

    async fn cancel(&self, handle: &JobHandle) -> HalResult<bool> {
        if self.silent_cancel {
            std::future::pending::<()>().await;
        }
        self.inner.cancel(handle).await
    }
}

#[tokio::test(start_paused = true)]
async fn completes_after_exactly_n_polls() {
    for n in [0usize, 1, 3, 7] {
        let (engine, _) = setup();
        let backend = SimulatorBackend::completing_after(n, "done");

        let entry = engine
            .run(&unit("job", "work"), &backend, &PollPolicy::default())
            .await
            .unwrap();

        assert_eq!(entry.outcome.payload(), Some(&Payload::from("done")));
        let calls = backend.calls();
        assert_eq!(calls.status_queries, n + 1, "n = {n}");
        assert_eq!(calls.fetches, 1);
        assert_eq!(calls.cancels, 0);
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_status_sequence_to_success() {
    let (engine, store) = setup();
    let backend = SimulatorBackend::with_statuses(vec![
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Running,
        JobStatus::Completed,
    ])
    .with_result("4");

    let entry = engine
        .run(&unit("w1", "2+2"), &backend, &PollPolicy::default())
        .await
        .unwrap();

    let expected = Outcome::Success {
        result_payload: Payload::from("4"),
    };
    assert_eq!(entry.outcome, expected);

    let stored = store.get(&WorkUnitId::new("w1")).await.unwrap();
    assert_eq!(stored.outcome, expected);
    assert_eq!(stored, store.get(&WorkUnitId::new("w1")).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn scenario_invalid_work_unit_fails_immediately() {
    let (engine, store) = setup();
    let backend =
        SimulatorBackend::new().rejecting(Rejection::Invalid("unsupported operation count".into()));

    let err = engine
        .run(&unit("w2", "payload"), &backend, &PollPolicy::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidWorkUnit(msg) if msg.contains("operation count")));
    assert!(!store.contains(&WorkUnitId::new("w2")).await.unwrap());
    assert_eq!(backend.calls().submits, 1);
    assert_eq!(backend.calls().status_queries, 0);
}

#[tokio::test(start_paused = true)]
async fn unavailable_backend_fails_immediately() {
    let (engine, store) = setup();
    let backend = SimulatorBackend::new().rejecting(Rejection::Unavailable("no credentials".into()));

    let err = engine
        .run(&unit("w2b", "payload"), &backend, &PollPolicy::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::BackendUnavailable(_)));
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn scenario_completed_but_result_purged() {
    let (engine, store) = setup();
    let backend = SimulatorBackend::completing_after(2, "lost").purging_results();

    let entry = engine
        .run(&unit("w3", "payload"), &backend, &PollPolicy::default())
        .await
        .unwrap();

    assert_eq!(entry.outcome.error_kind(), Some(ErrorKind::ResultUnavailable));
    let stored = store.get(&WorkUnitId::new("w3")).await.unwrap();
    assert_eq!(stored.outcome.error_kind(), Some(ErrorKind::ResultUnavailable));
}

#[tokio::test(start_paused = true)]
async fn timeout_cancels_the_job() {
    let (engine, _) = setup();
    let backend = SimulatorBackend::with_delay(Duration::from_secs(60));
    let policy = PollPolicy::default().with_timeout(Duration::from_secs(5));

    let started = tokio::time::Instant::now();
    let entry = engine
        .run(&unit("slow", "payload"), &backend, &policy)
        .await
        .unwrap();

    assert_eq!(entry.outcome.error_kind(), Some(ErrorKind::PollingTimeout));
    assert_eq!(backend.calls().cancels, 1);
    assert_eq!(backend.calls().fetches, 0);
    assert!(started.elapsed() <= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn timeout_reports_refused_cancel() {
    let (engine, _) = setup();
    let backend = SimulatorBackend::with_delay(Duration::from_secs(60)).refusing_cancel();
    let policy = PollPolicy::default().with_timeout(Duration::from_secs(2));

    let entry = engine
        .run(&unit("stubborn", "payload"), &backend, &policy)
        .await
        .unwrap();

    match entry.outcome {
        Outcome::Failure {
            error_kind,
            message,
        } => {
            assert_eq!(error_kind, ErrorKind::PollingTimeout);
            assert!(message.contains("may still complete"), "{message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(backend.calls().cancels, 1);
}

#[tokio::test(start_paused = true)]
async fn unanswered_cancel_does_not_hold_the_run() {
    let (engine, store) = setup();
    let backend = Observed::new(SimulatorBackend::with_delay(Duration::from_secs(3600)))
        .never_answering_cancel();
    let policy = PollPolicy::default().with_timeout(Duration::from_secs(2));

    let started = Instant::now();
    let entry = engine
        .run(&unit("hung", "payload"), &backend, &policy)
        .await
        .unwrap();

    match &entry.outcome {
        Outcome::Failure {
            error_kind,
            message,
        } => {
            assert_eq!(*error_kind, ErrorKind::PollingTimeout);
            assert!(message.contains("cancel request timed out"), "{message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    let elapsed = started.elapsed();
    let bound = Duration::from_secs(2) + CANCEL_GRACE;
    assert!(elapsed >= bound && elapsed < bound + Duration::from_millis(10), "{elapsed:?}");
    assert!(store.contains(&WorkUnitId::new("hung")).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn caller_cancel_with_unanswered_backend_cancel() {
    let (engine, _) = setup();
    let backend = Observed::new(SimulatorBackend::with_delay(Duration::from_secs(3600)))
        .never_answering_cancel();
    let token = CancellationToken::new();
    token.cancel();

    let entry = engine
        .run_with_cancel(&unit("stopped", "payload"), &backend, &PollPolicy::default(), &token)
        .await
        .unwrap();

    assert_eq!(entry.outcome.error_kind(), Some(ErrorKind::Cancelled));
    assert!(backend.polled_at.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn polls_are_spaced_by_the_backoff_schedule() {
    let (engine, _) = setup();
    let backend = Observed::new(SimulatorBackend::completing_after(5, "done"));
    let policy = PollPolicy {
        initial_interval: Duration::from_millis(100),
        backoff_factor: 2.0,
        max_interval: Duration::from_millis(400),
        ..Default::default()
    };

    let submitted = Instant::now();
    let entry = engine
        .run(&unit("paced", "payload"), &backend, &policy)
        .await
        .unwrap();

    assert!(entry.outcome.is_success());
    let gaps = backend.poll_gaps(submitted);
    let expected = [100, 200, 400, 400, 400, 400].map(Duration::from_millis);
    assert_eq!(gaps.len(), expected.len(), "{gaps:?}");
    // timer wheel resolution is one millisecond
    for (gap, want) in gaps.iter().zip(expected) {
        assert!(*gap >= want && *gap < want + Duration::from_millis(2), "{gaps:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn max_attempts_bounds_status_queries() {
    let (engine, _) = setup();
    let backend = SimulatorBackend::completing_after(10, "late");
    let policy = PollPolicy::default().with_max_attempts(3);

    let entry = engine
        .run(&unit("capped", "payload"), &backend, &policy)
        .await
        .unwrap();

    assert_eq!(entry.outcome.error_kind(), Some(ErrorKind::PollingTimeout));
    assert_eq!(backend.calls().status_queries, 3);
    assert_eq!(backend.calls().cancels, 1);
}

#[tokio::test(start_paused = true)]
async fn backend_failure_carries_message() {
    let (engine, _) = setup();
    let backend = SimulatorBackend::completing_after(2, "x").failing_with("calibration drift");

    let entry = engine
        .run(&unit("bad", "payload"), &backend, &PollPolicy::default())
        .await
        .unwrap();

    assert_eq!(
        entry.outcome,
        Outcome::failure(ErrorKind::BackendReportedFailure, "calibration drift")
    );
    assert_eq!(backend.calls().fetches, 0);
}

#[tokio::test(start_paused = true)]
async fn backend_side_cancellation() {
    let (engine, _) = setup();
    let backend = SimulatorBackend::with_statuses(vec![JobStatus::Running, JobStatus::Cancelled]);

    let entry = engine
        .run(&unit("gone", "payload"), &backend, &PollPolicy::default())
        .await
        .unwrap();

    assert_eq!(entry.outcome.error_kind(), Some(ErrorKind::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn expired_handle_is_not_retried() {
    let (engine, _) = setup();
    let backend = SimulatorBackend::completing_after(10, "x").expiring_after(2);

    let entry = engine
        .run(&unit("expired", "payload"), &backend, &PollPolicy::default())
        .await
        .unwrap();

    assert_eq!(entry.outcome.error_kind(), Some(ErrorKind::HandleExpired));
    assert_eq!(backend.calls().status_queries, 3);
    assert_eq!(backend.calls().submits, 1);
    assert_eq!(backend.calls().cancels, 0);
}

#[tokio::test(start_paused = true)]
async fn regressing_statuses_still_complete() {
    let (engine, _) = setup();
    let backend = SimulatorBackend::with_statuses(vec![
        JobStatus::Running,
        JobStatus::Queued,
        JobStatus::Completed,
    ])
    .with_result("ok");

    let entry = engine
        .run(&unit("flaky", "payload"), &backend, &PollPolicy::default())
        .await
        .unwrap();

    assert!(entry.outcome.is_success());
}

#[tokio::test(start_paused = true)]
async fn caller_cancellation_stops_polling() {
    let (engine, store) = setup();
    let backend = SimulatorBackend::with_delay(Duration::from_secs(3600));
    let token = CancellationToken::new();
    let unit = unit("interrupted", "payload");
    let policy = PollPolicy::default();

    let canceller = async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        token.cancel();
    };
    let (entry, ()) = tokio::join!(
        engine.run_with_cancel(&unit, &backend, &policy, &token),
        canceller
    );
    let entry = entry.unwrap();

    assert_eq!(entry.outcome.error_kind(), Some(ErrorKind::Cancelled));
    assert_eq!(backend.calls().cancels, 1);

    let queries = backend.calls().status_queries;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.calls().status_queries, queries);
    assert!(store.contains(&WorkUnitId::new("interrupted")).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn duplicate_id_is_rejected_before_submission() {
    let (engine, store) = setup();
    let backend = SimulatorBackend::completing_after(1, "first");

    engine
        .run(&unit("dup", "payload"), &backend, &PollPolicy::default())
        .await
        .unwrap();
    let err = engine
        .run(&unit("dup", "payload"), &backend, &PollPolicy::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::DuplicateResult(id) if id.as_str() == "dup"));
    assert_eq!(backend.calls().submits, 1);
    let kept = store.get(&WorkUnitId::new("dup")).await.unwrap();
    assert_eq!(kept.outcome.payload(), Some(&Payload::from("first")));
}

#[tokio::test(start_paused = true)]
async fn invalid_policy_is_rejected_before_submission() {
    let (engine, _) = setup();
    let backend = SimulatorBackend::new();
    let policy = PollPolicy {
        backoff_factor: 0.5,
        ..Default::default()
    };

    let err = engine
        .run(&unit("p", "payload"), &backend, &policy)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidPolicy(_)));
    assert_eq!(backend.calls().submits, 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_runs_do_not_block_each_other() {
    let policy = PollPolicy::default();

    let (engine, _) = setup();
    let single = SimulatorBackend::completing_after(4, "ok");
    let started = tokio::time::Instant::now();
    engine
        .run(&unit("solo", "payload"), &single, &policy)
        .await
        .unwrap();
    let one_run = started.elapsed();

    let (engine, store) = setup();
    let backend = SimulatorBackend::completing_after(4, "ok");
    let units: Vec<_> = (0..8).map(|i| unit(&format!("u{i}"), "payload")).collect();

    let started = tokio::time::Instant::now();
    let results = engine.run_many(&units, &backend, &policy).await;
    let all_runs = started.elapsed();

    assert_eq!(results.len(), 8);
    for (unit, result) in units.iter().zip(&results) {
        let entry = result.as_ref().unwrap();
        assert_eq!(&entry.work_unit_id, unit.id());
        assert!(entry.outcome.is_success());
    }
    assert_eq!(store.len().await, 8);
    assert_eq!(backend.calls().status_queries, 8 * 5);
    assert!(all_runs < one_run * 2, "{all_runs:?} vs {one_run:?}");
}

#[tokio::test(start_paused = true)]
async fn outcomes_persist_in_json_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonResultStore::new(dir.path()).await.unwrap());
    let engine = PollingEngine::new(store);
    let backend = SimulatorBackend::completing_after(1, "persisted");

    engine
        .run(&unit("saved", "payload"), &backend, &PollPolicy::default())
        .await
        .unwrap();

    let reopened = JsonResultStore::new(dir.path()).await.unwrap();
    let entry = reopened.get(&WorkUnitId::new("saved")).await.unwrap();
    assert_eq!(entry.outcome.payload(), Some(&Payload::from("persisted")));
}
