use crate::{
    Collector, EnqueueMode, Error, LifecycleState, PoolConfig, Record, ResponsePool,
    SimulatedDatabase, SimulatorConfig, Source, SourceError, WorkerPool,
};
use core::time::Duration;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::yield_now;
use tokio_util::sync::CancellationToken;

/// Sleeps for `delay`, then succeeds or fails. Counts calls.
struct ScriptedSource {
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(delay_ms: u64, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            fail,
            calls: AtomicUsize::new(0),
        })
    }

    fn ok(delay_ms: u64) -> Arc<Self> {
        Self::new(delay_ms, false)
    }

    fn failing(delay_ms: u64) -> Arc<Self> {
        Self::new(delay_ms, true)
    }
}

impl Source for ScriptedSource {
    async fn fetch(&self, key: &str, cancel: &CancellationToken) -> Result<Record, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            () = cancel.cancelled() => Err(SourceError::Cancelled),
            () = tokio::time::sleep(self.delay) => {
                if self.fail {
                    Err(SourceError::Unavailable { key: key.to_string() })
                } else {
                    Ok(Record::generate(key))
                }
            }
        }
    }
}

async fn until(mut condition: impl FnMut() -> bool) {
    while !condition() {
        yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn full_queue_rejects_then_drains() {
    let collector = Arc::new(Collector::new());
    let pool = Arc::new(
        WorkerPool::builder(PoolConfig::new(1, 1))
            .collector(Arc::clone(&collector))
            .build(ScriptedSource::ok(100))
            .unwrap(),
    );
    let token = CancellationToken::new();

    let first = {
        let (pool, token) = (Arc::clone(&pool), token.clone());
        tokio::spawn(async move { pool.submit("P1", &token).await })
    };
    until(|| pool.active_jobs() == 1).await;

    let second = {
        let (pool, token) = (Arc::clone(&pool), token.clone());
        tokio::spawn(async move { pool.submit("P2", &token).await })
    };
    until(|| pool.queued_jobs() == 1).await;

    let third = pool.submit("P3", &token).await;
    assert_eq!(third, Err(Error::Rejected { capacity: 1 }));

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first.record.as_ref().unwrap().id, "P1");
    assert_eq!(second.record.as_ref().unwrap().id, "P2");

    let stats = collector.snapshot();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.success_requests, 2);
    assert_eq!(stats.rejected_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn thousand_requests_at_concurrency_hundred() {
    let collector = Arc::new(Collector::new());
    let source = Arc::new(
        SimulatedDatabase::new(SimulatorConfig::new(
            Duration::from_millis(1),
            Duration::from_millis(5),
            0.0,
        ))
        .unwrap(),
    );
    let pool = Arc::new(
        WorkerPool::builder(PoolConfig::new(20, 100))
            .allocator(Arc::new(ResponsePool::default()))
            .collector(Arc::clone(&collector))
            .build(Arc::clone(&source))
            .unwrap(),
    );

    let clients: Vec<_> = (0..100)
        .map(|client| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let token = CancellationToken::new();
                for i in 0..10 {
                    let response = pool.submit(&format!("P{client:03}{i}"), &token).await?;
                    pool.recycle(response);
                }
                Ok::<_, Error>(())
            })
        })
        .collect();
    for client in futures::future::join_all(clients).await {
        client.unwrap().unwrap();
    }
    collector.stop();

    let stats = collector.snapshot();
    assert_eq!(stats.total_requests, 1_000);
    assert_eq!(stats.success_requests, 1_000);
    assert_eq!(stats.error_requests, 0);
    assert_eq!(stats.rejected_requests, 0);
    assert_eq!(source.stats().queries, 1_000);
    assert!(pool.allocator_stats().hits > 0);

    pool.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn zero_deadline_shutdown_reports_outstanding_work() {
    let pool = Arc::new(WorkerPool::new(PoolConfig::new(2, 4), ScriptedSource::ok(1_000)).unwrap());
    let in_flight = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.submit("P1", &CancellationToken::new()).await })
    };
    until(|| pool.active_jobs() == 1).await;

    let err = pool.shutdown(Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, Error::ShutdownTimeout { .. }));
    assert!(err.outstanding() >= 1);
    assert_eq!(pool.state(), LifecycleState::Draining);

    // Intake is closed while draining.
    assert_eq!(
        pool.submit("P2", &CancellationToken::new()).await,
        Err(Error::Shutdown)
    );

    // A second call keeps waiting and the admitted job still completes.
    pool.shutdown(Duration::from_secs(5)).await.unwrap();
    assert_eq!(pool.state(), LifecycleState::Stopped);
    assert!(in_flight.await.unwrap().is_ok());
    pool.shutdown(Duration::ZERO).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_drains_queued_jobs() {
    let pool = Arc::new(WorkerPool::new(PoolConfig::new(1, 8), ScriptedSource::ok(10)).unwrap());
    let submitters: Vec<_> = (0..5)
        .map(|i| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.submit(&format!("P{i}"), &CancellationToken::new()).await })
        })
        .collect();
    until(|| pool.queued_jobs() + pool.active_jobs() == 5).await;

    pool.shutdown(Duration::from_secs(5)).await.unwrap();
    for submitter in submitters {
        assert!(submitter.await.unwrap().is_ok());
    }
    assert_eq!(pool.status().state, LifecycleState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn caller_cancellation_interrupts_the_source() {
    let source = ScriptedSource::ok(10_000);
    let pool = WorkerPool::new(PoolConfig::new(1, 1), Arc::clone(&source)).unwrap();
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    assert_eq!(pool.submit("P1", &token).await, Err(Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(1));

    // The worker is free again long before the source would have answered.
    until(|| pool.active_jobs() == 0).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_submission_cancels_its_job() {
    let source = ScriptedSource::ok(10_000);
    let pool = Arc::new(WorkerPool::new(PoolConfig::new(1, 1), Arc::clone(&source)).unwrap());

    let submitter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.submit("P1", &CancellationToken::new()).await })
    };
    until(|| pool.active_jobs() == 1).await;
    let aborted_at = tokio::time::Instant::now();
    submitter.abort();

    until(|| pool.active_jobs() == 0).await;
    assert!(aborted_at.elapsed() < Duration::from_secs(1));
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn request_timeout_bounds_the_wait() {
    let config = PoolConfig::new(1, 1).with_request_timeout(Duration::from_millis(200));
    let pool = WorkerPool::new(config, ScriptedSource::ok(5_000)).unwrap();

    let started = tokio::time::Instant::now();
    assert_eq!(
        pool.submit("P1", &CancellationToken::new()).await,
        Err(Error::Cancelled)
    );
    assert_eq!(started.elapsed(), Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn upstream_errors_are_delivered_as_is() {
    let source = ScriptedSource::failing(5);
    let collector = Arc::new(Collector::new());
    let pool = WorkerPool::builder(PoolConfig::new(2, 2))
        .collector(Arc::clone(&collector))
        .build(Arc::clone(&source))
        .unwrap();

    let err = pool
        .submit("P7", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        Error::Upstream(SourceError::Unavailable {
            key: "P7".to_string()
        })
    );
    // Never retried.
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(collector.snapshot().error_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_keys_never_reach_the_queue() {
    let source = ScriptedSource::ok(1);
    let collector = Arc::new(Collector::new());
    let pool = WorkerPool::builder(PoolConfig::new(1, 1))
        .collector(Arc::clone(&collector))
        .build(Arc::clone(&source))
        .unwrap();
    let token = CancellationToken::new();

    for key in ["", "P 1", &"P".repeat(65)] {
        assert!(matches!(
            pool.submit(key, &token).await,
            Err(Error::Validation { .. })
        ));
    }
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert_eq!(collector.snapshot().total_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn bounded_wait_admits_once_a_slot_frees() {
    let config = PoolConfig::new(1, 1).with_enqueue_wait(Duration::from_millis(100));
    let pool = Arc::new(WorkerPool::new(config, ScriptedSource::ok(30)).unwrap());
    let token = CancellationToken::new();

    let spawn = |key: &'static str| {
        let (pool, token) = (Arc::clone(&pool), token.clone());
        tokio::spawn(async move { pool.submit(key, &token).await })
    };
    let first = spawn("P1");
    until(|| pool.active_jobs() == 1).await;
    let second = spawn("P2");
    until(|| pool.queued_jobs() == 1).await;

    let third = pool.submit_with_wait("P3", &token).await.unwrap();
    assert_eq!(third.record.as_ref().unwrap().id, "P3");
    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn caller_request_id_is_propagated() {
    let pool = WorkerPool::new(PoolConfig::new(1, 1), ScriptedSource::ok(1)).unwrap();
    let response = pool
        .submit_with_id(
            "P1",
            Some("abc-123"),
            &CancellationToken::new(),
            EnqueueMode::NonBlocking,
        )
        .await
        .unwrap();
    assert_eq!(response.request_id, "abc-123");
    assert!(response.success);

    let generated = pool.submit("P1", &CancellationToken::new()).await.unwrap();
    assert!(generated.request_id.starts_with("req-"));
}

#[tokio::test(start_paused = true)]
async fn recycled_containers_are_reused() {
    let pool = WorkerPool::builder(PoolConfig::new(1, 1))
        .allocator(Arc::new(ResponsePool::new(4)))
        .build(ScriptedSource::ok(1))
        .unwrap();
    let token = CancellationToken::new();

    let response = pool.submit("P1", &token).await.unwrap();
    pool.recycle(response);
    let response = pool.submit("P2", &token).await.unwrap();
    assert_eq!(response.record.as_ref().unwrap().id, "P2");

    let status = pool.status();
    assert_eq!(status.allocator.hits, 1);
    assert_eq!(status.allocator.misses, 1);
    assert_eq!(status.state, LifecycleState::Running);
    assert_eq!(status.workers, 1);
    assert_eq!(status.queue_capacity, 1);
}

#[tokio::test]
async fn rejects_invalid_configuration() {
    assert!(matches!(
        WorkerPool::new(PoolConfig::new(0, 1), ScriptedSource::ok(1)),
        Err(Error::Config { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn cancelled_caller_does_not_occupy_a_slot() {
    let source = ScriptedSource::ok(100);
    let pool = Arc::new(WorkerPool::new(PoolConfig::new(1, 1), Arc::clone(&source)).unwrap());

    let busy = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.submit("P1", &CancellationToken::new()).await })
    };
    until(|| pool.active_jobs() == 1).await;

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert_eq!(pool.submit("P2", &cancelled).await, Err(Error::Cancelled));
    assert_eq!(pool.queued_jobs(), 0);

    let live = pool.submit("P3", &CancellationToken::new()).await.unwrap();
    assert_eq!(live.record.as_ref().unwrap().id, "P3");
    assert!(busy.await.unwrap().is_ok());
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_ends_a_bounded_wait() {
    let config = PoolConfig::new(1, 1).with_enqueue_wait(Duration::from_secs(10));
    let pool = Arc::new(WorkerPool::new(config, ScriptedSource::ok(60_000)).unwrap());

    let spawn = |key: &'static str| {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.submit(key, &CancellationToken::new()).await })
    };
    let _first = spawn("P1");
    until(|| pool.active_jobs() == 1).await;
    let _second = spawn("P2");
    until(|| pool.queued_jobs() == 1).await;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    assert_eq!(
        pool.submit_with_wait("P3", &token).await,
        Err(Error::Cancelled)
    );
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(pool.queued_jobs(), 1);
}

/// Answers every key with a record missing the patient's name.
struct NamelessSource;

impl Source for NamelessSource {
    async fn fetch(&self, key: &str, _cancel: &CancellationToken) -> Result<Record, SourceError> {
        let mut record = Record::generate(key);
        record.first_name.clear();
        Ok(record)
    }
}

#[tokio::test]
async fn malformed_records_are_upstream_errors() {
    let pool = WorkerPool::builder(PoolConfig::new(1, 1))
        .allocator(Arc::new(ResponsePool::default()))
        .build(Arc::new(NamelessSource))
        .unwrap();

    let err = pool
        .submit("P9", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        Error::Upstream(SourceError::Malformed {
            key: "P9".to_string(),
            reason: "patient name is required",
        })
    );
    // No container was handed out for the rejected record.
    assert_eq!(pool.allocator_stats().misses, 0);
}
