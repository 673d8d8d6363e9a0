//! Fixed-size worker pool over a bounded job queue.
//!
//! [`WorkerPool`] owns the queue, spawns exactly `workers` tasks at
//! construction, and exposes the submission API used by the HTTP and load-test
//! front ends. Shutdown closes intake, lets workers drain what was admitted,
//! and waits for them on a [`TaskTracker`] up to a caller-supplied deadline.

use crate::{
    config::PoolConfig,
    error::{Error, Result},
    job::Job,
    metrics::Collector,
    pool::{
        state::{AtomicState, LifecycleState},
        worker::{WorkerContext, worker_loop},
    },
    queue::{EnqueueError, JobQueue},
    recycle::{AllocatorStats, FreshAllocator, ResponseAllocator},
    response::Response,
    source::Source,
};
use core::time::Duration;
use portable_atomic::{AtomicU64, AtomicUsize, Ordering};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{Instant, timeout};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Longest accepted request key.
pub const MAX_KEY_LEN: usize = 64;

/// How a submission is admitted when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnqueueMode {
    /// Reject immediately. Used on interactive paths.
    #[default]
    NonBlocking,
    /// Wait up to [`PoolConfig::enqueue_wait`] for a slot, then reject.
    BoundedWait,
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatus {
    pub state: LifecycleState,
    pub workers: usize,
    pub active_jobs: usize,
    pub queued_jobs: usize,
    pub queue_capacity: usize,
    pub allocator: AllocatorStats,
}

/// Configures and spawns a [`WorkerPool`].
pub struct WorkerPoolBuilder {
    config: PoolConfig,
    allocator: Option<Arc<dyn ResponseAllocator>>,
    collector: Option<Arc<Collector>>,
}

impl WorkerPoolBuilder {
    /// Where response containers come from. Defaults to [`FreshAllocator`].
    #[must_use]
    pub fn allocator(mut self, allocator: Arc<dyn ResponseAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Records every submission outcome into `collector`.
    #[must_use]
    pub fn collector(mut self, collector: Arc<Collector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Validates the configuration and spawns the workers.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is out of range.
    pub fn build<S: Source>(self, source: Arc<S>) -> Result<WorkerPool> {
        self.config.validate()?;

        let allocator = self
            .allocator
            .unwrap_or_else(|| Arc::new(FreshAllocator::new()));
        let queue = Arc::new(JobQueue::new(self.config.queue_capacity));
        let active = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let state = AtomicState::new(LifecycleState::Created);

        for worker_id in 0..self.config.workers {
            let ctx = WorkerContext {
                queue: Arc::clone(&queue),
                source: Arc::clone(&source),
                allocator: Arc::clone(&allocator),
                active: Arc::clone(&active),
                shutdown: shutdown.clone(),
            };
            tracker.spawn(worker_loop(worker_id, ctx));
        }
        state.advance(LifecycleState::Running);

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Worker pool started ({} workers, queue capacity {})",
            self.config.workers,
            self.config.queue_capacity
        );

        Ok(WorkerPool {
            config: self.config,
            queue,
            active,
            allocator,
            collector: self.collector,
            shutdown,
            tracker,
            state,
            sequence: AtomicU64::new(0),
        })
    }
}

/// A fixed set of worker tasks consuming a bounded FIFO queue.
pub struct WorkerPool {
    config: PoolConfig,
    queue: Arc<JobQueue>,
    active: Arc<AtomicUsize>,
    allocator: Arc<dyn ResponseAllocator>,
    collector: Option<Arc<Collector>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    state: AtomicState,
    sequence: AtomicU64,
}

impl WorkerPool {
    pub fn builder(config: PoolConfig) -> WorkerPoolBuilder {
        WorkerPoolBuilder {
            config,
            allocator: None,
            collector: None,
        }
    }

    /// Spawns a pool with a [`FreshAllocator`] and no collector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is out of range.
    pub fn new<S: Source>(config: PoolConfig, source: Arc<S>) -> Result<Self> {
        Self::builder(config).build(source)
    }

    /// Submits `key` without waiting for a queue slot.
    ///
    /// # Errors
    ///
    /// See [`submit_with_id`](Self::submit_with_id).
    pub async fn submit(&self, key: &str, cancel: &CancellationToken) -> Result<Box<Response>> {
        self.submit_with_id(key, None, cancel, EnqueueMode::NonBlocking)
            .await
    }

    /// Submits `key`, waiting a bounded time for a queue slot.
    ///
    /// # Errors
    ///
    /// See [`submit_with_id`](Self::submit_with_id).
    pub async fn submit_with_wait(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Box<Response>> {
        self.submit_with_id(key, None, cancel, EnqueueMode::BoundedWait)
            .await
    }

    /// Submits `key` and waits for its outcome.
    ///
    /// `request_id` becomes the correlation id of the response; one is
    /// generated when absent. The wait ends at the first of: the outcome
    /// arriving, `cancel` firing, or the configured request timeout. Dropping
    /// the returned future cancels the job.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if `key` is empty, too long, or malformed.
    /// - [`Error::Rejected`] if the queue had no free slot.
    /// - [`Error::Shutdown`] if the pool no longer accepts work.
    /// - [`Error::Upstream`] if the source failed.
    /// - [`Error::Cancelled`] if `cancel` fired (before admission, while
    ///   waiting for a slot, or while waiting for the outcome) or the request
    ///   timed out.
    pub async fn submit_with_id(
        &self,
        key: &str,
        request_id: Option<&str>,
        cancel: &CancellationToken,
        mode: EnqueueMode,
    ) -> Result<Box<Response>> {
        validate_key(key)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let request_id = request_id.map_or_else(|| self.next_request_id(), str::to_string);
        let job_cancel = cancel.child_token();
        let _guard = job_cancel.clone().drop_guard();
        let (job, receipt) = Job::new(key, request_id, job_cancel);

        let started = Instant::now();
        let admitted = match mode {
            EnqueueMode::NonBlocking => self.queue.try_enqueue(job),
            EnqueueMode::BoundedWait => tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                admitted = self.queue.enqueue_timeout(job, self.config.enqueue_wait) => admitted,
            },
        };

        if let Err(err) = admitted {
            return Err(match err {
                EnqueueError::Full(_job) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Queue full, rejecting {}", _job.request_id());
                    if let Some(collector) = &self.collector {
                        collector.record_rejection();
                    }
                    Error::Rejected {
                        capacity: self.queue.capacity(),
                    }
                }
                EnqueueError::Closed(_) => Error::Shutdown,
            });
        }

        let outcome = tokio::select! {
            biased;
            outcome = receipt => outcome,
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(self.config.request_timeout) => Err(Error::Cancelled),
        };

        if let Some(collector) = &self.collector {
            collector.record_request(started.elapsed(), outcome.is_ok());
        }
        outcome
    }

    /// Returns a delivered container to the pool's allocator.
    pub fn recycle(&self, response: Box<Response>) {
        self.allocator.release(response);
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            state: self.state(),
            workers: self.config.workers,
            active_jobs: self.active_jobs(),
            queued_jobs: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            allocator: self.allocator.stats(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn queued_jobs(&self) -> usize {
        self.queue.len()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn allocator_stats(&self) -> AllocatorStats {
        self.allocator.stats()
    }

    pub fn collector(&self) -> Option<&Arc<Collector>> {
        self.collector.as_ref()
    }

    /// Stops intake and waits up to `deadline` for every worker to exit.
    ///
    /// - Closes the queue, so new submissions fail with [`Error::Shutdown`].
    /// - Cancels the shared token, so idle workers exit once the queue is
    ///   drained.
    /// - Waits on the task tracker.
    ///
    /// May be called again after a timeout to keep waiting. Calling it on a
    /// stopped pool returns `Ok(())` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutdownTimeout`] with the outstanding workers and
    /// jobs if `deadline` elapses first.
    pub async fn shutdown(&self, deadline: Duration) -> Result<()> {
        if self.state() == LifecycleState::Stopped {
            return Ok(());
        }

        // === Phase 0: Stop accepting new jobs ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new requests");
        self.state.advance(LifecycleState::Draining);
        self.queue.close();

        // === Phase 1: Let idle workers exit once the queue is empty ===
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Draining worker pool ({} active, {} queued)",
            self.active_jobs(),
            self.queue.len()
        );
        self.shutdown.cancel();
        self.tracker.close();

        // === Phase 2: Wait for every worker to exit ===
        if timeout(deadline, self.tracker.wait()).await.is_err() {
            let err = Error::ShutdownTimeout {
                workers: self.tracker.len(),
                active: self.active_jobs(),
                queued: self.queue.len(),
            };
            #[cfg(feature = "tracing")]
            tracing::warn!("{err}");
            return Err(err);
        }

        self.state.advance(LifecycleState::Stopped);

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");

        Ok(())
    }

    fn next_request_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("req-{seq:016x}")
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.queue.close();
        self.shutdown.cancel();
        self.tracker.close();
    }
}

/// Rejects keys that could never name a record.
///
/// # Errors
///
/// Returns [`Error::Validation`] describing the first failed check.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::Validation {
            reason: "patient ID is required".to_string(),
        });
    }
    if key.len() > MAX_KEY_LEN {
        return Err(Error::Validation {
            reason: format!("patient ID exceeds {MAX_KEY_LEN} characters"),
        });
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::Validation {
            reason: "patient ID may only contain letters, digits, '-' and '_'".to_string(),
        });
    }
    Ok(())
}
