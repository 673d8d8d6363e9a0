//! Typed configuration for the worker pool and the simulated database.
//!
//! Both types validate themselves; the binaries parse CLI arguments and
//! environment variables into these and surface [`Error::Config`] as a startup
//! failure.

use crate::error::{Error, Result};
use core::time::Duration;

/// Default number of worker tasks.
pub const DEFAULT_WORKERS: usize = 20;
/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// How long the bounded-wait enqueue waits for a free slot.
pub const DEFAULT_ENQUEUE_WAIT: Duration = Duration::from_millis(100);
/// How long a submitter waits for an outcome once its job is queued.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Sizing and timing of a [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker tasks. Fixed for the lifetime of the pool.
    pub workers: usize,
    /// Maximum number of queued (not yet claimed) jobs.
    pub queue_capacity: usize,
    /// Wait budget of [`WorkerPool::submit_with_wait`](crate::WorkerPool::submit_with_wait).
    pub enqueue_wait: Duration,
    /// Upper bound on how long a submitter waits for its outcome.
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            enqueue_wait: DEFAULT_ENQUEUE_WAIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl PoolConfig {
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_enqueue_wait(mut self, wait: Duration) -> Self {
        self.enqueue_wait = wait;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if the worker count or queue capacity is
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config {
                reason: "worker count must be greater than 0".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config {
                reason: "queue capacity must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Latency and failure profile of a [`SimulatedDatabase`](crate::SimulatedDatabase).
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub min_latency: Duration,
    pub max_latency: Duration,
    /// Probability in `[0.0, 1.0]` that a completed query fails.
    pub error_rate: f64,
    /// Per-query budget applied on top of the caller's token.
    pub query_timeout: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_latency: Duration::from_millis(50),
            max_latency: Duration::from_millis(100),
            error_rate: 0.05,
            query_timeout: Duration::from_secs(5),
        }
    }
}

impl SimulatorConfig {
    pub fn new(min_latency: Duration, max_latency: Duration, error_rate: f64) -> Self {
        Self {
            min_latency,
            max_latency,
            error_rate,
            ..Self::default()
        }
    }

    /// A profile with a constant delay and no failures.
    pub fn fixed(latency: Duration) -> Self {
        Self::new(latency, latency, 0.0)
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if `min_latency > max_latency` or the error
    /// rate falls outside `[0.0, 1.0]`.
    pub fn validate(&self) -> Result<()> {
        if self.min_latency > self.max_latency {
            return Err(Error::Config {
                reason: format!(
                    "min latency ({:?}) exceeds max latency ({:?})",
                    self.min_latency, self.max_latency
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.error_rate) {
            return Err(Error::Config {
                reason: format!("error rate {} is outside 0.0..=1.0", self.error_rate),
            });
        }
        Ok(())
    }
}
