//! Thread-safe accumulation of request outcomes.
//!
//! The [`Collector`] only records raw samples; every derived figure
//! (percentiles, rates, throughput) is computed when a [`Stats`] snapshot is
//! taken. Snapshots never mutate the collector, so taking one twice without
//! intervening records yields equal values.

use crate::metrics::stats::Stats;
use core::time::Duration;
use parking_lot::RwLock;
use std::time::Instant;

/// Latency samples preallocated by a fresh collector.
const INITIAL_SAMPLES: usize = 10_000;

#[derive(Debug)]
pub(crate) struct Inner {
    pub(crate) total: u64,
    pub(crate) success: u64,
    pub(crate) errors: u64,
    pub(crate) rejected: u64,
    pub(crate) latencies: Vec<Duration>,
    /// Set by the first record.
    pub(crate) started_at: Option<Instant>,
    pub(crate) stopped_at: Option<Instant>,
    pub(crate) allocations: u64,
    pub(crate) bytes: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            total: 0,
            success: 0,
            errors: 0,
            rejected: 0,
            latencies: Vec::with_capacity(INITIAL_SAMPLES),
            started_at: None,
            stopped_at: None,
            allocations: 0,
            bytes: 0,
        }
    }
}

impl Inner {
    fn mark_started(&mut self) {
        self.started_at.get_or_insert_with(Instant::now);
    }

    /// Time between the first record and `stop()` (or now).
    pub(crate) fn elapsed(&self) -> Duration {
        self.started_at.map_or(Duration::ZERO, |start| {
            self.stopped_at
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(start)
        })
    }
}

/// Accumulates request outcomes for one run or one service lifetime.
///
/// Shared as an `Arc<Collector>` between the pool, which records, and
/// whatever reports on it.
#[derive(Debug, Default)]
pub struct Collector {
    pub(crate) inner: RwLock<Inner>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request that reached a worker, successful or not.
    pub fn record_request(&self, latency: Duration, success: bool) {
        let mut inner = self.inner.write();
        inner.mark_started();
        inner.total += 1;
        if success {
            inner.success += 1;
        } else {
            inner.errors += 1;
        }
        inner.latencies.push(latency);
    }

    /// Records a request refused at admission. Counts towards the total but
    /// contributes no latency sample.
    pub fn record_rejection(&self) {
        let mut inner = self.inner.write();
        inner.mark_started();
        inner.total += 1;
        inner.rejected += 1;
    }

    /// Adds to the allocation counters.
    pub fn record_memory(&self, allocations: u64, bytes: u64) {
        let mut inner = self.inner.write();
        inner.allocations += allocations;
        inner.bytes += bytes;
    }

    /// Freezes the measurement window. Later calls keep the first end time.
    pub fn stop(&self) {
        let mut inner = self.inner.write();
        if inner.started_at.is_some() && inner.stopped_at.is_none() {
            inner.stopped_at = Some(Instant::now());
        }
    }

    /// Discards every sample and counter.
    pub fn reset(&self) {
        *self.inner.write() = Inner::default();
    }

    /// Computes a [`Stats`] snapshot from the samples recorded so far.
    pub fn snapshot(&self) -> Stats {
        Stats::from_inner(&self.inner.read())
    }
}
