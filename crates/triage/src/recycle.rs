//! Sources of [`Response`] containers.
//!
//! Workers acquire a container per delivered success and submitters hand it
//! back through [`WorkerPool::recycle`](crate::WorkerPool::recycle). Whether
//! the container is then dropped or kept for reuse is up to the
//! [`ResponseAllocator`] the pool was built with.

use crate::response::Response;
use parking_lot::Mutex;
use portable_atomic::{AtomicU64, Ordering};
use serde::Serialize;

/// Idle containers kept by a default [`ResponsePool`].
pub const DEFAULT_MAX_IDLE: usize = 1024;

/// Counters reported by a [`ResponseAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AllocatorStats {
    /// Containers created from scratch.
    pub allocations: u64,
    /// Acquisitions served from the idle set.
    pub hits: u64,
    /// Acquisitions that had to allocate.
    pub misses: u64,
    /// Containers currently idle.
    pub idle: usize,
    /// `hits / (hits + misses)` in percent.
    pub hit_rate_percent: f64,
}

/// Hands out cleared [`Response`] containers and takes them back.
pub trait ResponseAllocator: Send + Sync + 'static {
    /// Returns a container with every field at its default.
    fn acquire(&self) -> Box<Response>;

    /// Takes back a container that is no longer referenced elsewhere.
    fn release(&self, response: Box<Response>);

    fn stats(&self) -> AllocatorStats;
}

/// Allocates a new container per request and drops released ones.
#[derive(Debug, Default)]
pub struct FreshAllocator {
    allocations: AtomicU64,
}

impl FreshAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseAllocator for FreshAllocator {
    fn acquire(&self) -> Box<Response> {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Box::default()
    }

    fn release(&self, response: Box<Response>) {
        drop(response);
    }

    fn stats(&self) -> AllocatorStats {
        let allocations = self.allocations.load(Ordering::Relaxed);
        AllocatorStats {
            allocations,
            misses: allocations,
            ..AllocatorStats::default()
        }
    }
}

/// Keeps released containers in an idle set and reuses them.
///
/// Every container is cleared on release and again on acquire, so no field of
/// a previous request can leak into the next one. Once `max_idle` containers
/// are idle, further releases are dropped.
#[derive(Debug)]
pub struct ResponsePool {
    idle: Mutex<Vec<Box<Response>>>,
    max_idle: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ResponsePool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

impl ResponsePool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Percentage of acquisitions served from the idle set. `0.0` before the
    /// first acquisition.
    pub fn hit_rate(&self) -> f64 {
        hit_rate(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

impl ResponseAllocator for ResponsePool {
    fn acquire(&self) -> Box<Response> {
        let reused = self.idle.lock().pop();
        if let Some(mut response) = reused {
            self.hits.fetch_add(1, Ordering::Relaxed);
            response.clear();
            response
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            Box::default()
        }
    }

    fn release(&self, mut response: Box<Response>) {
        response.clear();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(response);
        }
    }

    fn stats(&self) -> AllocatorStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        AllocatorStats {
            allocations: misses,
            hits,
            misses,
            idle: self.idle(),
            hit_rate_percent: hit_rate(hits, misses),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64 * 100.0
    }
}
