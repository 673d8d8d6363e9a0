//! Bounded FIFO job queue with non-blocking and bounded-wait admission.
//!
//! The queue never grows past its capacity: [`JobQueue::try_enqueue`] refuses
//! immediately when full, [`JobQueue::enqueue_timeout`] waits a bounded time for
//! a slot. Closing the queue stops intake but leaves queued jobs drainable, so
//! workers finish what was admitted before they exit.

use crate::job::Job;
use core::time::Duration;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::{sync::Notify, time::Instant};
use tokio_util::sync::CancellationToken;

/// Slots reserved up front. Larger queues grow on demand up to their capacity.
const PREALLOCATED_SLOTS: usize = 1024;

/// Why a job was refused. Carries the job back to the caller.
#[derive(thiserror::Error, Debug)]
pub enum EnqueueError {
    #[error("queue is full")]
    Full(Job),
    #[error("queue is closed")]
    Closed(Job),
}

impl EnqueueError {
    pub fn into_job(self) -> Job {
        match self {
            Self::Full(job) | Self::Closed(job) => job,
        }
    }
}

#[derive(Debug)]
struct Inner {
    jobs: VecDeque<Job>,
    closed: bool,
}

#[derive(Debug)]
pub struct JobQueue {
    inner: Mutex<Inner>,
    capacity: usize,
    /// Signalled when a job is pushed or the queue closes.
    items: Notify,
    /// Signalled when a job is popped or the queue closes.
    space: Notify,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: VecDeque::with_capacity(capacity.min(PREALLOCATED_SLOTS)),
                closed: false,
            }),
            capacity,
            items: Notify::new(),
            space: Notify::new(),
        }
    }

    /// Admits `job` if a slot is free. Never waits.
    ///
    /// # Errors
    ///
    /// Returns the job inside [`EnqueueError::Full`] at capacity, or inside
    /// [`EnqueueError::Closed`] after [`close`](Self::close).
    pub fn try_enqueue(&self, job: Job) -> Result<(), EnqueueError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(EnqueueError::Closed(job));
        }
        if inner.jobs.len() >= self.capacity {
            return Err(EnqueueError::Full(job));
        }
        inner.jobs.push_back(job);
        drop(inner);

        self.items.notify_one();
        Ok(())
    }

    /// Admits `job`, waiting up to `wait` for a slot to free up.
    ///
    /// # Errors
    ///
    /// Same as [`try_enqueue`](Self::try_enqueue), once `wait` has elapsed.
    pub async fn enqueue_timeout(&self, mut job: Job, wait: Duration) -> Result<(), EnqueueError> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_enqueue(job) {
                Err(EnqueueError::Full(returned)) => job = returned,
                admitted_or_closed => return admitted_or_closed,
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_enqueue(job);
            }
        }
    }

    /// Claims the oldest job, waiting until one arrives.
    ///
    /// Returns `None` once `shutdown` has fired (or the queue is closed) and
    /// nothing is left to drain.
    pub async fn dequeue(&self, shutdown: &CancellationToken) -> Option<Job> {
        loop {
            let notified = self.items.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock();
                if let Some(job) = inner.jobs.pop_front() {
                    drop(inner);
                    self.space.notify_one();
                    return Some(job);
                }
                if inner.closed || shutdown.is_cancelled() {
                    return None;
                }
            }

            tokio::select! {
                () = notified.as_mut() => {}
                () = shutdown.cancelled() => {}
            }
        }
    }

    /// Stops intake and wakes every waiter. Idempotent.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.items.notify_waiters();
        self.space.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().jobs.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}
