use crate::conduit::{Completer, Receipt, conduit};
use core::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A unit of work: one lookup of `key`, resolved through its [`Completer`].
///
/// Owned by the queue until exactly one worker claims it.
#[derive(Debug)]
pub struct Job {
    pub(crate) key: String,
    pub(crate) request_id: String,
    pub(crate) cancel: CancellationToken,
    pub(crate) enqueued_at: Instant,
    pub(crate) completer: Completer,
}

impl Job {
    /// Creates a job and the receipt its submitter awaits.
    pub fn new(
        key: impl Into<String>,
        request_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> (Self, Receipt) {
        let (completer, receipt) = conduit();
        let job = Self {
            key: key.into(),
            request_id: request_id.into(),
            cancel,
            enqueued_at: Instant::now(),
            completer,
        };
        (job, receipt)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Time since the job was created.
    pub fn waited(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}
