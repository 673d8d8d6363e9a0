//! Error types for request submission and pool lifecycle.
//!
//! Every failure a submitter can observe is a variant of [`Error`]. The engine
//! never retries; retry and backoff belong to the caller.

use crate::source::SourceError;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the request-processing engine.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The request key was missing or malformed. Never reaches the queue.
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    /// The queue was at capacity. Treat as an overload signal.
    #[error("Queue full: request rejected (capacity {capacity})")]
    Rejected { capacity: usize },

    /// The upstream source failed the call. Surfaced as-is.
    #[error("Upstream error: {0}")]
    Upstream(SourceError),

    /// The submitter's token fired before an outcome was delivered.
    #[error("Request cancelled")]
    Cancelled,

    /// The shutdown deadline elapsed with work still outstanding.
    #[error(
        "Shutdown timed out: {workers} workers still running ({active} active, {queued} queued jobs)"
    )]
    ShutdownTimeout {
        workers: usize,
        active: usize,
        queued: usize,
    },

    /// The pool stopped accepting work.
    #[error("Pool is shutting down")]
    Shutdown,

    /// A configuration value was out of range.
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl Error {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the number of workers and jobs still outstanding when a
    /// shutdown deadline elapsed, or `0` for every other kind.
    pub fn outstanding(&self) -> usize {
        match self {
            Self::ShutdownTimeout {
                workers,
                active,
                queued,
            } => workers + active + queued,
            _ => 0,
        }
    }
}

impl From<SourceError> for Error {
    fn from(err: SourceError) -> Self {
        match err {
            // A cancelled fetch is the submitter walking away, not a service
            // failure.
            SourceError::Cancelled => Self::Cancelled,
            other => Self::Upstream(other),
        }
    }
}
