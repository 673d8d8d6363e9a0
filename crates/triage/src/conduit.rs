//! One-shot delivery of a job outcome from a worker to its submitter.
//!
//! A [`Completer`] is consumed by [`Completer::complete`], so a job can be
//! resolved at most once: a second write, or a success after a failure, does
//! not typecheck.

use crate::{
    error::{Error, Result},
    response::Response,
};
use core::{
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::oneshot;

/// The value carried by a conduit.
pub type Outcome = Result<Box<Response>>;

/// Creates a connected completer/receipt pair.
pub fn conduit() -> (Completer, Receipt) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Receipt { rx })
}

/// Write half, owned by the job until a worker resolves it.
#[derive(Debug)]
pub struct Completer {
    tx: oneshot::Sender<Outcome>,
}

impl Completer {
    /// Delivers `outcome` without blocking.
    ///
    /// # Errors
    ///
    /// Hands `outcome` back if the receipt was dropped, so the caller can
    /// return a pooled container to its allocator.
    pub fn complete(self, outcome: Outcome) -> core::result::Result<(), Outcome> {
        self.tx.send(outcome)
    }

    /// `true` once the submitter stopped waiting.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read half, awaited by the submitter.
///
/// Resolves to [`Error::Shutdown`] if the completer is dropped unresolved,
/// which only happens when the pool is torn down with jobs still queued.
#[derive(Debug)]
pub struct Receipt {
    rx: oneshot::Receiver<Outcome>,
}

impl Future for Receipt {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Shutdown)))
    }
}
