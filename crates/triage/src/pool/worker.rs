use crate::{
    error::Error,
    job::Job,
    queue::JobQueue,
    recycle::ResponseAllocator,
    source::{Source, SourceError},
};
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a worker task shares with its pool.
pub(crate) struct WorkerContext<S> {
    pub(crate) queue: Arc<JobQueue>,
    pub(crate) source: Arc<S>,
    pub(crate) allocator: Arc<dyn ResponseAllocator>,
    pub(crate) active: Arc<AtomicUsize>,
    pub(crate) shutdown: CancellationToken,
}

/// Worker task: claims jobs one at a time until the pool shuts down and the
/// queue is drained.
///
/// Designed to be spawned on the pool's task tracker; the tracker observing
/// every worker exit is what completes a shutdown.
pub(crate) async fn worker_loop<S: Source>(worker_id: usize, ctx: WorkerContext<S>) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    while let Some(job) = ctx.queue.dequeue(&ctx.shutdown).await {
        ctx.active.fetch_add(1, Ordering::AcqRel);
        execute(worker_id, &ctx, job).await;
        ctx.active.fetch_sub(1, Ordering::AcqRel);
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}

async fn execute<S: Source>(_worker_id: usize, ctx: &WorkerContext<S>, job: Job) {
    #[cfg(feature = "tracing")]
    tracing::trace!(
        "Worker {_worker_id} claimed {} after {:?} in queue",
        job.request_id(),
        job.waited()
    );

    // The submitter may have given up while the job sat in the queue.
    if job.cancel_token().is_cancelled() || job.completer.is_abandoned() {
        let _ = job.completer.complete(Err(Error::Cancelled));
        return;
    }

    let Job {
        key,
        request_id,
        cancel,
        completer,
        ..
    } = job;

    let fetched = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SourceError::Cancelled),
        fetched = ctx.source.fetch(&key, &cancel) => fetched,
    };

    let outcome = match fetched {
        Ok(record) => match record.validate() {
            Ok(()) => {
                let mut response = ctx.allocator.acquire();
                response.fill_success(record, &request_id);
                Ok(response)
            }
            Err(reason) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Worker {_worker_id} got a malformed record for {request_id}: {reason}");
                Err(Error::Upstream(SourceError::Malformed { key, reason }))
            }
        },
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {_worker_id} failed {request_id}: {err}");
            Err(Error::from(err))
        }
    };

    if let Err(undelivered) = completer.complete(outcome) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Worker {_worker_id} dropped outcome of {request_id}: receiver gone");

        if let Ok(response) = undelivered {
            ctx.allocator.release(response);
        }
    }
}
