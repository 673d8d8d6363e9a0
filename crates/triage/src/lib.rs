//! Bounded request processing for latency-sensitive services.
//!
//! `triage` runs a fixed number of worker tasks over a capacity-limited FIFO
//! queue. Submissions that do not fit are rejected immediately instead of
//! piling up, every job carries a cancellation token that workers honor while
//! waiting on the upstream [`Source`], and each outcome travels back to its
//! submitter over a set-once conduit.
//!
//! Two collaborators are pluggable:
//!
//! - [`ResponseAllocator`] decides where response containers come from.
//!   [`FreshAllocator`] allocates per request, [`ResponsePool`] recycles
//!   cleared containers and tracks its hit rate.
//! - [`Collector`] accumulates request latencies and computes nearest-rank
//!   percentiles, throughput, and error rates on demand.
//!
//! ```no_run
//! use std::sync::Arc;
//! use triage::{
//!     Collector, PoolConfig, ResponsePool, SimulatedDatabase, SimulatorConfig, WorkerPool,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> triage::Result<()> {
//! let source = Arc::new(SimulatedDatabase::new(SimulatorConfig::default())?);
//! let collector = Arc::new(Collector::new());
//! let pool = WorkerPool::builder(PoolConfig::default())
//!     .allocator(Arc::new(ResponsePool::default()))
//!     .collector(Arc::clone(&collector))
//!     .build(source)?;
//!
//! let response = pool.submit("P00042", &CancellationToken::new()).await?;
//! assert!(response.success);
//! pool.recycle(response);
//!
//! pool.shutdown(std::time::Duration::from_secs(5)).await?;
//! println!("{}", collector.snapshot());
//! # Ok(())
//! # }
//! ```

mod conduit;
mod config;
mod error;
mod job;
mod metrics;
mod pool;
mod queue;
mod record;
mod recycle;
mod response;
mod source;

pub use crate::conduit::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::job::*;
pub use crate::metrics::*;
pub use crate::pool::*;
pub use crate::queue::*;
pub use crate::record::*;
pub use crate::recycle::*;
pub use crate::response::*;
pub use crate::source::*;
