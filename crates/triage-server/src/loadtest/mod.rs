//! In-process load generator comparing the pool's allocation strategies.
//!
//! Each selected [`Pattern`] gets its own pool and collector over a shared
//! simulated database. Clients submit sequentially with a bounded enqueue
//! wait, so a saturated queue shows up as rejections rather than unbounded
//! buffering.

mod report;

pub use report::{PatternReport, write_header, write_json, write_report};

use crate::server::config::Pattern;
use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use triage::{Collector, PoolConfig, Response, SimulatedDatabase, SimulatorConfig, WorkerPool};

/// Distinct patient keys cycled through by the clients.
const KEY_SPACE: usize = 10_000;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSelection {
    All,
    Workerpool,
    Optimized,
}

impl PatternSelection {
    pub const fn patterns(self) -> &'static [Pattern] {
        match self {
            Self::All => &[Pattern::Workerpool, Pattern::Optimized],
            Self::Workerpool => &[Pattern::Workerpool],
            Self::Optimized => &[Pattern::Optimized],
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "triage-loadtest",
    version,
    about = "Drives the triage worker pool in-process and compares allocation strategies"
)]
pub struct LoadTestArgs {
    /// Total number of requests per pattern.
    #[arg(long, default_value_t = 1000)]
    pub requests: usize,

    /// Number of concurrent clients.
    #[arg(long, default_value_t = 100)]
    pub concurrency: usize,

    /// Number of worker tasks.
    #[arg(long, default_value_t = triage::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Queue capacity.
    #[arg(long, default_value_t = triage::DEFAULT_QUEUE_CAPACITY)]
    pub queue_size: usize,

    /// How long a client waits for a queue slot before counting a rejection,
    /// in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub enqueue_wait_ms: u64,

    /// Minimum simulated database latency, in milliseconds.
    #[arg(long, default_value_t = 50)]
    pub min_latency: u64,

    /// Maximum simulated database latency, in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub max_latency: u64,

    /// Probability (0.0 to 1.0) that a simulated query fails.
    #[arg(long, default_value_t = 0.05)]
    pub error_rate: f64,

    /// Which patterns to run.
    #[arg(long, value_enum, default_value_t = PatternSelection::All)]
    pub pattern: PatternSelection,

    /// Print results as JSON instead of tables.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    pub requests: usize,
    pub concurrency: usize,
    pub pool: PoolConfig,
    pub simulator: SimulatorConfig,
    pub patterns: &'static [Pattern],
    pub json: bool,
}

impl TryFrom<LoadTestArgs> for LoadTestConfig {
    type Error = anyhow::Error;

    fn try_from(args: LoadTestArgs) -> Result<Self, Self::Error> {
        if args.concurrency == 0 {
            bail!("--concurrency must be greater than 0");
        }

        let pool = PoolConfig::new(args.workers, args.queue_size)
            .with_enqueue_wait(Duration::from_millis(args.enqueue_wait_ms));
        pool.validate()?;

        let simulator = SimulatorConfig::new(
            Duration::from_millis(args.min_latency),
            Duration::from_millis(args.max_latency),
            args.error_rate,
        );
        simulator.validate()?;

        Ok(Self {
            requests: args.requests,
            concurrency: args.concurrency,
            pool,
            simulator,
            patterns: args.pattern.patterns(),
            json: args.json,
        })
    }
}

/// Splits `total` requests across `clients`, giving the remainder to the
/// first clients.
pub fn split_requests(total: usize, clients: usize) -> Vec<usize> {
    if clients == 0 {
        return Vec::new();
    }
    let base = total / clients;
    let remainder = total % clients;
    (0..clients)
        .map(|client| base + usize::from(client < remainder))
        .collect()
}

/// Key submitted by `client` for its `n`th request.
pub fn patient_key(client: usize, n: usize) -> String {
    format!("P{:05}", (client * 1000 + n) % KEY_SPACE)
}

/// Runs every configured pattern in order against one database.
///
/// # Errors
///
/// Returns an error if a pool cannot be built or fails to drain.
pub async fn run(config: &LoadTestConfig) -> anyhow::Result<Vec<PatternReport>> {
    let database = Arc::new(SimulatedDatabase::new(config.simulator.clone())?);
    let mut reports = Vec::with_capacity(config.patterns.len());

    for &pattern in config.patterns {
        if !config.json {
            println!("\n=== Testing {} ===", pattern.display_name());
        }
        let report = run_pattern(pattern, config, Arc::clone(&database)).await?;
        if !config.json {
            println!(
                "Completed: {} requests in {:.2}s ({:.2} req/s)",
                report.stats.total_requests,
                report.stats.duration,
                report.stats.requests_per_second
            );
        }
        reports.push(report);
    }

    Ok(reports)
}

/// Drives one pattern to completion and summarises it.
///
/// # Errors
///
/// Returns an error if the pool cannot be built, a client task panics, or
/// the pool fails to drain.
pub async fn run_pattern(
    pattern: Pattern,
    config: &LoadTestConfig,
    database: Arc<SimulatedDatabase>,
) -> anyhow::Result<PatternReport> {
    let collector = Arc::new(Collector::new());
    let pool = Arc::new(
        WorkerPool::builder(config.pool.clone())
            .allocator(pattern.allocator())
            .collector(Arc::clone(&collector))
            .build(database)?,
    );

    let mut clients = JoinSet::new();
    for (client, count) in split_requests(config.requests, config.concurrency)
        .into_iter()
        .enumerate()
    {
        let pool = Arc::clone(&pool);
        clients.spawn(async move {
            let cancel = CancellationToken::new();
            for n in 0..count {
                // The pool records every outcome in the collector.
                if let Ok(response) = pool.submit_with_wait(&patient_key(client, n), &cancel).await {
                    pool.recycle(response);
                }
            }
        });
    }
    while let Some(joined) = clients.join_next().await {
        joined?;
    }

    collector.stop();
    let allocations = pool.allocator_stats().allocations;
    collector.record_memory(
        allocations,
        allocations.saturating_mul(size_of::<Response>() as u64),
    );

    pool.shutdown(Duration::from_secs(30)).await?;

    #[cfg(feature = "tracing")]
    tracing::debug!("{} run finished: {:?}", pattern.name(), pool.allocator_stats());

    Ok(PatternReport {
        pattern,
        stats: collector.snapshot(),
    })
}

#[cfg(test)]
mod tests;
