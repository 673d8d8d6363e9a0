use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use std::sync::Arc;
use triage::{
    FreshAllocator, PoolConfig, ResponseAllocator, ResponsePool, SimulatorConfig,
};

/// Which response allocation strategy backs the worker pool.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Fresh response container per request.
    Workerpool,
    /// Cleared containers are recycled through a reuse pool.
    Optimized,
}

impl Pattern {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Workerpool => "workerpool",
            Self::Optimized => "optimized",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Workerpool => "Worker Pool",
            Self::Optimized => "Optimized",
        }
    }

    pub fn allocator(self) -> Arc<dyn ResponseAllocator> {
        match self {
            Self::Workerpool => Arc::new(FreshAllocator::new()),
            Self::Optimized => Arc::new(ResponsePool::default()),
        }
    }
}

/// Runtime configuration for the `triage-server` binary.
///
/// Every value can be given as a CLI flag or as the listed environment
/// variable. A `.env` file in the working directory is loaded first.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "triage-server",
    version,
    about = "An HTTP service backed by a bounded worker pool"
)]
pub struct CliArgs {
    /// Response allocation strategy.
    ///
    /// Environment variable: `PATTERN`
    #[arg(long, env = "PATTERN", value_enum, default_value_t = Pattern::Workerpool)]
    pub pattern: Pattern,

    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Number of worker tasks.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = triage::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Maximum number of queued requests. Requests beyond this are rejected
    /// with `503 Service Unavailable`.
    ///
    /// Environment variable: `QUEUE_SIZE`
    #[arg(long, env = "QUEUE_SIZE", default_value_t = triage::DEFAULT_QUEUE_CAPACITY)]
    pub queue_size: usize,

    /// Minimum simulated database latency, in milliseconds.
    ///
    /// Environment variable: `MIN_LATENCY_MS`
    #[arg(long, env = "MIN_LATENCY_MS", default_value_t = 50)]
    pub min_latency: u64,

    /// Maximum simulated database latency, in milliseconds.
    ///
    /// Environment variable: `MAX_LATENCY_MS`
    #[arg(long, env = "MAX_LATENCY_MS", default_value_t = 100)]
    pub max_latency: u64,

    /// Probability (0.0 to 1.0) that a simulated query fails.
    ///
    /// Environment variable: `ERROR_RATE`
    #[arg(long, env = "ERROR_RATE", default_value_t = 0.05)]
    pub error_rate: f64,

    /// How long to wait for a queue slot on non-interactive submissions, in
    /// milliseconds.
    ///
    /// Environment variable: `ENQUEUE_WAIT_MS`
    #[arg(long, env = "ENQUEUE_WAIT_MS", default_value_t = 100)]
    pub enqueue_wait_ms: u64,

    /// Upper bound on a single request, in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_SECS`
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 15)]
    pub request_timeout_secs: u64,

    /// Time allowed for in-flight and queued work to finish on shutdown, in
    /// seconds.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 30)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub pattern: Pattern,
    pub server_addr: String,
    pub pool: PoolConfig,
    pub simulator: SimulatorConfig,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }
        if args.queue_size == 0 {
            bail!("QUEUE_SIZE must be greater than 0");
        }
        if args.min_latency > args.max_latency {
            bail!(
                "MIN_LATENCY_MS ({}) exceeds MAX_LATENCY_MS ({})",
                args.min_latency,
                args.max_latency
            );
        }
        if !(0.0..=1.0).contains(&args.error_rate) {
            bail!("ERROR_RATE ({}) must be between 0.0 and 1.0", args.error_rate);
        }
        if args.request_timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be greater than 0");
        }

        let pool = PoolConfig::new(args.workers, args.queue_size)
            .with_enqueue_wait(Duration::from_millis(args.enqueue_wait_ms))
            .with_request_timeout(Duration::from_secs(args.request_timeout_secs));
        let simulator = SimulatorConfig::new(
            Duration::from_millis(args.min_latency),
            Duration::from_millis(args.max_latency),
            args.error_rate,
        );

        Ok(Self {
            pattern: args.pattern,
            server_addr: args.server_addr,
            pool,
            simulator,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}
