use clap::Parser;
use std::io;
use triage_server::loadtest::{self, LoadTestArgs, LoadTestConfig};
use triage_server::telemetry::init_telemetry;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = LoadTestArgs::parse();
    let config = LoadTestConfig::try_from(args)?;

    init_telemetry("warn")?;

    let mut out = io::stdout().lock();
    if !config.json {
        loadtest::write_header(
            &mut out,
            config.requests,
            config.concurrency,
            config.pool.workers,
            config.pool.queue_capacity,
        )?;
    }
    drop(out);

    let reports = loadtest::run(&config).await?;

    let mut out = io::stdout().lock();
    if config.json {
        loadtest::write_json(&mut out, &reports)?;
    } else {
        loadtest::write_report(&mut out, &reports)?;
    }
    Ok(())
}
