#![doc = include_str!("../README.md")]

use clap::Parser;
use triage_server::server::{
    self,
    config::{CliArgs, ServerConfig},
};
use triage_server::telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry("info")?;

    server::run(config).await
}
