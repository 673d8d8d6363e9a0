pub mod config;
mod error;
mod routes;

pub use error::ApiError;
pub use routes::{AppState, METRICS_NAMESPACE};

use axum::{Router, routing::get};
use config::ServerConfig;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use triage::{Collector, SimulatedDatabase, WorkerPool};

/// Builds the HTTP router over `state`.
pub fn router(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/v1/patients", get(routes::get_patient))
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::metrics))
        .route("/status", get(routes::status))
        .route("/", get(routes::info))
        .with_state(state)
        .layer(
            ServiceBuilder::new().layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        );

    #[cfg(feature = "tracing")]
    let router = router.layer(tower_http::trace::TraceLayer::new_for_http());

    router
}

/// Spawns the pool, serves HTTP until a termination signal, then drains.
///
/// Shutdown order:
/// 1. Stop accepting connections and let in-flight HTTP requests finish.
/// 2. Shut the pool down within `config.shutdown_timeout`.
/// 3. Log the final reuse-pool and database counters.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let database = Arc::new(SimulatedDatabase::new(config.simulator.clone())?);
    let collector = Arc::new(Collector::new());
    let pool = Arc::new(
        WorkerPool::builder(config.pool.clone())
            .allocator(config.pattern.allocator())
            .collector(Arc::clone(&collector))
            .build(Arc::clone(&database))?,
    );

    let state = AppState {
        pool: Arc::clone(&pool),
        database: Arc::clone(&database),
        collector,
        pattern: config.pattern,
    };

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    #[cfg(feature = "tracing")]
    tracing::info!("HTTP intake stopped, draining worker pool");

    let drained = pool.shutdown(config.shutdown_timeout).await;

    #[cfg(feature = "tracing")]
    {
        let allocator = pool.allocator_stats();
        let db = database.stats();
        tracing::info!(
            "Reuse pool: {} hits, {} misses ({:.2}% hit rate)",
            allocator.hits,
            allocator.misses,
            allocator.hit_rate_percent
        );
        tracing::info!("Database: {} queries, {} errors", db.queries, db.errors);
    }

    drained?;

    #[cfg(feature = "tracing")]
    tracing::info!("Server exited gracefully");
    Ok(())
}

fn log_startup_info(_config: &ServerConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting triage on {} with full config: {:#?}",
            _config.server_addr,
            _config
        );
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting triage on {} ({} pattern, {} workers, queue {})",
            _config.server_addr,
            _config.pattern.name(),
            _config.pool.workers,
            _config.pool.queue_capacity
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to install SIGTERM handler: {_e}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_e) = signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to install Ctrl+C handler: {_e}");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, terminating gracefully...");
}
