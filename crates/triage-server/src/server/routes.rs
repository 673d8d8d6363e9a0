use crate::server::{config::Pattern, error::ApiError};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use triage::{Collector, EnqueueMode, SimulatedDatabase, WorkerPool, unix_millis};

/// Prefix of every metric name in the text exposition.
pub const METRICS_NAMESPACE: &str = "triage";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<WorkerPool>,
    pub database: Arc<SimulatedDatabase>,
    pub collector: Arc<Collector>,
    pub pattern: Pattern,
}

#[derive(Debug, Deserialize)]
pub struct PatientQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_queries: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    pattern: &'static str,
    endpoints: Endpoints,
    examples: [&'static str; 4],
}

#[derive(Debug, Serialize)]
struct Endpoints {
    patients: &'static str,
    health: &'static str,
    metrics: &'static str,
    status: &'static str,
}

/// `GET /api/v1/patients?id=<key>`
///
/// The submission is tied to this handler's future: if the client disconnects,
/// axum drops the future and the pool cancels the job.
pub async fn get_patient(
    State(state): State<AppState>,
    Query(query): Query<PatientQuery>,
    headers: HeaderMap,
) -> Response {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok());
    let key = query.id.unwrap_or_default();

    let outcome = state
        .pool
        .submit_with_id(
            &key,
            request_id,
            &CancellationToken::new(),
            EnqueueMode::NonBlocking,
        )
        .await;

    match outcome {
        Ok(response) => {
            let reply = (StatusCode::OK, Json(&*response)).into_response();
            state.pool.recycle(response);
            reply
        }
        Err(error) => {
            #[cfg(feature = "tracing")]
            tracing::debug!("Request for {key:?} failed: {error}");
            ApiError::new(error, request_id).into_response()
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    match state.database.health_check().await {
        Ok(()) => {
            let stats = state.database.stats();
            Json(HealthReport {
                status: "healthy",
                database_queries: Some(stats.queries),
                database_errors: Some(stats.errors),
                error: None,
                timestamp: unix_millis(),
            })
            .into_response()
        }
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthReport {
                status: "unhealthy",
                database_queries: None,
                database_errors: None,
                error: Some(err.to_string()),
                timestamp: unix_millis(),
            }),
        )
            .into_response(),
    }
}

/// `GET /metrics[?format=prometheus]`
pub async fn metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    if query.format.as_deref() == Some("prometheus") {
        let body = state
            .collector
            .render_prometheus(METRICS_NAMESPACE, state.pattern.name());
        (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response()
    } else {
        Json(state.collector.snapshot()).into_response()
    }
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Response {
    Json(state.pool.status()).into_response()
}

/// `GET /`
pub async fn info(State(state): State<AppState>) -> Response {
    Json(ServiceInfo {
        name: "triage",
        version: env!("CARGO_PKG_VERSION"),
        pattern: state.pattern.name(),
        endpoints: Endpoints {
            patients: "/api/v1/patients?id=<patient_id>",
            health: "/health",
            metrics: "/metrics (add ?format=prometheus for the text exposition format)",
            status: "/status",
        },
        examples: [
            "curl http://localhost:8080/api/v1/patients?id=P12345",
            "curl http://localhost:8080/health",
            "curl http://localhost:8080/metrics",
            "curl http://localhost:8080/status",
        ],
    })
    .into_response()
}
