//! HTTP API for health checks, the container stats view and Prometheus metrics

use crate::error::StoreError;
use crate::health::{ComponentStatus, HealthRegistry};
use crate::storage::SampleStore;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SampleStore>,
    pub health_registry: HealthRegistry,
    /// Holds the store collector and the agent self-metrics
    pub registry: Registry,
}

impl AppState {
    pub fn new(
        store: Arc<SampleStore>,
        health_registry: HealthRegistry,
        registry: Registry,
    ) -> Self {
        Self {
            store,
            health_registry,
            registry,
        }
    }
}

/// Health check response - returns 200 if operational, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// `/api/` without a resource lists the supported ones
async fn api_index() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        "Supported request types: \"containers\"",
    )
}

async fn list_containers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.get_all())
}

async fn get_container(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    match state.store.get(&name) {
        Ok(record) => Json(record).into_response(),
        Err(StoreError::NotFound(name)) => (
            StatusCode::NOT_FOUND,
            format!("unknown container {:?}", name),
        )
            .into_response(),
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Create the API router; metrics are served at `prometheus_endpoint`
pub fn create_router(state: Arc<AppState>, prometheus_endpoint: &str) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api", get(api_index))
        .route("/api/", get(api_index))
        .route("/api/containers", get(list_containers))
        .route("/api/containers/:name", get(get_container))
        .route(prometheus_endpoint, get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(
    addr: SocketAddr,
    prometheus_endpoint: String,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let app = create_router(state, &prometheus_endpoint);

    info!(addr = %addr, metrics_path = %prometheus_endpoint, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
