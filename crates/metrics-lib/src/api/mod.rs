//! HTTP surface of the metrics API server
//!
//! - `/apis/...` serves installed API groups (see [`apis`])
//! - `/healthz`, `/readyz` and `/metrics` for probes and Prometheus
//! - `POST /api/v1/batches` accepts metric batches into the in-memory sink

pub mod apis;
pub mod status;

pub use status::{ApiError, Status};

use crate::health::{ComponentStatus, HealthRegistry};
use crate::observability::{ApiServerMetrics, StructuredLogger};
use crate::server::GenericApiServer;
use crate::sink::{MemoryMetricsSink, MetricsBatch};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    /// Frozen after group installation
    pub server: Arc<GenericApiServer>,
    pub sink: Arc<MemoryMetricsSink>,
    pub health_registry: HealthRegistry,
    pub metrics: ApiServerMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        server: Arc<GenericApiServer>,
        sink: Arc<MemoryMetricsSink>,
        health_registry: HealthRegistry,
        metrics: ApiServerMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            server,
            sink,
            health_registry,
            metrics,
            logger,
        }
    }
}

/// Health check response - 200 if healthy or degraded, 503 if unhealthy
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

/// Prometheus metrics endpoint
async fn prometheus_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    entities: usize,
    samples: usize,
    updated: usize,
}

/// Accept one metric batch into the sink
async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<MetricsBatch>,
) -> impl IntoResponse {
    let entities = batch.entities.len();
    let samples = batch.sample_count();
    let updated = state.sink.ingest(batch);

    let stats = state.sink.stats();
    state.metrics.inc_sink_batches();
    state
        .metrics
        .set_sink_size(stats.entities as i64, stats.samples as i64);
    state.logger.log_batch_ingested(entities, samples, updated);

    state.sink.report_health(&state.health_registry).await;

    (
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            entities,
            samples,
            updated,
        }),
    )
}

/// Create the full API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(prometheus_metrics))
        .route("/api/v1/batches", post(ingest_batch))
        .route("/apis", get(apis::list_groups))
        .route("/apis/*path", get(apis::serve))
        .with_state(state)
}
