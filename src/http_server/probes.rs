//! Probe Endpoints
//!
//! `GET /liveness`, `GET /readiness` and `GET /health`, all JSON. Probe
//! routes are served directly, before the split-brain and forwarding
//! middleware, so schedulers can always reach them.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::health::{LivenessChecker, ReadinessChecker, StatusReporter};
use crate::metrics::MetricsRegistry;

/// Shared state for the probe handlers.
#[derive(Clone)]
pub struct ProbeState {
    pub liveness: Arc<LivenessChecker>,
    pub readiness: Arc<ReadinessChecker>,
    pub status: Arc<StatusReporter>,
}

/// Router serving the three probe endpoints.
pub fn probe_routes(state: ProbeState) -> Router {
    Router::new()
        .route("/liveness", get(liveness_handler))
        .route("/readiness", get(readiness_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn liveness_handler(State(state): State<ProbeState>) -> impl IntoResponse {
    let report = state.liveness.check();
    let status = if report.is_live {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn readiness_handler(State(state): State<ProbeState>) -> impl IntoResponse {
    let report = state.readiness.check();
    let status = if report.is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn health_handler(State(state): State<ProbeState>) -> impl IntoResponse {
    let report = state.status.check();
    let status = if report.error.is_none() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Router serving the gauge registry as JSON.
pub fn metrics_routes(registry: Arc<MetricsRegistry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry)
}

async fn metrics_handler(State(registry): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
    (StatusCode::OK, Json(registry.snapshot()))
}
