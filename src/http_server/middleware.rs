//! Request Middleware
//!
//! Two layers, applied so the split-brain gate always runs before
//! forwarding:
//!
//! 1. Split-brain gate: while two or more leaders are observed, every
//!    request is answered `503` with `Retry-After: 30`. Detection failures
//!    fail open, so a broken detector cannot take the service down.
//! 2. Write forwarding: mutating requests on a replica are buffered and
//!    handed to the forwarding engine; everything else passes through.

use std::net::SocketAddr;

use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::error;

use crate::cluster::SplitBrainDetector;
use crate::forward::{EngineResponse, ForwardingEngine, InboundRequest};

/// State for the split-brain layer. A missing detector (static mode, or
/// detection not wired) passes every request through.
#[derive(Clone, Default)]
pub struct SplitBrainGate {
    pub detector: Option<Arc<SplitBrainDetector>>,
}

impl SplitBrainGate {
    pub fn new(detector: Arc<SplitBrainDetector>) -> Self {
        Self {
            detector: Some(detector),
        }
    }

    pub fn disabled() -> Self {
        Self { detector: None }
    }
}

/// Blocks every request with `503` while the cluster has multiple leaders.
pub async fn split_brain_middleware(
    State(gate): State<SplitBrainGate>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(detector) = &gate.detector {
        // check() fails open on detector errors and emits the detection
        // event when one is observed.
        if let Some(detection) = detector.check() {
            error!(
                leaders = detection.conflicting_leaders.len(),
                "split-brain detected; refusing request"
            );
            let body = format!(
                "Service Unavailable: cluster split-brain detected, {} nodes claim leadership ({}). \
                 Check cluster state before retrying.",
                detection.conflicting_leaders.len(),
                detection.conflicting_leaders.join(", ")
            );
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, HeaderValue::from_static("30"))],
                body,
            )
                .into_response();
        }
    }
    next.run(request).await
}

/// State for the forwarding layer.
#[derive(Clone)]
pub struct ForwardGate {
    pub engine: Arc<ForwardingEngine>,
}

impl ForwardGate {
    pub fn new(engine: Arc<ForwardingEngine>) -> Self {
        Self { engine }
    }
}

/// Forwards mutating requests from replicas to the primary.
pub async fn forwarding_middleware(
    State(gate): State<ForwardGate>,
    request: Request,
    next: Next,
) -> Response {
    if !gate
        .engine
        .should_forward(request.method(), request.uri().path())
    {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "could not buffer request body for forwarding");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    let inbound = InboundRequest {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers.clone(),
        body: bytes,
        client_ip,
        scheme: parts
            .uri
            .scheme_str()
            .unwrap_or("http")
            .to_string(),
    };

    into_response(gate.engine.forward(inbound).await)
}

fn into_response(engine_response: EngineResponse) -> Response {
    let mut response = Response::builder()
        .status(engine_response.status)
        .body(Body::from(engine_response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    response.headers_mut().extend(engine_response.headers);
    response
}
