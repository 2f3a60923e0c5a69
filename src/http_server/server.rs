//! HTTP Server Composition
//!
//! Combines the application's router with the probe endpoints and the
//! coordination middleware. Probe routes sit outside the middleware stack;
//! the split-brain gate wraps the forwarding layer, which wraps the
//! application.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tracing::info;

use crate::metrics::MetricsRegistry;

use super::middleware::{
    forwarding_middleware, split_brain_middleware, ForwardGate, SplitBrainGate,
};
use super::probes::{metrics_routes, probe_routes, ProbeState};

/// Wrap an application router with the coordination layers and merge the
/// probe endpoints (and, when a registry is wired, `/metrics`) alongside
/// it.
pub fn cluster_router(
    app: Router,
    probes: ProbeState,
    split_brain: SplitBrainGate,
    forward: Option<ForwardGate>,
    metrics: Option<Arc<MetricsRegistry>>,
) -> Router {
    let mut app = app;
    if let Some(gate) = forward {
        app = app.layer(middleware::from_fn_with_state(gate, forwarding_middleware));
    }
    // Added last so it runs first: forwarding is never attempted during
    // split-brain.
    app = app.layer(middleware::from_fn_with_state(
        split_brain,
        split_brain_middleware,
    ));

    let mut router = Router::new().merge(probe_routes(probes));
    if let Some(registry) = metrics {
        router = router.merge(metrics_routes(registry));
    }
    router.merge(app)
}

/// HTTP server for the composed adapter router.
pub struct AdapterServer {
    addr: SocketAddr,
    router: Router,
}

impl AdapterServer {
    pub fn new(addr: SocketAddr, router: Router) -> Self {
        Self { addr, router }
    }

    /// Get the router (for testing).
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until the task is cancelled.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "cluster adapter listening");
        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}
