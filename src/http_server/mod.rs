//! HTTP Layer
//!
//! Probe endpoints, the split-brain and forwarding middleware, and the
//! server composition that wires them around an application router.

mod middleware;
mod probes;
mod server;

pub use middleware::{
    forwarding_middleware, split_brain_middleware, ForwardGate, SplitBrainGate,
};
pub use probes::{metrics_routes, probe_routes, ProbeState};
pub use server::{cluster_router, AdapterServer};
