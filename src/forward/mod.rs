//! Write Forwarding
//!
//! HTTP forwarding of mutating requests from replicas to the primary:
//! path exclusions, bounded retries with exponential backoff, a circuit
//! breaker, and full request/response preservation.

mod breaker;
mod engine;
mod exclusion;
mod retry;
mod transport;

pub use breaker::{BreakerDecision, CircuitBreaker, CircuitState};
pub use engine::{
    EngineResponse, ForwardingEngine, InboundRequest, FORWARDED_HEADER,
    FORWARDING_ERROR_HEADER, IDEMPOTENCY_KEY_HEADER, PRIMARY_NODE_HEADER,
};
pub use exclusion::PathExclusionMatcher;
pub use retry::RetryPolicy;
pub use transport::{
    ForwardRequest, ForwardResponse, ForwardTransport, ReqwestTransport, TransportError,
};
