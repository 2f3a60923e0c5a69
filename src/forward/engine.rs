//! Forwarding Engine
//!
//! Forwards mutating requests from replicas to the primary, preserving
//! method, path, query, body and headers, with bounded retries and a
//! circuit breaker in front of the outbound transport.
//!
//! Everything that can go wrong outbound is converted into an HTTP
//! response here; transport failures never escape to the framework layer.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::{HeaderName, CONTENT_LENGTH, HOST, RETRY_AFTER, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{ConfigResult, ForwardingSettings};
use crate::role::RoleResolver;

use super::breaker::{BreakerDecision, CircuitBreaker, CircuitState};
use super::exclusion::PathExclusionMatcher;
use super::retry::RetryPolicy;
use super::transport::{ForwardRequest, ForwardResponse, ForwardTransport, TransportError};

/// Marks a response as having been forwarded to the primary.
pub const FORWARDED_HEADER: HeaderName = HeaderName::from_static("x-litefs-forwarded");

/// Names the primary the request was forwarded to.
pub const PRIMARY_NODE_HEADER: HeaderName = HeaderName::from_static("x-litefs-primary-node");

/// Distinguishes upstream transport failure from upstream timeout.
pub const FORWARDING_ERROR_HEADER: HeaderName =
    HeaderName::from_static("x-litefs-forwarding-error");

/// De-duplication key, stable across every attempt of one inbound request.
pub const IDEMPOTENCY_KEY_HEADER: HeaderName = HeaderName::from_static("x-idempotency-key");

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// The inbound request as seen by the engine, already buffered.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: Option<IpAddr>,
    /// Scheme the client used, for `X-Forwarded-Proto`.
    pub scheme: String,
}

/// Response produced by the engine, framework-free.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl EngineResponse {
    fn unavailable(body: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            headers: HeaderMap::new(),
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    fn with_retry_after(mut self, seconds: u64) -> Self {
        if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
            self.headers.insert(RETRY_AFTER, value);
        }
        self
    }

    fn gateway_failure(status: StatusCode, error_kind: &'static str, body: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDING_ERROR_HEADER, HeaderValue::from_static(error_kind));
        Self {
            status,
            headers,
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }
}

/// Methods that never mutate and are therefore always served locally.
const SAFE_METHODS: [Method; 3] = [Method::GET, Method::HEAD, Method::OPTIONS];

enum AttemptFailure {
    Transport(TransportError),
    GatewayStatus(StatusCode),
}

/// Replica-to-primary write forwarding.
pub struct ForwardingEngine {
    settings: ForwardingSettings,
    role: Arc<RoleResolver>,
    exclusions: PathExclusionMatcher,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    transport: Arc<dyn ForwardTransport>,
}

impl ForwardingEngine {
    /// Build an engine from validated settings. Constructed once at
    /// startup; the breaker state lives for the engine's lifetime.
    pub fn new(
        settings: ForwardingSettings,
        role: Arc<RoleResolver>,
        transport: Arc<dyn ForwardTransport>,
    ) -> ConfigResult<Self> {
        let exclusions = PathExclusionMatcher::from_settings(&settings)?;
        let retry = RetryPolicy::new(
            settings.retry_count,
            settings.retry_backoff_base,
            settings.max_backoff,
        );
        let breaker = CircuitBreaker::new(
            settings.circuit_breaker_threshold,
            settings.circuit_reset_timeout,
        );
        Ok(Self {
            settings,
            role,
            exclusions,
            retry,
            breaker,
            transport,
        })
    }

    /// Whether this request must be forwarded instead of served locally.
    pub fn should_forward(&self, method: &Method, path: &str) -> bool {
        if !self.settings.enabled {
            return false;
        }
        if self.role.is_primary() {
            return false;
        }
        if SAFE_METHODS.contains(method) {
            return false;
        }
        if self.exclusions.is_excluded(path) {
            return false;
        }
        true
    }

    /// Forward one request to the primary and produce the client response.
    ///
    /// A request admitted as the breaker's half-open probe makes exactly
    /// one outbound attempt, whatever the retry budget says. Other
    /// requests stop retrying as soon as the breaker is no longer closed,
    /// so a circuit tripped by a concurrent request cuts retry loops
    /// short.
    pub async fn forward(&self, request: InboundRequest) -> EngineResponse {
        let probing = match self.breaker.should_allow(Instant::now()) {
            BreakerDecision::Allow => false,
            BreakerDecision::AllowProbe => true,
            BreakerDecision::Reject { retry_after } => {
                debug!("forwarding rejected: circuit breaker open");
                let seconds =
                    retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                return EngineResponse::unavailable(
                    "forwarding suspended: circuit breaker is open",
                )
                .with_retry_after(seconds);
            }
        };

        let Some(authority) = self.primary_authority() else {
            warn!("cannot forward write: primary node unknown");
            // The probe slot must not leak when no attempt was made.
            if probing {
                self.breaker.record_failure(Instant::now());
            }
            return EngineResponse::unavailable("cannot forward request: primary node unknown");
        };

        let outbound = self.build_outbound(&request, &authority);
        let max_attempts = if probing {
            // One cautious probe against the recovering primary.
            1
        } else {
            self.retry.max_attempts()
        };
        let mut failure = None;
        let mut aborted = false;

        for attempt in 1..=max_attempts {
            match self.transport.send(outbound.clone()).await {
                Ok(response) if !RetryPolicy::is_retryable_status(response.status) => {
                    self.breaker.record_success();
                    return self.passthrough(response, &authority);
                }
                Ok(response) => {
                    debug!(
                        status = response.status.as_u16(),
                        attempt, "gateway status from primary; will retry if attempts remain"
                    );
                    failure = Some(AttemptFailure::GatewayStatus(response.status));
                }
                Err(error) => {
                    warn!(error = %error, attempt, "forward attempt failed");
                    failure = Some(AttemptFailure::Transport(error));
                }
            }
            if attempt < max_attempts {
                if !self.breaker.is_disabled()
                    && self.breaker.state() != CircuitState::Closed
                {
                    debug!("circuit no longer closed; abandoning remaining retries");
                    aborted = true;
                    break;
                }
                tokio::time::sleep(self.retry.backoff(attempt)).await;
            }
        }

        if !aborted {
            self.breaker.record_failure(Instant::now());
        }
        match failure {
            Some(AttemptFailure::Transport(error)) if error.is_timeout() => {
                EngineResponse::gateway_failure(
                    StatusCode::GATEWAY_TIMEOUT,
                    "timeout",
                    "primary did not respond in time",
                )
            }
            Some(AttemptFailure::GatewayStatus(status)) => EngineResponse::gateway_failure(
                StatusCode::BAD_GATEWAY,
                "upstream",
                &format!("primary kept answering {status} after retries"),
            ),
            _ => EngineResponse::gateway_failure(
                StatusCode::BAD_GATEWAY,
                "upstream",
                "could not reach primary after retries",
            ),
        }
    }

    /// The primary's authority: marker content first, configured hint as
    /// fallback. None means no primary is known.
    fn primary_authority(&self) -> Option<String> {
        self.role
            .primary_url()
            .or_else(|| self.settings.primary_hint.clone())
    }

    fn build_outbound(&self, request: &InboundRequest, authority: &str) -> ForwardRequest {
        let mut url = format!(
            "{}://{}{}",
            self.settings.scheme.as_str(),
            authority,
            request.path
        );
        if let Some(query) = &request.query {
            url.push('?');
            url.push_str(query);
        }

        let original_host = request
            .headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut headers = HeaderMap::with_capacity(request.headers.len() + 4);
        for (name, value) in &request.headers {
            // Host is rewritten below; framing headers are recomputed by
            // the transport.
            if *name == HOST || *name == CONTENT_LENGTH || *name == TRANSFER_ENCODING {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        if let Ok(value) = HeaderValue::from_str(authority) {
            headers.insert(HOST, value);
        }

        if let Some(client_ip) = request.client_ip {
            let forwarded_for = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok())
            {
                Some(existing) => format!("{existing}, {client_ip}"),
                None => client_ip.to_string(),
            };
            if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }

        if let Some(host) = original_host {
            if let Ok(value) = HeaderValue::from_str(&host) {
                headers.insert(X_FORWARDED_HOST, value);
            }
        }

        if let Ok(value) = HeaderValue::from_str(&request.scheme) {
            headers.insert(X_FORWARDED_PROTO, value);
        }

        if !headers.contains_key(IDEMPOTENCY_KEY_HEADER) {
            // Generated once per inbound request; retries reuse it.
            let key = Uuid::new_v4().to_string();
            if let Ok(value) = HeaderValue::from_str(&key) {
                headers.insert(IDEMPOTENCY_KEY_HEADER, value);
            }
        }

        ForwardRequest {
            method: request.method.clone(),
            url,
            headers,
            body: request.body.clone(),
            connect_timeout: self.settings.connect_timeout,
            read_timeout: self.settings.read_timeout,
        }
    }

    /// Return the primary's response verbatim plus forwarding markers.
    fn passthrough(&self, response: ForwardResponse, authority: &str) -> EngineResponse {
        let mut headers = response.headers;
        headers.insert(FORWARDED_HEADER, HeaderValue::from_static("true"));
        if let Ok(value) = HeaderValue::from_str(authority) {
            headers.insert(PRIMARY_NODE_HEADER, value);
        }
        EngineResponse {
            status: response.status,
            headers,
            body: response.body,
        }
    }
}
