//! Forwarding Transport
//!
//! The outbound HTTP seam of the forwarding engine. The engine never talks
//! to the network directly; it sends [`ForwardRequest`]s through this port
//! and receives [`ForwardResponse`]s or [`TransportError`]s back, which is
//! what makes the retry and breaker logic testable without sockets.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use thiserror::Error;

/// One outbound request to the primary.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// The primary's response, verbatim.
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ForwardResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: http::header::HeaderName, value: &str) -> Self {
        if let Ok(value) = http::HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }
}

/// Outbound transport failure. All variants occur before response headers
/// were received, so all are safe to retry.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The exchange exceeded a timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Any other transport failure.
    #[error("transport failed: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Port for sending forwarded requests.
#[async_trait]
pub trait ForwardTransport: Send + Sync {
    async fn send(&self, request: ForwardRequest) -> Result<ForwardResponse, TransportError>;
}

/// reqwest-backed transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given connect timeout. The read timeout
    /// is applied per request.
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ForwardTransport for ReqwestTransport {
    async fn send(&self, request: ForwardRequest) -> Result<ForwardResponse, TransportError> {
        let response = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body)
            .timeout(request.read_timeout)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?;

        Ok(ForwardResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(TransportError::Timeout("t".into()).is_timeout());
        assert!(!TransportError::Connect("c".into()).is_timeout());
        assert!(!TransportError::Other("o".into()).is_timeout());
    }

    #[test]
    fn test_response_builder_helpers() {
        let response = ForwardResponse::new(StatusCode::CREATED)
            .with_body("ok")
            .with_header(http::header::CONTENT_TYPE, "text/plain");
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.body.as_ref(), b"ok");
        assert_eq!(
            response.headers.get(http::header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
    }
}
