//! Retry Policy
//!
//! Bounded retries with exponential backoff for forwarded requests.
//!
//! Only two failure classes are retried: transport failures that occur
//! before response headers arrive, and gateway statuses 502, 503 and 504.
//! Everything else, including other 5xx statuses, is returned to the
//! client as-is.

use std::time::Duration;

use http::StatusCode;

use super::transport::TransportError;

/// Retry configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
            max_backoff,
        }
    }

    /// Total attempts: the initial one plus `max_retries`.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff before the attempt following failed attempt number
    /// `attempt` (1-indexed): `base * 2^(attempt - 1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.backoff_base.saturating_mul(factor);
        delay.min(self.max_backoff)
    }

    /// Gateway statuses worth retrying. 4xx and non-gateway 5xx are not.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        )
    }

    /// Transport failures all happen before headers were received, so all
    /// are retryable.
    pub fn is_retryable_error(_error: &TransportError) -> bool {
        true
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, Duration::from_secs(1), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_retries_means_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(30));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(8), Duration::from_secs(4));
    }

    #[test]
    fn test_retryable_statuses_are_exactly_the_gateway_set() {
        assert!(RetryPolicy::is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(RetryPolicy::is_retryable_status(
            StatusCode::SERVICE_UNAVAILABLE
        ));
        assert!(RetryPolicy::is_retryable_status(StatusCode::GATEWAY_TIMEOUT));

        assert!(!RetryPolicy::is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!RetryPolicy::is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!RetryPolicy::is_retryable_status(
            StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(!RetryPolicy::is_retryable_status(
            StatusCode::NOT_IMPLEMENTED
        ));
        assert!(!RetryPolicy::is_retryable_status(StatusCode::OK));
    }
}
