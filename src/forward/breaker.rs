//! Circuit Breaker
//!
//! Stops outbound attempts after sustained failure, with timed recovery
//! probes. One breaker per engine instance.
//!
//! State machine:
//! - closed: attempts allowed; a success resets the failure count, the
//!   Nth consecutive failure opens the circuit.
//! - open: attempts rejected until `reset_timeout` has elapsed since the
//!   circuit opened; the first request after that claims the single
//!   half-open probe slot.
//! - half-open: exactly one probe is in flight; every other request is
//!   rejected until the probe's outcome is recorded. Probe success
//!   closes, probe failure reopens and restarts the clock.
//!
//! A threshold of zero disables the breaker: every request attempts.
//!
//! Time is passed in by the caller, which keeps the state machine
//! deterministic under test.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Outcome of asking the breaker whether to attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerDecision {
    /// Attempt the request normally.
    Allow,
    /// Attempt the request as the single half-open probe. The caller must
    /// make exactly one outbound attempt and report its outcome.
    AllowProbe,
    /// Reject without attempting; retry after the given remainder of the
    /// reset window (zero while a probe's outcome is pending).
    Reject { retry_after: Duration },
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// The half-open probe slot: claimed by the first caller after the
    /// reset window, released when an outcome is recorded.
    probe_in_flight: bool,
}

/// Failure-counting circuit breaker.
pub struct CircuitBreaker {
    threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            threshold,
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Threshold zero means the breaker never opens.
    pub fn is_disabled(&self) -> bool {
        self.threshold == 0
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Decide whether a request arriving at `now` may attempt.
    ///
    /// The open-to-half-open transition and the probe-slot claim happen
    /// atomically here, so exactly one caller receives
    /// [`BreakerDecision::AllowProbe`] per recovery window.
    pub fn should_allow(&self, now: Instant) -> BreakerDecision {
        if self.is_disabled() {
            return BreakerDecision::Allow;
        }

        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => BreakerDecision::Allow,
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    BreakerDecision::Reject {
                        retry_after: Duration::ZERO,
                    }
                } else {
                    inner.probe_in_flight = true;
                    BreakerDecision::AllowProbe
                }
            }
            CircuitState::Open => {
                let opened_at = inner
                    .opened_at
                    .expect("open circuit records its opening time");
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    info!("circuit breaker half-open: allowing one probe");
                    BreakerDecision::AllowProbe
                } else {
                    BreakerDecision::Reject {
                        retry_after: self.reset_timeout - elapsed,
                    }
                }
            }
        }
    }

    /// Record a successful forward.
    pub fn record_success(&self) {
        if self.is_disabled() {
            return;
        }
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            info!("circuit breaker closed after successful probe");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    /// Record a forward whose final outcome was failure.
    pub fn record_failure(&self, now: Instant) {
        if self.is_disabled() {
            return;
        }
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                warn!("circuit breaker reopened after failed probe");
                inner.state = CircuitState::Open;
                inner.consecutive_failures += 1;
                inner.opened_at = Some(now);
                inner.probe_in_flight = false;
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                }
            }
            // No attempts happen while open; a straggling failure report
            // keeps the circuit open without restarting the clock.
            CircuitState::Open => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(3, Duration::from_secs(30))
    }

    #[test]
    fn test_closed_allows() {
        let breaker = breaker();
        assert_eq!(breaker.should_allow(Instant::now()), BreakerDecision::Allow);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = breaker();
        let now = Instant::now();
        breaker.record_failure(now);
        breaker.record_failure(now);
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);
        breaker.record_failure(now);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_opens_at_threshold() {
        let breaker = breaker();
        let now = Instant::now();
        breaker.record_failure(now);
        breaker.record_failure(now);
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure(now);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_open_rejects_with_remaining_time() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let opened = Instant::now();
        breaker.record_failure(opened);

        match breaker.should_allow(opened + Duration::from_secs(10)) {
            BreakerDecision::Reject { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(20));
            }
            other => panic!("open circuit must reject, got {other:?}"),
        }
    }

    #[test]
    fn test_open_grants_single_probe_after_reset_timeout() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let opened = Instant::now();
        breaker.record_failure(opened);

        let after_reset = opened + Duration::from_secs(30);
        assert_eq!(
            breaker.should_allow(after_reset),
            BreakerDecision::AllowProbe
        );
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_only_one_probe_at_a_time() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let opened = Instant::now();
        breaker.record_failure(opened);

        let after_reset = opened + Duration::from_secs(31);
        assert_eq!(
            breaker.should_allow(after_reset),
            BreakerDecision::AllowProbe
        );

        // Every further request is rejected until the probe reports.
        for _ in 0..3 {
            match breaker.should_allow(after_reset) {
                BreakerDecision::Reject { retry_after } => {
                    assert_eq!(retry_after, Duration::ZERO);
                }
                other => panic!("pending probe must reject others, got {other:?}"),
            }
        }

        // Probe succeeded: the circuit closes and requests flow again.
        breaker.record_success();
        assert_eq!(breaker.should_allow(after_reset), BreakerDecision::Allow);
    }

    #[test]
    fn test_half_open_probe_success_closes() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let opened = Instant::now();
        breaker.record_failure(opened);
        breaker.should_allow(opened + Duration::from_secs(31));

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn test_half_open_probe_failure_reopens_and_restarts_clock() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let opened = Instant::now();
        breaker.record_failure(opened);
        assert_eq!(
            breaker.should_allow(opened + Duration::from_secs(31)),
            BreakerDecision::AllowProbe
        );

        let reopened = opened + Duration::from_secs(32);
        breaker.record_failure(reopened);
        assert_eq!(breaker.state(), CircuitState::Open);

        // Clock restarted: still rejecting just before the new window ends.
        match breaker.should_allow(reopened + Duration::from_secs(29)) {
            BreakerDecision::Reject { .. } => {}
            other => panic!("reopened circuit must restart its clock, got {other:?}"),
        }
        assert_eq!(
            breaker.should_allow(reopened + Duration::from_secs(30)),
            BreakerDecision::AllowProbe
        );
    }

    #[test]
    fn test_disabled_breaker_never_opens() {
        let breaker = CircuitBreaker::new(0, Duration::from_secs(30));
        let now = Instant::now();
        for _ in 0..100 {
            breaker.record_failure(now);
        }
        assert!(breaker.is_disabled());
        assert_eq!(breaker.should_allow(now), BreakerDecision::Allow);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
