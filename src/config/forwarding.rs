//! Write-Forwarding Settings
//!
//! Tuning for the replica-to-primary forwarding engine: timeouts, retry
//! policy, circuit breaker and path exclusions. Immutable after
//! construction; invariants are checked by [`ForwardingSettings::validate`],
//! which every factory runs before handing the value out.

use std::collections::BTreeSet;
use std::time::Duration;

use super::errors::{ConfigError, ConfigResult};

/// Scheme used for outbound forwarded requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardScheme {
    Http,
    Https,
}

impl ForwardScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Parse a scheme string. Anything other than `http`/`https` is rejected.
    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(ConfigError::invalid_value(
                "scheme",
                "'http' or 'https'",
                other,
            )),
        }
    }
}

/// Settings for the forwarding engine.
///
/// `retry_count = 0` disables retries (a single attempt is still made).
/// `circuit_breaker_threshold = 0` disables the breaker entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingSettings {
    /// Master switch; when false the engine passes every request through.
    pub enabled: bool,

    /// TCP connect timeout for outbound requests.
    pub connect_timeout: Duration,

    /// Read timeout for outbound requests (covers the full exchange).
    pub read_timeout: Duration,

    /// Number of retries after the initial attempt.
    pub retry_count: u32,

    /// Base delay for exponential backoff between attempts.
    pub retry_backoff_base: Duration,

    /// Upper bound applied to the computed backoff delay.
    pub max_backoff: Duration,

    /// Consecutive failures before the circuit opens. 0 disables the breaker.
    pub circuit_breaker_threshold: u32,

    /// How long an open circuit stays open before a probe is allowed.
    pub circuit_reset_timeout: Duration,

    /// Paths excluded from forwarding by exact match.
    pub excluded_exact: BTreeSet<String>,

    /// Paths excluded from forwarding by glob pattern (`*` one segment,
    /// `**` any depth).
    pub excluded_glob: Vec<String>,

    /// Paths excluded from forwarding by regular expression.
    pub excluded_regex: Vec<String>,

    /// Scheme used when building the outbound URL.
    pub scheme: ForwardScheme,

    /// Explicit primary authority, used when the marker cannot supply one.
    pub primary_hint: Option<String>,
}

impl Default for ForwardingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            retry_count: 1,
            retry_backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            circuit_breaker_threshold: 5,
            circuit_reset_timeout: Duration::from_secs(30),
            excluded_exact: BTreeSet::new(),
            excluded_glob: Vec::new(),
            excluded_regex: Vec::new(),
            scheme: ForwardScheme::Http,
            primary_hint: None,
        }
    }
}

impl ForwardingSettings {
    /// Validate timing invariants.
    ///
    /// Timeouts and backoff must be positive; the retry count and breaker
    /// threshold are unsigned and therefore always in range.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::invalid_value(
                "connect_timeout",
                "positive",
                "0",
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::invalid_value("read_timeout", "positive", "0"));
        }
        if self.retry_backoff_base.is_zero() {
            return Err(ConfigError::invalid_value(
                "retry_backoff_base",
                "positive",
                "0",
            ));
        }
        if self.max_backoff.is_zero() {
            return Err(ConfigError::invalid_value("max_backoff", "positive", "0"));
        }
        if self.circuit_reset_timeout.is_zero() {
            return Err(ConfigError::invalid_value(
                "circuit_reset_timeout",
                "positive",
                "0",
            ));
        }
        if let Some(hint) = &self.primary_hint {
            if hint.trim().is_empty() {
                return Err(ConfigError::EmptyField("primary_hint"));
            }
        }
        Ok(())
    }

    /// Whether the circuit breaker is active.
    pub fn breaker_enabled(&self) -> bool {
        self.circuit_breaker_threshold > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ForwardingSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_connect_timeout_rejected() {
        let settings = ForwardingSettings {
            connect_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_threshold_disables_breaker() {
        let settings = ForwardingSettings {
            circuit_breaker_threshold: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
        assert!(!settings.breaker_enabled());
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!(ForwardScheme::parse("http").unwrap(), ForwardScheme::Http);
        assert_eq!(ForwardScheme::parse("https").unwrap(), ForwardScheme::Https);
        assert!(ForwardScheme::parse("ftp").is_err());
    }

    #[test]
    fn test_whitespace_primary_hint_rejected() {
        let settings = ForwardingSettings {
            primary_hint: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
