//! Configuration Error Types
//!
//! Every settings invariant is enforced at construction time. A violated
//! invariant is fatal at startup: callers are expected to propagate these
//! errors out of their composition root rather than continue with a
//! half-valid configuration.

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A path setting is not absolute
    #[error("{field} must be an absolute path, got: {value}")]
    RelativePath { field: &'static str, value: String },

    /// A path setting contains a `..` segment
    #[error("{field} contains path traversal, got: {value}")]
    PathTraversal { field: &'static str, value: String },

    /// A required string setting is empty or whitespace-only
    #[error("{0} cannot be empty or whitespace-only")]
    EmptyField(&'static str),

    /// leader_election is neither `static` nor `raft`
    #[error("leader_election must be 'static' or 'raft', got: {0}")]
    InvalidLeaderElection(String),

    /// A setting required by the selected leader-election mode is missing
    #[error("{field} is required when leader_election is '{mode}'")]
    MissingModeField { field: &'static str, mode: &'static str },

    /// A settings document contains a key the parser does not recognize
    #[error("unknown setting: {0}")]
    UnknownKey(String),

    /// A setting has the wrong type or an out-of-range value
    #[error("{field} must be {requirement}, got: {value}")]
    InvalidValue {
        field: &'static str,
        requirement: &'static str,
        value: String,
    },

    /// The daemon configuration document could not be rendered or parsed
    #[error("invalid daemon config: {message}")]
    DaemonConfig {
        message: String,
        #[source]
        source: Option<serde_yaml::Error>,
    },
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid_value(
        field: &'static str,
        requirement: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field,
            requirement,
            value: value.into(),
        }
    }

    /// Create a daemon-config error without an underlying cause.
    pub fn daemon_config(message: impl Into<String>) -> Self {
        Self::DaemonConfig {
            message: message.into(),
            source: None,
        }
    }

    /// Create a daemon-config error preserving the YAML cause.
    pub fn daemon_yaml(message: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::DaemonConfig {
            message: message.into(),
            source: Some(source),
        }
    }
}
