//! Mount Error Types

use std::fmt;
use std::io;

/// Result type for mount operations
pub type MountResult<T> = Result<T, MountError>;

/// Mount observation error
#[derive(Debug)]
pub struct MountError {
    /// Error kind
    kind: MountErrorKind,
    /// Error message
    message: String,
    /// Originating I/O error, when there is one
    source: Option<io::Error>,
}

/// Mount error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountErrorKind {
    /// The replicated filesystem is not mounted at the configured path.
    /// Fatal for the affected request; the process keeps re-checking.
    InfrastructureUnavailable,

    /// The mount is present but an operation on it failed
    Io,
}

impl MountError {
    /// Create an infrastructure-unavailable error naming the mount path.
    pub fn infrastructure_unavailable(mount_path: &std::path::Path) -> Self {
        Self {
            kind: MountErrorKind::InfrastructureUnavailable,
            message: format!(
                "replicated filesystem is not mounted at {}; the replication daemon may not be running",
                mount_path.display()
            ),
            source: None,
        }
    }

    /// Create an I/O error preserving its cause.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            kind: MountErrorKind::Io,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> MountErrorKind {
        self.kind
    }

    /// Whether this is an infrastructure-unavailable error.
    pub fn is_infrastructure_unavailable(&self) -> bool {
        self.kind == MountErrorKind::InfrastructureUnavailable
    }
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for MountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as _)
    }
}
