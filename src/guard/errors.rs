//! Write-Guard Error Types
//!
//! Guard rejections surface to the caller verbatim and are never retried
//! inside the core. Messages carry enough context for operators: the role
//! for a rejected replica write, the leader count for a split-brain
//! rejection.

use std::error::Error;
use std::fmt;

/// Result type for guarded execution
pub type GuardResult<T> = Result<T, GuardError>;

/// Write-path rejection
#[derive(Debug)]
pub struct GuardError {
    kind: GuardErrorKind,
    message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

/// Guard error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardErrorKind {
    /// Two or more leaders were observed; no write may proceed anywhere.
    SplitBrain,

    /// This node is a replica; only the primary accepts writes.
    NotPrimary,

    /// The split-brain detector could not be queried. Refusing the write
    /// is safer than risking divergence.
    Detection,
}

impl GuardError {
    /// Split-brain rejection naming the conflicting leaders.
    pub fn split_brain(leaders: &[String]) -> Self {
        Self {
            kind: GuardErrorKind::SplitBrain,
            message: format!(
                "write rejected: split-brain detected, {} nodes claim leadership ({}); \
                 writes are blocked until the cluster converges",
                leaders.len(),
                leaders.join(", ")
            ),
            source: None,
        }
    }

    /// Replica-write rejection.
    pub fn not_primary() -> Self {
        Self {
            kind: GuardErrorKind::NotPrimary,
            message: "write rejected: this node is not primary; \
                      writes attempted on a replica must run on the primary"
                .to_string(),
            source: None,
        }
    }

    /// Detection failure, preserving the underlying port error.
    pub fn detection(source: impl Error + Send + Sync + 'static) -> Self {
        Self {
            kind: GuardErrorKind::Detection,
            message: format!("write rejected: split-brain detection failed: {source}"),
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> GuardErrorKind {
        self.kind
    }
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for GuardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as _)
    }
}
