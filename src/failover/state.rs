//! Node Role State
//!
//! A node is either the primary (sole write authority) or a replica.
//! The role is owned by the failover coordinator and changes only through
//! its guarded transitions.

use serde::Serialize;

/// Role of this node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Sole write authority.
    Primary,
    /// Read-only follower; writes are rejected or forwarded.
    Replica,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Replica => "replica",
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary)
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
