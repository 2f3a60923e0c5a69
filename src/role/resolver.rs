//! Role Resolver
//!
//! Determines whether this node is the primary.
//!
//! Static mode compares the configured primary hostname against this
//! node's id byte-for-byte: no case folding, no FQDN shortening, no
//! normalization of any kind. Any mismatch means replica.
//!
//! Raft mode delegates to the leader-election port. When the port cannot
//! be reached the resolver answers [`RoleCheck::Unknown`] rather than
//! guessing; callers treat unknown as replica so an unreachable consensus
//! layer can never grant write authority.

use std::sync::Arc;

use tracing::warn;

use crate::mount::MountObserver;
use crate::ports::LeaderElection;

/// Outcome of a role query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleCheck {
    Primary,
    Replica,
    /// The election port could not be reached. Treated as replica for
    /// safety.
    Unknown,
}

enum Mode {
    Static {
        primary_hostname: String,
        node_id: String,
    },
    Raft {
        election: Arc<dyn LeaderElection>,
    },
}

/// Uniform role query over static and consensus leader election.
pub struct RoleResolver {
    mode: Mode,
    observer: Arc<MountObserver>,
}

impl RoleResolver {
    /// Static assignment: the node whose id equals `primary_hostname` is
    /// the primary.
    pub fn static_mode(
        primary_hostname: impl Into<String>,
        node_id: impl Into<String>,
        observer: Arc<MountObserver>,
    ) -> Self {
        Self {
            mode: Mode::Static {
                primary_hostname: primary_hostname.into(),
                node_id: node_id.into(),
            },
            observer,
        }
    }

    /// Consensus-based election through the given port.
    pub fn raft_mode(election: Arc<dyn LeaderElection>, observer: Arc<MountObserver>) -> Self {
        Self {
            mode: Mode::Raft { election },
            observer,
        }
    }

    /// Resolve the current role.
    pub fn check(&self) -> RoleCheck {
        match &self.mode {
            Mode::Static {
                primary_hostname,
                node_id,
            } => {
                if primary_hostname == node_id {
                    RoleCheck::Primary
                } else {
                    RoleCheck::Replica
                }
            }
            Mode::Raft { election } => match election.is_leader_elected() {
                Ok(true) => RoleCheck::Primary,
                Ok(false) => RoleCheck::Replica,
                Err(e) => {
                    warn!(error = %e, "leader election unreachable; treating role as unknown");
                    RoleCheck::Unknown
                }
            },
        }
    }

    /// Whether this node may write. Unknown answers false.
    pub fn is_primary(&self) -> bool {
        self.check() == RoleCheck::Primary
    }

    /// The primary's address from the marker content.
    ///
    /// None when the marker is empty-but-present (this node is the
    /// primary), absent (no primary elected), or unreadable.
    pub fn primary_url(&self) -> Option<String> {
        match self.observer.read_primary_marker() {
            Ok(marker) => marker.primary_url().map(str::to_string),
            Err(e) => {
                warn!(error = %e, "could not read primary marker");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::fakes::FakeLeaderElection;
    use std::fs::File;
    use std::io::Write;

    fn observer() -> Arc<MountObserver> {
        let dir = tempfile::tempdir().unwrap();
        let observer = Arc::new(MountObserver::new(dir.path()));
        // Leak the tempdir so the mount outlives the test body.
        std::mem::forget(dir);
        observer
    }

    #[test]
    fn test_static_exact_match_is_primary() {
        let resolver = RoleResolver::static_mode("node1", "node1", observer());
        assert_eq!(resolver.check(), RoleCheck::Primary);
        assert!(resolver.is_primary());
    }

    #[test]
    fn test_static_comparison_is_byte_exact() {
        let cases = [
            ("node1", "Node1"),
            ("node1", "NODE1"),
            ("node1", "node1.internal"),
            ("node1.internal", "node1"),
            ("node1", "node10"),
            ("node1", " node1"),
            ("node1", "node1 "),
        ];
        for (configured, local) in cases {
            let resolver = RoleResolver::static_mode(configured, local, observer());
            assert_eq!(
                resolver.check(),
                RoleCheck::Replica,
                "{configured:?} vs {local:?} must not match"
            );
        }
    }

    #[test]
    fn test_raft_mode_follows_election() {
        let election = Arc::new(FakeLeaderElection::new(false));
        let resolver = RoleResolver::raft_mode(election.clone(), observer());
        assert_eq!(resolver.check(), RoleCheck::Replica);

        election.set_elected(true);
        assert_eq!(resolver.check(), RoleCheck::Primary);
    }

    #[test]
    fn test_unreachable_election_is_unknown_not_primary() {
        let election = Arc::new(FakeLeaderElection::new(true));
        election.set_failing(true);
        let resolver = RoleResolver::raft_mode(election, observer());
        assert_eq!(resolver.check(), RoleCheck::Unknown);
        assert!(!resolver.is_primary());
    }

    #[test]
    fn test_primary_url_from_marker_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut marker = File::create(dir.path().join(crate::mount::PRIMARY_MARKER)).unwrap();
        writeln!(marker, "primary.local:8000").unwrap();
        let observer = Arc::new(MountObserver::new(dir.path()));

        let resolver = RoleResolver::static_mode("node1", "node2", observer);
        assert_eq!(resolver.primary_url(), Some("primary.local:8000".to_string()));
    }

    #[test]
    fn test_primary_url_none_when_marker_empty_or_absent() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Arc::new(MountObserver::new(dir.path()));
        let resolver = RoleResolver::static_mode("node1", "node2", observer);
        assert_eq!(resolver.primary_url(), None);

        File::create(dir.path().join(crate::mount::PRIMARY_MARKER)).unwrap();
        assert_eq!(resolver.primary_url(), None);
    }
}
