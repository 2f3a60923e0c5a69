//! External Collaborator Ports
//!
//! Named contracts for everything the coordination core consumes but does
//! not own: primary detection, node identity, leader election, cluster
//! state, and conflict resolution. Implementations satisfy a port by
//! implementing its trait; the core never depends on a concrete consensus
//! or transport implementation.
//!
//! Port implementations must not call back into the coordinator
//! synchronously; the coordinator releases its lock before invoking a port
//! that may block.

pub mod fakes;

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cluster::RaftClusterState;
use crate::config::{ConfigError, ConfigResult};
use crate::mount::{MarkerWriter, MountObserver, MountResult, PrimaryMarker};

/// Failure of a port call.
///
/// Callers treat a failed port as "unknown": role resolution answers
/// replica, the coordinator stays (or becomes) replica.
#[derive(Debug)]
pub struct PortError {
    message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl PortError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for PortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as _)
    }
}

/// Result type for port calls
pub type PortResult<T> = Result<T, PortError>;

/// Detects whether this node is the primary.
///
/// May fail with an infrastructure-unavailable error when the mount is
/// gone; that failure is fatal for the affected request only.
pub trait PrimaryDetector: Send + Sync {
    fn is_primary(&self) -> MountResult<bool>;
}

/// The mount observer is the canonical primary detector: an empty marker
/// means this node holds the primary lease.
impl PrimaryDetector for MountObserver {
    fn is_primary(&self) -> MountResult<bool> {
        Ok(self.read_primary_marker()?.is_local_primary())
    }
}

/// Resolves this node's identifier.
pub trait NodeIdResolver: Send + Sync {
    /// Returns a non-empty node id or a configuration error.
    fn resolve_node_id(&self) -> ConfigResult<String>;
}

/// Resolves the node id from an environment hint.
///
/// The only environment variable the core reads; all other configuration
/// flows through the settings object.
pub struct EnvNodeIdResolver {
    variable: &'static str,
}

impl EnvNodeIdResolver {
    pub const DEFAULT_VARIABLE: &'static str = "LITEFS_NODE_ID";

    pub fn new() -> Self {
        Self {
            variable: Self::DEFAULT_VARIABLE,
        }
    }

    pub fn with_variable(variable: &'static str) -> Self {
        Self { variable }
    }
}

impl Default for EnvNodeIdResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeIdResolver for EnvNodeIdResolver {
    fn resolve_node_id(&self) -> ConfigResult<String> {
        match std::env::var(self.variable) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(ConfigError::EmptyField("node_id")),
        }
    }
}

/// Base leader-election contract, satisfied by both static assignment and
/// consensus implementations.
pub trait LeaderElection: Send + Sync {
    fn is_leader_elected(&self) -> PortResult<bool>;
    fn elect_as_leader(&self) -> PortResult<()>;
    fn demote_from_leader(&self) -> PortResult<()>;
}

/// Consensus-backed leader election with cluster visibility.
pub trait RaftLeaderElection: LeaderElection {
    fn is_quorum_reached(&self) -> PortResult<bool>;
    fn get_cluster_members(&self) -> PortResult<Vec<String>>;
    fn get_cluster_state(&self) -> PortResult<RaftClusterState>;
    fn detect_split_brain(&self) -> PortResult<bool>;
    fn get_election_timeout(&self) -> PortResult<Duration>;
}

/// Source of cluster snapshots for split-brain detection.
pub trait ClusterStateSource: Send + Sync {
    fn cluster_state(&self) -> PortResult<RaftClusterState>;
}

impl<T: RaftLeaderElection> ClusterStateSource for T {
    fn cluster_state(&self) -> PortResult<RaftClusterState> {
        self.get_cluster_state()
    }
}

/// Strategy for resolving a detected write conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Fence the marker so the filesystem rejects writes.
    FenceWrites,
    /// Force this node to behave as a replica; a no-op when it already is.
    ForceReplica,
}

/// Fences write access during split-brain and applies resolution
/// strategies. Errors are logged by callers and never cascade.
pub trait ConflictResolution: Send + Sync {
    /// Move the primary marker aside so writes are refused. Idempotent.
    fn fence_write_access(&self) -> MountResult<()>;

    /// Apply a resolution strategy. Idempotent per strategy.
    fn apply_resolution_strategy(&self, strategy: ResolutionStrategy) -> MountResult<()>;
}

/// Marker-file based conflict resolution.
pub struct MarkerFence {
    writer: MarkerWriter,
    observer: Arc<MountObserver>,
}

impl MarkerFence {
    pub fn new(observer: Arc<MountObserver>) -> Self {
        Self {
            writer: MarkerWriter::new(observer.mount_path()),
            observer,
        }
    }
}

impl ConflictResolution for MarkerFence {
    fn fence_write_access(&self) -> MountResult<()> {
        self.writer.fence()
    }

    fn apply_resolution_strategy(&self, strategy: ResolutionStrategy) -> MountResult<()> {
        match strategy {
            ResolutionStrategy::FenceWrites => self.fence_write_access(),
            ResolutionStrategy::ForceReplica => {
                // Already a replica when the marker does not claim the
                // primary lease for this node.
                match self.observer.read_primary_marker()? {
                    PrimaryMarker::PresentEmpty => self.fence_write_access(),
                    _ => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::{BLOCKED_MARKER, PRIMARY_MARKER};
    use std::fs::File;

    #[test]
    fn test_observer_is_primary_iff_marker_empty() {
        let dir = tempfile::tempdir().unwrap();
        let observer = MountObserver::new(dir.path());
        assert!(!observer.is_primary().unwrap());

        File::create(dir.path().join(PRIMARY_MARKER)).unwrap();
        assert!(observer.is_primary().unwrap());

        std::fs::write(dir.path().join(PRIMARY_MARKER), "other.local:8000").unwrap();
        assert!(!observer.is_primary().unwrap());
    }

    #[test]
    fn test_marker_fence_fences_local_primary() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join(PRIMARY_MARKER)).unwrap();
        let fence = MarkerFence::new(Arc::new(MountObserver::new(dir.path())));

        fence.apply_resolution_strategy(ResolutionStrategy::ForceReplica).unwrap();
        assert!(dir.path().join(BLOCKED_MARKER).exists());
        assert!(!dir.path().join(PRIMARY_MARKER).exists());
    }

    #[test]
    fn test_force_replica_on_replica_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PRIMARY_MARKER), "other.local:8000").unwrap();
        let fence = MarkerFence::new(Arc::new(MountObserver::new(dir.path())));

        fence.apply_resolution_strategy(ResolutionStrategy::ForceReplica).unwrap();
        // Another node holds the lease; its marker is untouched.
        assert!(dir.path().join(PRIMARY_MARKER).exists());
        assert!(!dir.path().join(BLOCKED_MARKER).exists());
    }

    #[test]
    fn test_env_node_id_resolver() {
        std::env::set_var("LITEFS_TEST_NODE_ID", "node7");
        let resolver = EnvNodeIdResolver::with_variable("LITEFS_TEST_NODE_ID");
        assert_eq!(resolver.resolve_node_id().unwrap(), "node7");

        let missing = EnvNodeIdResolver::with_variable("LITEFS_TEST_NODE_ID_MISSING");
        assert!(missing.resolve_node_id().is_err());
    }
}
