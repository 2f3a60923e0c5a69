//! Split-Brain Detection
//!
//! Observes cluster snapshots for multiple concurrent leaders. The
//! detector reports; it never heals. Callers decide whether to fence
//! through a conflict-resolution port.
//!
//! Rule: zero leaders is leaderless but healthy enough to serve (logged as
//! a warning, not a detection); one leader is healthy; two or more leaders
//! is a split-brain.
//!
//! Static leader election cannot produce two leaders, so the detector is a
//! no-op in static mode.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::config::LeaderElectionMode;
use crate::events::{ClusterEvent, EventEmitter};
use crate::metrics::MetricsPort;
use crate::ports::{ClusterStateSource, PortResult};

use super::state::RaftClusterState;

/// Result of one split-brain query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitBrainStatus {
    /// True when two or more nodes claim leadership.
    pub is_split_brain: bool,
    /// Ids of every node claiming leadership.
    pub leaders: Vec<String>,
}

impl SplitBrainStatus {
    /// Status for a cluster that cannot split (static mode, no detector).
    pub fn healthy() -> Self {
        Self {
            is_split_brain: false,
            leaders: Vec::new(),
        }
    }
}

/// Immutable record of one split-brain observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitBrainDetection {
    /// When the observation was made.
    pub detected_at: DateTime<Utc>,
    /// The snapshot that showed multiple leaders.
    pub cluster_snapshot: RaftClusterState,
    /// The member that made the observation.
    pub detected_by_node: String,
    /// The conflicting leader ids, always two or more.
    pub conflicting_leaders: Vec<String>,
}

struct DetectorMemory {
    /// Leader count from the most recent snapshot.
    last_leader_count: Option<usize>,
    /// Whether a split-brain has ever been observed.
    detected_once: bool,
}

/// Detects split-brain from cluster snapshots.
pub struct SplitBrainDetector {
    source: Arc<dyn ClusterStateSource>,
    node_id: String,
    mode: LeaderElectionMode,
    emitter: Option<Arc<dyn EventEmitter>>,
    metrics: Option<Arc<dyn MetricsPort>>,
    memory: Mutex<DetectorMemory>,
}

impl SplitBrainDetector {
    pub fn new(
        source: Arc<dyn ClusterStateSource>,
        node_id: impl Into<String>,
        mode: LeaderElectionMode,
    ) -> Self {
        Self {
            source,
            node_id: node_id.into(),
            mode,
            emitter: None,
            metrics: None,
            memory: Mutex::new(DetectorMemory {
                last_leader_count: None,
                detected_once: false,
            }),
        }
    }

    /// Attach an emitter; every detection is published as a
    /// [`ClusterEvent::SplitBrain`].
    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Attach a metrics sink; every observation updates the split-brain
    /// gauge.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsPort>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Query the current split-brain status.
    ///
    /// Port failures propagate: the write-path guard treats them as
    /// fail-closed, while middleware logs and fails open.
    pub fn status(&self) -> PortResult<SplitBrainStatus> {
        if self.mode == LeaderElectionMode::Static {
            return Ok(SplitBrainStatus::healthy());
        }

        let snapshot = self.source.cluster_state()?;
        let leaders = snapshot.leaders_detected();
        self.remember(leaders.len());

        if snapshot.is_leaderless() {
            warn!(node_id = %self.node_id, "cluster currently has no leader");
        }

        Ok(SplitBrainStatus {
            is_split_brain: leaders.len() >= 2,
            leaders,
        })
    }

    /// Observe the cluster once, returning a detection when two or more
    /// leaders are visible.
    ///
    /// Unreachable cluster state is logged and treated as no detection;
    /// the strict-failure path for writes goes through [`Self::status`].
    pub fn check(&self) -> Option<SplitBrainDetection> {
        if self.mode == LeaderElectionMode::Static {
            return None;
        }

        let snapshot = match self.source.cluster_state() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "split-brain detection skipped: cluster state unavailable");
                return None;
            }
        };

        let leaders = snapshot.leaders_detected();
        self.remember(leaders.len());

        if snapshot.is_leaderless() {
            warn!(node_id = %self.node_id, "cluster currently has no leader");
            return None;
        }
        if leaders.len() < 2 {
            return None;
        }

        if !snapshot.contains(&self.node_id) {
            warn!(
                node_id = %self.node_id,
                "observing node is not a cluster member; split-brain observation discarded"
            );
            return None;
        }

        let detection = SplitBrainDetection {
            detected_at: Utc::now(),
            cluster_snapshot: snapshot,
            detected_by_node: self.node_id.clone(),
            conflicting_leaders: leaders,
        };

        if let Some(emitter) = &self.emitter {
            emitter.emit(&ClusterEvent::SplitBrain(detection.clone()));
        }

        Some(detection)
    }

    /// Whether a previous detection has been followed by a snapshot with at
    /// most one leader.
    pub fn has_resolved(&self) -> bool {
        let memory = self
            .memory
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        memory.detected_once && matches!(memory.last_leader_count, Some(count) if count <= 1)
    }

    fn remember(&self, leader_count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_split_brain_detected(leader_count >= 2);
        }
        let mut memory = self
            .memory
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        memory.last_leader_count = Some(leader_count);
        if leader_count >= 2 {
            memory.detected_once = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::RaftNodeState;
    use crate::ports::fakes::FakeClusterStateSource;

    fn snapshot(leader_ids: &[&str], follower_ids: &[&str]) -> RaftClusterState {
        let mut members = Vec::new();
        for id in leader_ids {
            members.push(RaftNodeState::leader(*id, 1).unwrap());
        }
        for id in follower_ids {
            members.push(RaftNodeState::follower(*id, 1, None).unwrap());
        }
        RaftClusterState::with_majority_quorum(members).unwrap()
    }

    fn detector(source: Arc<FakeClusterStateSource>) -> SplitBrainDetector {
        SplitBrainDetector::new(source, "node1", LeaderElectionMode::Raft)
    }

    #[test]
    fn test_single_leader_is_healthy() {
        let source = Arc::new(FakeClusterStateSource::new(snapshot(&["node1"], &["node2"])));
        let detector = detector(Arc::clone(&source));

        assert!(detector.check().is_none());
        let status = detector.status().unwrap();
        assert!(!status.is_split_brain);
        assert_eq!(status.leaders, vec!["node1".to_string()]);
    }

    #[test]
    fn test_leaderless_is_not_split_brain() {
        let source = Arc::new(FakeClusterStateSource::new(snapshot(&[], &["node1", "node2"])));
        let detector = detector(Arc::clone(&source));
        assert!(detector.check().is_none());
        assert!(!detector.status().unwrap().is_split_brain);
    }

    #[test]
    fn test_two_leaders_is_split_brain() {
        let source = Arc::new(FakeClusterStateSource::new(snapshot(
            &["node1", "node2"],
            &["node3"],
        )));
        let detector = detector(Arc::clone(&source));

        let detection = detector.check().expect("detection");
        assert_eq!(detection.detected_by_node, "node1");
        assert_eq!(
            detection.conflicting_leaders,
            vec!["node1".to_string(), "node2".to_string()]
        );
        assert!(detection.cluster_snapshot.has_split_brain());
    }

    #[test]
    fn test_static_mode_is_noop() {
        let source = Arc::new(FakeClusterStateSource::new(snapshot(
            &["node1", "node2"],
            &[],
        )));
        let detector =
            SplitBrainDetector::new(source, "node1", LeaderElectionMode::Static);
        assert!(detector.check().is_none());
        assert!(!detector.status().unwrap().is_split_brain);
    }

    #[test]
    fn test_resolution_requires_prior_detection() {
        let source = Arc::new(FakeClusterStateSource::new(snapshot(&["node1"], &["node2"])));
        let detector = detector(Arc::clone(&source));

        detector.check();
        assert!(!detector.has_resolved());

        source.set_state(snapshot(&["node1", "node2"], &[]));
        assert!(detector.check().is_some());
        assert!(!detector.has_resolved());

        source.set_state(snapshot(&["node1"], &["node2"]));
        detector.check();
        assert!(detector.has_resolved());
    }

    #[test]
    fn test_detection_emitted_through_bus() {
        use crate::events::EventBus;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let source = Arc::new(FakeClusterStateSource::new(snapshot(
            &["node1", "node2"],
            &[],
        )));
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        bus.subscribe(move |event| {
            if matches!(event, ClusterEvent::SplitBrain(_)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let detector = SplitBrainDetector::new(source, "node1", LeaderElectionMode::Raft)
            .with_emitter(bus);
        detector.check();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_split_brain_gauge_tracks_observations() {
        use crate::metrics::{MetricsPort, MetricsRegistry};

        let source = Arc::new(FakeClusterStateSource::new(snapshot(
            &["node1", "node2"],
            &[],
        )));
        let registry = Arc::new(MetricsRegistry::new());
        let detector =
            SplitBrainDetector::new(
                Arc::clone(&source) as Arc<dyn ClusterStateSource>,
                "node1",
                LeaderElectionMode::Raft,
            )
            .with_metrics(Arc::clone(&registry) as Arc<dyn MetricsPort>);

        detector.check();
        assert_eq!(registry.snapshot().split_brain_detected, 1);

        source.set_state(snapshot(&["node1"], &["node2"]));
        detector.check();
        assert_eq!(registry.snapshot().split_brain_detected, 0);
    }

    #[test]
    fn test_unavailable_source_fails_open_in_check() {
        let source = Arc::new(FakeClusterStateSource::unavailable());
        let detector = detector(Arc::clone(&source));
        assert!(detector.check().is_none());
        assert!(detector.status().is_err());
    }
}
