//! Cluster State Metrics
//!
//! Gauges describing the node as schedulers and dashboards see it: role,
//! health, split-brain, election outcome. The port is fire-and-forget
//! like the event emitter: implementations may buffer, sample or drop
//! values and must never fail the caller.
//!
//! Components take the port as an optional collaborator; the in-process
//! [`MetricsRegistry`] is the default implementation and is served as JSON
//! by the `/metrics` route.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::health::HealthState;

/// Gauge value for a healthy node.
pub const HEALTH_GAUGE_HEALTHY: u64 = 2;
/// Gauge value for a degraded node.
pub const HEALTH_GAUGE_DEGRADED: u64 = 1;
/// Gauge value for an unhealthy node.
pub const HEALTH_GAUGE_UNHEALTHY: u64 = 0;

/// Port for recording cluster-state gauges.
///
/// Every method is fire-and-forget: no return value, no failure.
/// Thread safety is the implementation's concern.
pub trait MetricsPort: Send + Sync {
    /// Record the node role: primary (1) or replica (0).
    fn set_node_state(&self, is_primary: bool);

    /// Record the health state.
    fn set_health_status(&self, status: HealthState);

    /// Record whether a split-brain is currently observed.
    fn set_split_brain_detected(&self, detected: bool);

    /// Record the leader-election outcome for this node.
    fn set_leader_elected(&self, elected: bool);
}

/// Metrics sink that drops everything. Lets components call the port
/// unconditionally when metrics are disabled.
pub struct NoOpMetrics;

impl MetricsPort for NoOpMetrics {
    fn set_node_state(&self, _is_primary: bool) {}
    fn set_health_status(&self, _status: HealthState) {}
    fn set_split_brain_detected(&self, _detected: bool) {}
    fn set_leader_elected(&self, _elected: bool) {}
}

/// In-process gauge registry.
///
/// All gauges use atomic stores with relaxed ordering; readers tolerate a
/// stale view. Values reset only on process start.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// 1 = primary, 0 = replica
    node_state: AtomicU64,
    /// 2 = healthy, 1 = degraded, 0 = unhealthy
    health_status: AtomicU64,
    /// 1 = split-brain observed, 0 = not
    split_brain_detected: AtomicU64,
    /// 1 = this node is the elected leader, 0 = not
    leader_elected: AtomicU64,
}

impl MetricsRegistry {
    /// Registry with every gauge at its replica-safe zero value, except
    /// health which starts healthy.
    pub fn new() -> Self {
        let registry = Self::default();
        registry
            .health_status
            .store(HEALTH_GAUGE_HEALTHY, Ordering::Relaxed);
        registry
    }

    /// Point-in-time view of every gauge.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            node_state: self.node_state.load(Ordering::Relaxed),
            health_status: self.health_status.load(Ordering::Relaxed),
            split_brain_detected: self.split_brain_detected.load(Ordering::Relaxed),
            leader_elected: self.leader_elected.load(Ordering::Relaxed),
        }
    }
}

impl MetricsPort for MetricsRegistry {
    fn set_node_state(&self, is_primary: bool) {
        self.node_state
            .store(u64::from(is_primary), Ordering::Relaxed);
    }

    fn set_health_status(&self, status: HealthState) {
        let value = match status {
            HealthState::Healthy => HEALTH_GAUGE_HEALTHY,
            HealthState::Degraded => HEALTH_GAUGE_DEGRADED,
            HealthState::Unhealthy => HEALTH_GAUGE_UNHEALTHY,
        };
        self.health_status.store(value, Ordering::Relaxed);
    }

    fn set_split_brain_detected(&self, detected: bool) {
        self.split_brain_detected
            .store(u64::from(detected), Ordering::Relaxed);
    }

    fn set_leader_elected(&self, elected: bool) {
        self.leader_elected
            .store(u64::from(elected), Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of all gauges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub node_state: u64,
    pub health_status: u64,
    pub split_brain_detected: u64,
    pub leader_elected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_defaults() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.node_state, 0);
        assert_eq!(snapshot.health_status, HEALTH_GAUGE_HEALTHY);
        assert_eq!(snapshot.split_brain_detected, 0);
        assert_eq!(snapshot.leader_elected, 0);
    }

    #[test]
    fn test_gauges_follow_setters() {
        let registry = MetricsRegistry::new();

        registry.set_node_state(true);
        registry.set_health_status(HealthState::Degraded);
        registry.set_split_brain_detected(true);
        registry.set_leader_elected(true);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.node_state, 1);
        assert_eq!(snapshot.health_status, HEALTH_GAUGE_DEGRADED);
        assert_eq!(snapshot.split_brain_detected, 1);
        assert_eq!(snapshot.leader_elected, 1);

        registry.set_node_state(false);
        registry.set_health_status(HealthState::Unhealthy);
        registry.set_split_brain_detected(false);
        registry.set_leader_elected(false);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.node_state, 0);
        assert_eq!(snapshot.health_status, HEALTH_GAUGE_UNHEALTHY);
        assert_eq!(snapshot.split_brain_detected, 0);
        assert_eq!(snapshot.leader_elected, 0);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let registry = MetricsRegistry::new();
        registry.set_node_state(true);

        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json["node_state"], 1);
        assert_eq!(json["health_status"], HEALTH_GAUGE_HEALTHY);
    }

    #[test]
    fn test_noop_metrics_accepts_everything() {
        let noop = NoOpMetrics;
        noop.set_node_state(true);
        noop.set_health_status(HealthState::Unhealthy);
        noop.set_split_brain_detected(true);
        noop.set_leader_elected(false);
    }

    #[test]
    fn test_concurrent_stores_land() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    registry.set_node_state(true);
                    registry.set_leader_elected(true);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.node_state, 1);
        assert_eq!(snapshot.leader_elected, 1);
    }
}
