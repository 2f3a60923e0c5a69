//! Health, Liveness and Readiness Checkers
//!
//! Pure composition over the mount observer, health flags, coordinator
//! role and split-brain detector. The checkers compute scheduler signals:
//! liveness gates process restart, readiness gates traffic routing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::cluster::SplitBrainDetector;
use crate::failover::{FailoverCoordinator, NodeRole};
use crate::metrics::MetricsPort;
use crate::mount::MountObserver;

use super::status::{HealthState, LivenessReport, ReadinessReport, StatusReport};

/// Holds the externally-set health flags and derives the health state.
#[derive(Default)]
pub struct HealthChecker {
    degraded: AtomicBool,
    unhealthy: AtomicBool,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::SeqCst);
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    pub fn check(&self) -> HealthState {
        HealthState::from_flags(
            self.degraded.load(Ordering::SeqCst),
            self.unhealthy.load(Ordering::SeqCst),
        )
    }
}

/// Liveness: is the replicated filesystem observable at all?
pub struct LivenessChecker {
    observer: Arc<MountObserver>,
}

impl LivenessChecker {
    pub fn new(observer: Arc<MountObserver>) -> Self {
        Self { observer }
    }

    pub fn check(&self) -> LivenessReport {
        match self.observer.ensure_mounted() {
            Ok(()) => LivenessReport::live(),
            Err(e) => LivenessReport::not_live(e.to_string()),
        }
    }
}

/// Readiness: role-aware traffic signal.
///
/// A degraded replica still serves reads and stays ready; a degraded
/// primary must not accept writes and is not ready. Split-brain and a
/// missing mount fail readiness for every role.
pub struct ReadinessChecker {
    observer: Arc<MountObserver>,
    health: Arc<HealthChecker>,
    coordinator: Arc<FailoverCoordinator>,
    detector: Option<Arc<SplitBrainDetector>>,
    metrics: Option<Arc<dyn MetricsPort>>,
}

impl ReadinessChecker {
    pub fn new(
        observer: Arc<MountObserver>,
        health: Arc<HealthChecker>,
        coordinator: Arc<FailoverCoordinator>,
        detector: Option<Arc<SplitBrainDetector>>,
    ) -> Self {
        Self {
            observer,
            health,
            coordinator,
            detector,
            metrics: None,
        }
    }

    /// Attach a metrics sink; every check records the role and health
    /// gauges.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsPort>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn check(&self) -> ReadinessReport {
        let role = self.coordinator.role();

        if let Err(e) = self.observer.ensure_mounted() {
            self.record(role, HealthState::Unhealthy);
            return ReadinessReport {
                is_ready: false,
                can_accept_writes: false,
                node_state: role,
                health_status: HealthState::Unhealthy,
                split_brain_detected: false,
                leader_node_ids: Vec::new(),
                error: Some(e.to_string()),
            };
        }

        let health = self.health.check();
        self.record(role, health);

        // Detector failures fail open here: readiness reflects what can be
        // observed, and the write path has its own strict check.
        let (split_brain, leaders) = match &self.detector {
            None => (false, Vec::new()),
            Some(detector) => match detector.status() {
                Ok(status) => (status.is_split_brain, status.leaders),
                Err(e) => {
                    warn!(error = %e, "readiness: split-brain status unavailable");
                    (false, Vec::new())
                }
            },
        };

        let healthy_enough = match role {
            NodeRole::Primary => health == HealthState::Healthy,
            NodeRole::Replica => health != HealthState::Unhealthy,
        };
        let is_ready = healthy_enough && !split_brain;

        let error = if split_brain {
            Some(format!(
                "split brain detected: multiple leaders ({})",
                leaders.join(", ")
            ))
        } else if !healthy_enough {
            Some(format!("node is {}", health.as_str()))
        } else {
            None
        };

        ReadinessReport {
            is_ready,
            can_accept_writes: role.is_primary() && is_ready,
            node_state: role,
            health_status: health,
            split_brain_detected: split_brain,
            leader_node_ids: leaders,
            error,
        }
    }

    fn record(&self, role: NodeRole, health: HealthState) {
        if let Some(metrics) = &self.metrics {
            metrics.set_node_state(role.is_primary());
            metrics.set_health_status(health);
        }
    }
}

/// Detailed status for the `/health` endpoint.
pub struct StatusReporter {
    observer: Arc<MountObserver>,
    health: Arc<HealthChecker>,
    coordinator: Arc<FailoverCoordinator>,
    readiness: Arc<ReadinessChecker>,
}

impl StatusReporter {
    pub fn new(
        observer: Arc<MountObserver>,
        health: Arc<HealthChecker>,
        coordinator: Arc<FailoverCoordinator>,
        readiness: Arc<ReadinessChecker>,
    ) -> Self {
        Self {
            observer,
            health,
            coordinator,
            readiness,
        }
    }

    pub fn check(&self) -> StatusReport {
        let role = self.coordinator.role();

        match self.observer.read_primary_marker() {
            Ok(marker) => StatusReport {
                is_primary: marker.is_local_primary(),
                health_status: self.health.check(),
                node_state: role,
                is_ready: self.readiness.check().is_ready,
                error: None,
            },
            Err(e) => StatusReport {
                is_primary: false,
                health_status: HealthState::Unhealthy,
                node_state: role,
                is_ready: false,
                error: Some(e.to_string()),
            },
        }
    }
}
