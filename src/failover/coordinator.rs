//! Failover Coordinator
//!
//! State machine owning this node's role. Transitions are guarded by three
//! inputs evaluated on every tick: the election outcome, the injected
//! health flag, and cluster quorum.
//!
//! - A replica is promoted only when elected, healthy and quorate; a
//!   failed guard blocks promotion and records why.
//! - A primary that loses the election, its health, or quorum is demoted,
//!   each with a distinct event kind.
//! - Ticks that preserve the current role emit nothing.
//!
//! The coordinator owns no thread; callers invoke
//! [`FailoverCoordinator::coordinate_transition`] on whatever schedule
//! suits them, which keeps timing policy out of the core and transitions
//! deterministic under test.
//!
//! Locking: role and health share one mutex. Events are emitted while the
//! mutex is held so observers see transitions in the order the state
//! machine produced them; port calls that may block happen before the
//! mutex is taken.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::events::{ClusterEvent, EventEmitter, NullEmitter};
use crate::metrics::MetricsPort;
use crate::ports::{ConflictResolution, LeaderElection, RaftLeaderElection};

use super::events::{FailoverEvent, FailoverEventKind, TransitionReason};
use super::state::NodeRole;

struct CoordinatorState {
    role: NodeRole,
    healthy: bool,
}

/// Guarded PRIMARY/REPLICA state machine.
pub struct FailoverCoordinator {
    election: Arc<dyn LeaderElection>,
    raft: Option<Arc<dyn RaftLeaderElection>>,
    resolution: Option<Arc<dyn ConflictResolution>>,
    emitter: Arc<dyn EventEmitter>,
    metrics: Option<Arc<dyn MetricsPort>>,
    state: Mutex<CoordinatorState>,
}

impl FailoverCoordinator {
    /// Coordinator without quorum visibility: quorum is treated as
    /// satisfied, which is the case for static assignment.
    pub fn new(election: Arc<dyn LeaderElection>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            election,
            raft: None,
            resolution: None,
            emitter,
            metrics: None,
            state: Mutex::new(CoordinatorState {
                role: NodeRole::Replica,
                healthy: true,
            }),
        }
    }

    /// Coordinator consulting a consensus port for quorum.
    pub fn with_raft<E>(election: Arc<E>, emitter: Arc<dyn EventEmitter>) -> Self
    where
        E: RaftLeaderElection + 'static,
    {
        let mut coordinator = Self::new(election.clone(), emitter);
        coordinator.raft = Some(election);
        coordinator
    }

    /// Coordinator that emits nowhere; for compositions that only poll.
    pub fn detached(election: Arc<dyn LeaderElection>) -> Self {
        Self::new(election, Arc::new(NullEmitter))
    }

    /// Attach a conflict-resolution port used to fence during handoff.
    pub fn with_resolution(mut self, resolution: Arc<dyn ConflictResolution>) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Attach a metrics sink; each tick records the election outcome and
    /// the resulting role.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsPort>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current role.
    pub fn role(&self) -> NodeRole {
        self.lock_state().role
    }

    pub fn is_primary(&self) -> bool {
        self.role().is_primary()
    }

    /// Health input. Transitions that do not change the role emit nothing;
    /// the next tick applies the consequences.
    pub fn mark_healthy(&self) {
        self.lock_state().healthy = true;
    }

    pub fn mark_unhealthy(&self) {
        self.lock_state().healthy = false;
    }

    /// Evaluate the transition table once.
    ///
    /// Returns the emitted event, or none for an idempotent tick. An
    /// unreachable election port is treated as "not elected": the node
    /// stays, or becomes, a replica.
    pub fn coordinate_transition(&self) -> Option<FailoverEvent> {
        let elected = match self.election.is_leader_elected() {
            Ok(elected) => elected,
            Err(e) => {
                warn!(error = %e, "leader election unreachable; assuming not elected");
                false
            }
        };
        let quorum = match &self.raft {
            None => true,
            Some(raft) => match raft.is_quorum_reached() {
                Ok(quorum) => quorum,
                Err(e) => {
                    warn!(error = %e, "quorum check unreachable; assuming no quorum");
                    false
                }
            },
        };

        let mut state = self.lock_state();
        let healthy = state.healthy;

        let event = match (state.role, elected) {
            (NodeRole::Replica, true) => {
                if !healthy {
                    warn!("promotion blocked: node is not healthy");
                    Some(FailoverEvent::promotion_blocked(TransitionReason::Health))
                } else if !quorum {
                    warn!("promotion blocked: cluster has no quorum");
                    Some(FailoverEvent::promotion_blocked(TransitionReason::Quorum))
                } else {
                    state.role = NodeRole::Primary;
                    info!("promoted to primary");
                    Some(FailoverEvent::new(
                        FailoverEventKind::Promoted,
                        NodeRole::Replica,
                        NodeRole::Primary,
                        TransitionReason::Election,
                    ))
                }
            }
            (NodeRole::Replica, false) => None,
            (NodeRole::Primary, false) => {
                state.role = NodeRole::Replica;
                info!("demoted to replica: no longer elected");
                Some(FailoverEvent::new(
                    FailoverEventKind::Demoted,
                    NodeRole::Primary,
                    NodeRole::Replica,
                    TransitionReason::Election,
                ))
            }
            (NodeRole::Primary, true) => {
                if !healthy {
                    state.role = NodeRole::Replica;
                    warn!("demoted to replica: node is not healthy");
                    Some(FailoverEvent::new(
                        FailoverEventKind::DemotedForHealth,
                        NodeRole::Primary,
                        NodeRole::Replica,
                        TransitionReason::Health,
                    ))
                } else if !quorum {
                    state.role = NodeRole::Replica;
                    warn!("demoted to replica: cluster lost quorum");
                    Some(FailoverEvent::new(
                        FailoverEventKind::DemotedForQuorumLoss,
                        NodeRole::Primary,
                        NodeRole::Replica,
                        TransitionReason::Quorum,
                    ))
                } else {
                    None
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.set_leader_elected(elected);
            metrics.set_node_state(state.role.is_primary());
        }
        if let Some(event) = &event {
            // Emitted under the lock so observers see a consistent order.
            self.emitter.emit(&ClusterEvent::Failover(event.clone()));
        }
        event
    }

    /// Operator-requested handoff of the primary lease.
    ///
    /// Steps down through the election port, fences write access, and
    /// transitions to replica. A failed step-down still fences and still
    /// transitions: fencing is defensive and must not depend on the
    /// consensus layer cooperating. A handoff on a replica is a no-op.
    pub fn graceful_handoff(&self) -> Vec<FailoverEvent> {
        let state = self.lock_state();
        if state.role != NodeRole::Primary {
            return Vec::new();
        }
        let begin = FailoverEvent::new(
            FailoverEventKind::HandoffBegin,
            NodeRole::Primary,
            NodeRole::Primary,
            TransitionReason::OperatorHandoff,
        );
        self.emitter.emit(&ClusterEvent::Failover(begin.clone()));
        info!("graceful handoff started");
        // Lock released before the port calls below.
        drop(state);

        if let Err(e) = self.election.demote_from_leader() {
            warn!(error = %e, "step-down failed; fencing anyway");
        }
        if let Some(resolution) = &self.resolution {
            if let Err(e) = resolution.fence_write_access() {
                warn!(error = %e, "fencing failed during handoff");
            }
        }

        let mut state = self.lock_state();
        state.role = NodeRole::Replica;
        if let Some(metrics) = &self.metrics {
            metrics.set_leader_elected(false);
            metrics.set_node_state(false);
        }
        let complete = FailoverEvent::new(
            FailoverEventKind::HandoffComplete,
            NodeRole::Primary,
            NodeRole::Replica,
            TransitionReason::OperatorHandoff,
        );
        self.emitter.emit(&ClusterEvent::Failover(complete.clone()));
        info!("graceful handoff complete");
        vec![begin, complete]
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
