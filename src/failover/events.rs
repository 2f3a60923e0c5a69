//! Failover Events
//!
//! Typed events describing observable role transitions. Exactly one event
//! is produced per observed transition; idempotent ticks produce none.
//! `PromotionBlocked` is the one exception: it records a promotion attempt
//! that failed a guard without changing the role.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::NodeRole;

/// Why a transition happened or a promotion was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// The election outcome changed.
    Election,
    /// The node's health guard fired.
    Health,
    /// The cluster lost quorum.
    Quorum,
    /// An operator requested a graceful handoff.
    OperatorHandoff,
}

impl TransitionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Election => "election",
            Self::Health => "health",
            Self::Quorum => "quorum",
            Self::OperatorHandoff => "operator_handoff",
        }
    }
}

/// Failover event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverEventKind {
    /// Replica became primary.
    Promoted,
    /// Primary lost the election and became replica.
    Demoted,
    /// Primary stepped down because it was unhealthy.
    DemotedForHealth,
    /// Primary stepped down because quorum was lost.
    DemotedForQuorumLoss,
    /// Graceful handoff started on the primary.
    HandoffBegin,
    /// Graceful handoff finished; the node is a replica.
    HandoffComplete,
    /// An elected replica could not be promoted past a guard.
    PromotionBlocked,
}

impl FailoverEventKind {
    /// Stable event name for logs and subscribers.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Promoted => "failover.promoted",
            Self::Demoted => "failover.demoted",
            Self::DemotedForHealth => "failover.demoted_for_health",
            Self::DemotedForQuorumLoss => "failover.demoted_for_quorum_loss",
            Self::HandoffBegin => "failover.handoff_begin",
            Self::HandoffComplete => "failover.handoff_complete",
            Self::PromotionBlocked => "failover.promotion_blocked",
        }
    }
}

/// Immutable record of one coordinator transition or blocked promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailoverEvent {
    pub kind: FailoverEventKind,
    pub from_state: NodeRole,
    pub to_state: NodeRole,
    pub reason: TransitionReason,
    pub timestamp: DateTime<Utc>,
}

impl FailoverEvent {
    pub fn new(
        kind: FailoverEventKind,
        from_state: NodeRole,
        to_state: NodeRole,
        reason: TransitionReason,
    ) -> Self {
        Self {
            kind,
            from_state,
            to_state,
            reason,
            timestamp: Utc::now(),
        }
    }

    /// A blocked promotion leaves the node a replica.
    pub fn promotion_blocked(reason: TransitionReason) -> Self {
        Self::new(
            FailoverEventKind::PromotionBlocked,
            NodeRole::Replica,
            NodeRole::Replica,
            reason,
        )
    }

    pub fn event_name(&self) -> &'static str {
        self.kind.event_name()
    }

    /// Whether the event records an actual role change.
    pub fn changes_role(&self) -> bool {
        self.from_state != self.to_state
    }
}
