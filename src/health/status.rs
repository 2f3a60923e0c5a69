//! Health and Probe Value Objects

use serde::Serialize;

use crate::failover::NodeRole;

/// Health of this node. `Unhealthy` dominates `Degraded` dominates
/// `Healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    /// Derive from the two flags; unhealthy wins.
    pub fn from_flags(degraded: bool, unhealthy: bool) -> Self {
        if unhealthy {
            Self::Unhealthy
        } else if degraded {
            Self::Degraded
        } else {
            Self::Healthy
        }
    }
}

/// Liveness probe result. Fails only when the mount is unobservable;
/// degraded and unhealthy nodes still report live.
#[derive(Debug, Clone, Serialize)]
pub struct LivenessReport {
    pub is_live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LivenessReport {
    pub fn live() -> Self {
        Self {
            is_live: true,
            error: None,
        }
    }

    pub fn not_live(error: impl Into<String>) -> Self {
        Self {
            is_live: false,
            error: Some(error.into()),
        }
    }
}

/// Readiness probe result.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub is_ready: bool,
    pub can_accept_writes: bool,
    pub node_state: NodeRole,
    pub health_status: HealthState,
    pub split_brain_detected: bool,
    pub leader_node_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detailed status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub is_primary: bool,
    pub health_status: HealthState,
    pub node_state: NodeRole,
    pub is_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_dominates_degraded() {
        assert_eq!(HealthState::from_flags(false, false), HealthState::Healthy);
        assert_eq!(HealthState::from_flags(true, false), HealthState::Degraded);
        assert_eq!(HealthState::from_flags(false, true), HealthState::Unhealthy);
        assert_eq!(HealthState::from_flags(true, true), HealthState::Unhealthy);
    }

    #[test]
    fn test_liveness_serialization_omits_absent_error() {
        let live = serde_json::to_string(&LivenessReport::live()).unwrap();
        assert!(live.contains("\"is_live\":true"));
        assert!(!live.contains("error"));

        let down = serde_json::to_string(&LivenessReport::not_live("mount gone")).unwrap();
        assert!(down.contains("\"is_live\":false"));
        assert!(down.contains("mount gone"));
    }
}
