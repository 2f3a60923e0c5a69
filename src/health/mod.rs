//! Health Probes
//!
//! Liveness, readiness and detailed status signals for external
//! schedulers, with role-aware degradation rules.

mod checkers;
mod status;

pub use checkers::{HealthChecker, LivenessChecker, ReadinessChecker, StatusReporter};
pub use status::{HealthState, LivenessReport, ReadinessReport, StatusReport};
