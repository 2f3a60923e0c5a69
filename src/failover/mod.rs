//! Failover Subsystem
//!
//! The coordinator that owns this node's role, the events it emits, and
//! the role vocabulary shared with the health probes.

mod coordinator;
mod events;
mod state;

pub use coordinator::FailoverCoordinator;
pub use events::{FailoverEvent, FailoverEventKind, TransitionReason};
pub use state::NodeRole;
