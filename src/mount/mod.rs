//! Mount Subsystem
//!
//! Everything that touches the replication daemon's mount point: liveness
//! of the mount, the `.primary` marker protocol, and write fencing.

mod errors;
mod marker;
mod observer;

pub use errors::{MountError, MountErrorKind, MountResult};
pub use marker::MarkerWriter;
pub use observer::{MountObserver, PrimaryMarker, BLOCKED_MARKER, PRIMARY_MARKER};
