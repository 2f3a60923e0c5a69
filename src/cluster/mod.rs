//! Cluster State and Split-Brain Detection
//!
//! Value objects describing the cluster and the detector that watches them
//! for multiple concurrent leaders.

mod split_brain;
mod state;

pub use split_brain::{SplitBrainDetection, SplitBrainDetector, SplitBrainStatus};
pub use state::{RaftClusterState, RaftNodeState};
