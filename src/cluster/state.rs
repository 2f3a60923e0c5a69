//! Cluster State Model
//!
//! Immutable value objects describing each node's self-belief and the
//! aggregate cluster snapshot. These are the vocabulary of split-brain
//! detection and failover coordination; all derivations are pure.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{ConfigError, ConfigResult};

/// One node's view of itself.
///
/// A node that believes it is the leader receives no heartbeats from
/// itself, so `believes_is_leader` implies `last_heartbeat` is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaftNodeState {
    node_id: String,
    believes_is_leader: bool,
    election_term: u64,
    last_heartbeat: Option<DateTime<Utc>>,
}

impl RaftNodeState {
    pub fn new(
        node_id: impl Into<String>,
        believes_is_leader: bool,
        election_term: u64,
        last_heartbeat: Option<DateTime<Utc>>,
    ) -> ConfigResult<Self> {
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(ConfigError::EmptyField("node_id"));
        }
        if believes_is_leader && last_heartbeat.is_some() {
            return Err(ConfigError::invalid_value(
                "last_heartbeat",
                "none for a node that believes it is leader",
                node_id,
            ));
        }
        Ok(Self {
            node_id,
            believes_is_leader,
            election_term,
            last_heartbeat,
        })
    }

    /// Shorthand for a node claiming leadership.
    pub fn leader(node_id: impl Into<String>, election_term: u64) -> ConfigResult<Self> {
        Self::new(node_id, true, election_term, None)
    }

    /// Shorthand for a follower.
    pub fn follower(
        node_id: impl Into<String>,
        election_term: u64,
        last_heartbeat: Option<DateTime<Utc>>,
    ) -> ConfigResult<Self> {
        Self::new(node_id, false, election_term, last_heartbeat)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn believes_is_leader(&self) -> bool {
        self.believes_is_leader
    }

    pub fn election_term(&self) -> u64 {
        self.election_term
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat
    }
}

/// Snapshot of every node in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaftClusterState {
    members: BTreeMap<String, RaftNodeState>,
    quorum_size: usize,
}

impl RaftClusterState {
    /// Build a snapshot with an explicit quorum size.
    pub fn new(members: Vec<RaftNodeState>, quorum_size: usize) -> ConfigResult<Self> {
        if members.is_empty() {
            return Err(ConfigError::EmptyField("members"));
        }
        if quorum_size < 1 || quorum_size > members.len() {
            return Err(ConfigError::invalid_value(
                "quorum_size",
                "between 1 and the member count",
                quorum_size.to_string(),
            ));
        }
        let members = members
            .into_iter()
            .map(|node| (node.node_id.clone(), node))
            .collect();
        Ok(Self {
            members,
            quorum_size,
        })
    }

    /// Build a snapshot with majority quorum, `n / 2 + 1`.
    pub fn with_majority_quorum(members: Vec<RaftNodeState>) -> ConfigResult<Self> {
        let quorum = members.len() / 2 + 1;
        Self::new(members, quorum)
    }

    pub fn members(&self) -> &BTreeMap<String, RaftNodeState> {
        &self.members
    }

    pub fn quorum_size(&self) -> usize {
        self.quorum_size
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.members.contains_key(node_id)
    }

    /// Ids of every node claiming leadership, in stable order.
    pub fn leaders_detected(&self) -> Vec<String> {
        self.members
            .values()
            .filter(|node| node.believes_is_leader)
            .map(|node| node.node_id.clone())
            .collect()
    }

    pub fn count_leaders(&self) -> usize {
        self.members
            .values()
            .filter(|node| node.believes_is_leader)
            .count()
    }

    /// Two or more simultaneous leaders is a split-brain.
    pub fn has_split_brain(&self) -> bool {
        self.count_leaders() >= 2
    }

    pub fn is_leaderless(&self) -> bool {
        self.count_leaders() == 0
    }

    pub fn has_single_leader(&self) -> bool {
        self.count_leaders() == 1
    }
}
