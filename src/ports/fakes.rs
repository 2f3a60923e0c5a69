//! In-Process Port Fakes
//!
//! Deterministic port implementations for tests and local wiring. Each
//! fake is safe for concurrent use and scriptable from the outside.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::cluster::RaftClusterState;
use crate::events::{ClusterEvent, EventEmitter};
use crate::forward::{ForwardRequest, ForwardResponse, ForwardTransport, TransportError};
use crate::health::HealthState;
use crate::metrics::MetricsPort;
use crate::mount::MountResult;
use crate::ports::{
    ClusterStateSource, ConflictResolution, LeaderElection, PortError, PortResult,
    PrimaryDetector, RaftLeaderElection, ResolutionStrategy,
};

/// Leader-election fake with scriptable election and quorum outcomes.
pub struct FakeLeaderElection {
    elected: AtomicBool,
    quorum: AtomicBool,
    failing: AtomicBool,
    demote_calls: AtomicUsize,
    members: Vec<String>,
    state: Mutex<Option<RaftClusterState>>,
}

impl FakeLeaderElection {
    pub fn new(elected: bool) -> Self {
        Self {
            elected: AtomicBool::new(elected),
            quorum: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            demote_calls: AtomicUsize::new(0),
            members: Vec::new(),
            state: Mutex::new(None),
        }
    }

    pub fn with_members(mut self, members: Vec<String>) -> Self {
        self.members = members;
        self
    }

    pub fn set_elected(&self, elected: bool) {
        self.elected.store(elected, Ordering::SeqCst);
    }

    pub fn set_quorum(&self, quorum: bool) {
        self.quorum.store(quorum, Ordering::SeqCst);
    }

    /// Make every port call fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_cluster_state(&self, state: RaftClusterState) {
        *self.state.lock().unwrap() = Some(state);
    }

    pub fn demote_calls(&self) -> usize {
        self.demote_calls.load(Ordering::SeqCst)
    }

    fn gate(&self) -> PortResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PortError::new("leader election port unreachable"))
        } else {
            Ok(())
        }
    }
}

impl LeaderElection for FakeLeaderElection {
    fn is_leader_elected(&self) -> PortResult<bool> {
        self.gate()?;
        Ok(self.elected.load(Ordering::SeqCst))
    }

    fn elect_as_leader(&self) -> PortResult<()> {
        self.gate()?;
        self.elected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn demote_from_leader(&self) -> PortResult<()> {
        self.demote_calls.fetch_add(1, Ordering::SeqCst);
        self.gate()?;
        self.elected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl RaftLeaderElection for FakeLeaderElection {
    fn is_quorum_reached(&self) -> PortResult<bool> {
        self.gate()?;
        Ok(self.quorum.load(Ordering::SeqCst))
    }

    fn get_cluster_members(&self) -> PortResult<Vec<String>> {
        self.gate()?;
        Ok(self.members.clone())
    }

    fn get_cluster_state(&self) -> PortResult<RaftClusterState> {
        self.gate()?;
        self.state
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PortError::new("no cluster state scripted"))
    }

    fn detect_split_brain(&self) -> PortResult<bool> {
        Ok(self.get_cluster_state()?.has_split_brain())
    }

    fn get_election_timeout(&self) -> PortResult<Duration> {
        self.gate()?;
        Ok(Duration::from_secs(5))
    }
}

/// Primary-detector fake.
pub struct FakePrimaryDetector {
    primary: AtomicBool,
}

impl FakePrimaryDetector {
    pub fn new(primary: bool) -> Self {
        Self {
            primary: AtomicBool::new(primary),
        }
    }

    pub fn set_primary(&self, primary: bool) {
        self.primary.store(primary, Ordering::SeqCst);
    }
}

impl PrimaryDetector for FakePrimaryDetector {
    fn is_primary(&self) -> MountResult<bool> {
        Ok(self.primary.load(Ordering::SeqCst))
    }
}

/// Cluster-state source fake.
pub struct FakeClusterStateSource {
    state: Mutex<Option<RaftClusterState>>,
}

impl FakeClusterStateSource {
    pub fn new(state: RaftClusterState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// A source whose cluster state cannot be observed.
    pub fn unavailable() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    pub fn set_state(&self, state: RaftClusterState) {
        *self.state.lock().unwrap() = Some(state);
    }
}

impl ClusterStateSource for FakeClusterStateSource {
    fn cluster_state(&self) -> PortResult<RaftClusterState> {
        self.state
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PortError::new("cluster state unavailable"))
    }
}

/// Emitter that records every event it receives.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<ClusterEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClusterEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.event_name())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: &ClusterEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Conflict-resolution fake counting fence invocations.
#[derive(Default)]
pub struct FakeConflictResolution {
    fence_calls: AtomicUsize,
}

impl FakeConflictResolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fence_calls(&self) -> usize {
        self.fence_calls.load(Ordering::SeqCst)
    }
}

impl ConflictResolution for FakeConflictResolution {
    fn fence_write_access(&self) -> MountResult<()> {
        self.fence_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn apply_resolution_strategy(&self, _strategy: ResolutionStrategy) -> MountResult<()> {
        Ok(())
    }
}

/// Metrics fake remembering the last value written to each gauge.
#[derive(Default)]
pub struct RecordingMetrics {
    node_state: Mutex<Option<bool>>,
    health_status: Mutex<Option<HealthState>>,
    split_brain_detected: Mutex<Option<bool>>,
    leader_elected: Mutex<Option<bool>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_state(&self) -> Option<bool> {
        *self.node_state.lock().unwrap()
    }

    pub fn health_status(&self) -> Option<HealthState> {
        *self.health_status.lock().unwrap()
    }

    pub fn split_brain_detected(&self) -> Option<bool> {
        *self.split_brain_detected.lock().unwrap()
    }

    pub fn leader_elected(&self) -> Option<bool> {
        *self.leader_elected.lock().unwrap()
    }
}

impl MetricsPort for RecordingMetrics {
    fn set_node_state(&self, is_primary: bool) {
        *self.node_state.lock().unwrap() = Some(is_primary);
    }

    fn set_health_status(&self, status: HealthState) {
        *self.health_status.lock().unwrap() = Some(status);
    }

    fn set_split_brain_detected(&self, detected: bool) {
        *self.split_brain_detected.lock().unwrap() = Some(detected);
    }

    fn set_leader_elected(&self, elected: bool) {
        *self.leader_elected.lock().unwrap() = Some(elected);
    }
}

/// Transport fake replaying a scripted sequence of outcomes and recording
/// every outbound request.
#[derive(Default)]
pub struct FakeTransport {
    outcomes: Mutex<VecDeque<Result<ForwardResponse, TransportError>>>,
    requests: Mutex<Vec<ForwardRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next outcome; outcomes are consumed in order.
    pub fn push_outcome(&self, outcome: Result<ForwardResponse, TransportError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Every request sent through this transport, in order.
    pub fn requests(&self) -> Vec<ForwardRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ForwardTransport for FakeTransport {
    async fn send(&self, request: ForwardRequest) -> Result<ForwardResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("no outcome scripted".to_string())))
    }
}
