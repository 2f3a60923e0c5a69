//! Write-Guard Invariant Tests
//!
//! The two rejection rules must hold before anything executes:
//! - every write on a non-primary fails with a not-primary error,
//! - every write under an observed split-brain fails with a split-brain
//!   error regardless of role,
//! and a script never partially executes once either guard fires.

use std::sync::Arc;

use litefs_adapter::cluster::{RaftClusterState, RaftNodeState, SplitBrainDetector};
use litefs_adapter::config::{ClusterSettings, LeaderElectionMode};
use litefs_adapter::guard::{GuardErrorKind, WriteGuard};
use litefs_adapter::mount::MountObserver;
use litefs_adapter::ports::fakes::FakeClusterStateSource;
use litefs_adapter::role::RoleResolver;

fn mounted_observer() -> Arc<MountObserver> {
    let dir = tempfile::tempdir().unwrap();
    let observer = Arc::new(MountObserver::new(dir.path()));
    std::mem::forget(dir);
    observer
}

fn cluster(leader_ids: &[&str]) -> RaftClusterState {
    let mut members: Vec<RaftNodeState> = leader_ids
        .iter()
        .map(|id| RaftNodeState::leader(*id, 7).unwrap())
        .collect();
    members.push(RaftNodeState::follower("node9", 7, None).unwrap());
    RaftClusterState::with_majority_quorum(members).unwrap()
}

/// Write on a replica is rejected with enough context for operators, and
/// nothing executes.
#[test]
fn test_write_on_replica_rejected_with_context() {
    // Static election, primary is node1, this node is node2.
    let settings = ClusterSettings::builder(
        "/mnt/lfs",
        "/var/lib/lfs",
        "db.sqlite3",
        LeaderElectionMode::Static,
    )
    .primary_hostname("node1")
    .build()
    .unwrap();

    let role = Arc::new(RoleResolver::static_mode(
        settings.primary_hostname.clone().unwrap(),
        "node2",
        mounted_observer(),
    ));
    let guard = WriteGuard::new(role);

    let mut executed = false;
    let result = guard.run_statement("INSERT INTO t VALUES (1)", || {
        executed = true;
    });

    let err = result.unwrap_err();
    assert_eq!(err.kind(), GuardErrorKind::NotPrimary);
    let message = err.to_string();
    assert!(message.contains("not primary"));
    assert!(message.contains("replica"));
    assert!(!executed);
}

/// Reads are never guarded, even on a replica during split-brain.
#[test]
fn test_reads_bypass_both_checks() {
    let role = Arc::new(RoleResolver::static_mode(
        "node1",
        "node2",
        mounted_observer(),
    ));
    let detector = Arc::new(SplitBrainDetector::new(
        Arc::new(FakeClusterStateSource::new(cluster(&["node1", "node2"]))),
        "node1",
        LeaderElectionMode::Raft,
    ));
    let guard = WriteGuard::with_detector(role, detector);

    assert!(guard.check_statement("SELECT * FROM t WHERE delete_flag = 1").is_ok());
    assert!(guard.check_statement("PRAGMA journal_mode").is_ok());
    assert!(guard.check_statement("   ").is_ok());
}

/// A script with any write is all-or-nothing: with two leaders observed,
/// neither statement runs even on the primary.
#[test]
fn test_script_guard_is_all_or_nothing_under_split_brain() {
    let role = Arc::new(RoleResolver::static_mode(
        "node1",
        "node1",
        mounted_observer(),
    ));
    let detector = Arc::new(SplitBrainDetector::new(
        Arc::new(FakeClusterStateSource::new(cluster(&["node1", "node2"]))),
        "node1",
        LeaderElectionMode::Raft,
    ));
    let guard = WriteGuard::with_detector(role, detector);

    let mut statements_run = 0;
    let result = guard.run_script(
        "INSERT INTO a VALUES (1); INSERT INTO b VALUES (2);",
        || {
            statements_run += 2;
        },
    );

    let err = result.unwrap_err();
    assert_eq!(err.kind(), GuardErrorKind::SplitBrain);
    let message = err.to_string();
    assert!(message.contains("split-brain"));
    assert!(message.contains('2'));
    assert_eq!(statements_run, 0);
}

/// The split-brain check runs before the role check: a replica write
/// during split-brain reports split-brain, not not-primary.
#[test]
fn test_split_brain_error_wins_over_not_primary() {
    let role = Arc::new(RoleResolver::static_mode(
        "node1",
        "node2",
        mounted_observer(),
    ));
    let detector = Arc::new(SplitBrainDetector::new(
        Arc::new(FakeClusterStateSource::new(cluster(&["node1", "node3"]))),
        "node1",
        LeaderElectionMode::Raft,
    ));
    let guard = WriteGuard::with_detector(role, detector);

    let err = guard.check_statement("DELETE FROM t").unwrap_err();
    assert_eq!(err.kind(), GuardErrorKind::SplitBrain);
}

/// Without a wired detector the role check still runs.
#[test]
fn test_optional_detector_keeps_role_check() {
    let role = Arc::new(RoleResolver::static_mode(
        "node1",
        "node2",
        mounted_observer(),
    ));
    let guard = WriteGuard::new(role);

    let err = guard.check_script("CREATE TABLE t (id INTEGER);").unwrap_err();
    assert_eq!(err.kind(), GuardErrorKind::NotPrimary);
}

/// Detector failures are fail-closed on the write path: the caller sees
/// the underlying failure instead of a silent write.
#[test]
fn test_detection_failure_refuses_the_write() {
    let role = Arc::new(RoleResolver::static_mode(
        "node1",
        "node1",
        mounted_observer(),
    ));
    let detector = Arc::new(SplitBrainDetector::new(
        Arc::new(FakeClusterStateSource::unavailable()),
        "node1",
        LeaderElectionMode::Raft,
    ));
    let guard = WriteGuard::with_detector(role, detector);

    let err = guard.check_statement("UPDATE t SET x = 1").unwrap_err();
    assert_eq!(err.kind(), GuardErrorKind::Detection);
    assert!(std::error::Error::source(&err).is_some());
}

/// Single-leader clusters guard nothing beyond the role rule.
#[test]
fn test_single_leader_cluster_allows_primary_writes() {
    let role = Arc::new(RoleResolver::static_mode(
        "node1",
        "node1",
        mounted_observer(),
    ));
    let detector = Arc::new(SplitBrainDetector::new(
        Arc::new(FakeClusterStateSource::new(cluster(&["node1"]))),
        "node1",
        LeaderElectionMode::Raft,
    ));
    let guard = WriteGuard::with_detector(role, detector);

    assert!(guard.check_statement("INSERT INTO t VALUES (1)").is_ok());
    assert!(guard
        .check_script("INSERT INTO a VALUES (1); INSERT INTO b VALUES (2);")
        .is_ok());
}
