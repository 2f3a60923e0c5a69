//! Settings and Daemon-Config Tests
//!
//! Construction-time invariants for the settings object and the
//! render-then-parse round trip of the daemon configuration document.

use litefs_adapter::config::{
    parse_daemon_config, render_daemon_config, ClusterSettings, ConfigError,
    ForwardingSettings, LeaderElectionMode, ProxySettings,
};
use serde_json::json;

#[test]
fn test_paths_accepted_iff_absolute_without_traversal() {
    let cases = [
        ("/mnt/lfs", true),
        ("/", true),
        ("/var/lib/litefs/data", true),
        ("relative", false),
        ("./relative", false),
        ("mnt/lfs", false),
        ("/mnt/../etc", false),
        ("../escape", false),
    ];

    for (path, accepted) in cases {
        let result = ClusterSettings::builder(
            path,
            "/var/lib/lfs",
            "db.sqlite3",
            LeaderElectionMode::Static,
        )
        .primary_hostname("node1")
        .build();
        assert_eq!(result.is_ok(), accepted, "path: {path}");
    }
}

#[test]
fn test_daemon_config_round_trip_preserves_settings() {
    let settings = ClusterSettings::builder(
        "/mnt/lfs",
        "/var/lib/lfs",
        "db.sqlite3",
        LeaderElectionMode::Raft,
    )
    .self_addr("node1:20202")
    .peers(vec![
        "node1:20202".to_string(),
        "node2:20202".to_string(),
        "node3:20202".to_string(),
    ])
    .proxy_addr(":20202")
    .proxy(ProxySettings::new(":20202", ":8080", "db.sqlite3").unwrap())
    .build()
    .unwrap();

    let document = render_daemon_config(&settings).unwrap();
    let parsed = parse_daemon_config(&document).unwrap();

    assert_eq!(parsed.mount_path, settings.mount_path);
    assert_eq!(parsed.data_path, settings.data_path);
    assert_eq!(parsed.database_name, settings.database_name);
    assert_eq!(parsed.leader_election, settings.leader_election);
    assert_eq!(parsed.self_addr, settings.self_addr);
    assert_eq!(parsed.peers, settings.peers);
    assert_eq!(parsed.proxy_addr, settings.proxy_addr);
    let proxy = parsed.proxy.clone().unwrap();
    assert_eq!(proxy.target, ":8080");
    assert_eq!(proxy.db, "db.sqlite3");

    // Rendering the parsed settings again produces the same document.
    let second = render_daemon_config(&parsed).unwrap();
    assert_eq!(document, second);
}

#[test]
fn test_unknown_keys_rejected_everywhere() {
    let top_level = json!({
        "mount_path": "/mnt/lfs",
        "data_path": "/var/lib/lfs",
        "database_name": "db.sqlite3",
        "leader_election": "static",
        "primary_hostname": "node1",
        "retention": "24h",
    });
    assert!(matches!(
        ClusterSettings::from_value(&top_level),
        Err(ConfigError::UnknownKey(key)) if key == "retention"
    ));

    let nested = json!({
        "mount_path": "/mnt/lfs",
        "data_path": "/var/lib/lfs",
        "database_name": "db.sqlite3",
        "leader_election": "static",
        "primary_hostname": "node1",
        "forwarding": {"timeout": 30},
    });
    assert!(matches!(
        ClusterSettings::from_value(&nested),
        Err(ConfigError::UnknownKey(key)) if key == "forwarding.timeout"
    ));
}

#[test]
fn test_mode_requirements() {
    // Static without a primary hostname fails.
    let static_missing = json!({
        "mount_path": "/mnt/lfs",
        "data_path": "/var/lib/lfs",
        "database_name": "db.sqlite3",
        "leader_election": "static",
    });
    assert!(ClusterSettings::from_value(&static_missing).is_err());

    // Raft needs self_addr and peers.
    let raft_missing_peers = json!({
        "mount_path": "/mnt/lfs",
        "data_path": "/var/lib/lfs",
        "database_name": "db.sqlite3",
        "leader_election": "raft",
        "self_addr": "node1:20202",
    });
    assert!(ClusterSettings::from_value(&raft_missing_peers).is_err());

    // Static mode ignores raft fields even when malformed.
    let static_with_bad_raft = json!({
        "mount_path": "/mnt/lfs",
        "data_path": "/var/lib/lfs",
        "database_name": "db.sqlite3",
        "leader_election": "static",
        "primary_hostname": "node1",
        "self_addr": "",
        "peers": 42,
    });
    assert!(ClusterSettings::from_value(&static_with_bad_raft).is_ok());
}

#[test]
fn test_invalid_leader_election_value() {
    let doc = json!({
        "mount_path": "/mnt/lfs",
        "data_path": "/var/lib/lfs",
        "database_name": "db.sqlite3",
        "leader_election": "paxos",
    });
    assert!(matches!(
        ClusterSettings::from_value(&doc),
        Err(ConfigError::InvalidLeaderElection(mode)) if mode == "paxos"
    ));
}

#[test]
fn test_forwarding_defaults_and_validation() {
    let defaults = ForwardingSettings::default();
    assert!(!defaults.enabled);
    assert_eq!(defaults.retry_count, 1);
    assert!(defaults.breaker_enabled());
    assert!(defaults.validate().is_ok());
}
