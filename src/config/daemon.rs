//! Daemon Config Document
//!
//! Renders validated [`ClusterSettings`] into the replication daemon's YAML
//! configuration and parses such a document back. Rendering then re-parsing
//! yields an equivalent settings object for every field the document
//! carries; fields the daemon does not know about (forwarding, the enabled
//! switch) come back as defaults.
//!
//! Writing the document to disk and handing it to the daemon stays with the
//! caller.

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigResult};
use super::settings::{ClusterSettings, LeaderElectionMode, ProxySettings};

#[derive(Debug, Serialize, Deserialize)]
struct DaemonConfig {
    fuse: DirSection,
    data: DirSection,
    databases: Vec<DatabaseSection>,
    lease: LeaseSection,
    proxy: ProxySection,
}

#[derive(Debug, Serialize, Deserialize)]
struct DirSection {
    dir: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LeaseSection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    self_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peers: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProxySection {
    addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    db: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    passthrough: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_redirect_timeout: Option<String>,
}

/// Render settings into the daemon's YAML document.
pub fn render_daemon_config(settings: &ClusterSettings) -> ConfigResult<String> {
    let proxy = match &settings.proxy {
        Some(proxy) => ProxySection {
            addr: settings.proxy_addr.clone(),
            target: Some(proxy.target.clone()),
            db: Some(proxy.db.clone()),
            passthrough: Some(proxy.passthrough.clone()),
            primary_redirect_timeout: Some(proxy.primary_redirect_timeout.clone()),
        },
        None => ProxySection {
            addr: settings.proxy_addr.clone(),
            target: None,
            db: None,
            passthrough: None,
            primary_redirect_timeout: None,
        },
    };

    let lease = match settings.leader_election {
        LeaderElectionMode::Static => LeaseSection {
            kind: "static".to_string(),
            hostname: settings.primary_hostname.clone(),
            self_addr: None,
            peers: None,
        },
        LeaderElectionMode::Raft => LeaseSection {
            kind: "raft".to_string(),
            hostname: None,
            self_addr: settings.self_addr.clone(),
            peers: Some(settings.peers.clone()),
        },
    };

    let config = DaemonConfig {
        fuse: DirSection {
            dir: settings.mount_path.display().to_string(),
        },
        data: DirSection {
            dir: settings.data_path.display().to_string(),
        },
        databases: vec![DatabaseSection {
            path: settings.database_name.clone(),
        }],
        lease,
        proxy,
    };

    serde_yaml::to_string(&config)
        .map_err(|e| ConfigError::daemon_yaml("could not render daemon config", e))
}

/// Parse the daemon's YAML document back into settings.
///
/// Fields the document does not carry default: `enabled` is true and no
/// forwarding block is attached.
pub fn parse_daemon_config(document: &str) -> ConfigResult<ClusterSettings> {
    let config: DaemonConfig = serde_yaml::from_str(document)
        .map_err(|e| ConfigError::daemon_yaml("could not parse daemon config", e))?;

    let database = config
        .databases
        .into_iter()
        .next()
        .ok_or_else(|| ConfigError::daemon_config("databases list is empty"))?;

    let leader_election = LeaderElectionMode::parse(&config.lease.kind)?;

    let proxy_addr = config.proxy.addr.clone();
    let mut builder = ClusterSettings::builder(
        config.fuse.dir,
        config.data.dir,
        database.path,
        leader_election,
    )
    .proxy_addr(proxy_addr.clone());

    if let Some(hostname) = config.lease.hostname {
        builder = builder.primary_hostname(hostname);
    }
    if let Some(addr) = config.lease.self_addr {
        builder = builder.self_addr(addr);
    }
    if let Some(peers) = config.lease.peers {
        builder = builder.peers(peers);
    }
    if let (Some(target), Some(db)) = (config.proxy.target, config.proxy.db) {
        let mut proxy = ProxySettings::new(proxy_addr, target, db)?;
        if let Some(passthrough) = config.proxy.passthrough {
            proxy.passthrough = passthrough;
        }
        if let Some(timeout) = config.proxy.primary_redirect_timeout {
            proxy.primary_redirect_timeout = timeout;
        }
        builder = builder.proxy(proxy);
    }

    builder.build()
}
