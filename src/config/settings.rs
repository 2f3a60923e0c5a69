//! Cluster Settings
//!
//! The process-wide configuration object. Constructed once at startup via
//! [`ClusterSettingsBuilder`] or [`ClusterSettings::from_value`] and passed
//! by shared reference to every component; never mutated afterwards.
//!
//! Invariants enforced at construction:
//! - `mount_path` and `data_path` are absolute and contain no `..` segment
//! - `database_name` is non-empty and non-whitespace
//! - static mode requires `primary_hostname`; raft fields are ignored
//! - raft mode requires `self_addr` and a non-empty `peers` list
//! - unknown keys in a settings document are rejected at parse time

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use super::errors::{ConfigError, ConfigResult};
use super::forwarding::{ForwardScheme, ForwardingSettings};

/// Leader-election mode for the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderElectionMode {
    /// The primary is fixed by configuration: the node whose hostname
    /// matches `primary_hostname` byte-for-byte is the primary.
    Static,

    /// The primary is chosen by Raft consensus through the
    /// leader-election port.
    Raft,
}

impl LeaderElectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Raft => "raft",
        }
    }

    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value {
            "static" => Ok(Self::Static),
            "raft" => Ok(Self::Raft),
            other => Err(ConfigError::InvalidLeaderElection(other.to_string())),
        }
    }
}

/// Settings for the replication daemon's own HTTP proxy.
///
/// Passed through into the generated daemon config; the core itself only
/// forwards through the proxy, it never binds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Listen address of the daemon proxy.
    pub addr: String,
    /// Address the proxy forwards to (the application listener).
    pub target: String,
    /// Database the proxy tracks transaction ids for.
    pub db: String,
    /// Paths the proxy passes through without consistency handling.
    pub passthrough: Vec<String>,
    /// How long the proxy waits for a primary redirect.
    pub primary_redirect_timeout: String,
}

impl ProxySettings {
    pub fn new(
        addr: impl Into<String>,
        target: impl Into<String>,
        db: impl Into<String>,
    ) -> ConfigResult<Self> {
        let settings = Self {
            addr: addr.into(),
            target: target.into(),
            db: db.into(),
            passthrough: Vec::new(),
            primary_redirect_timeout: "5s".to_string(),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.addr.trim().is_empty() {
            return Err(ConfigError::EmptyField("proxy.addr"));
        }
        if self.target.trim().is_empty() {
            return Err(ConfigError::EmptyField("proxy.target"));
        }
        if self.db.trim().is_empty() {
            return Err(ConfigError::EmptyField("proxy.db"));
        }
        Ok(())
    }
}

/// Process-wide cluster settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSettings {
    /// Where the replicated filesystem is mounted.
    pub mount_path: PathBuf,
    /// Where the replication daemon keeps its own state.
    pub data_path: PathBuf,
    /// Name of the replicated database file under the mount.
    pub database_name: String,
    /// How the primary is chosen.
    pub leader_election: LeaderElectionMode,
    /// Listen specifier of the daemon's HTTP proxy.
    pub proxy_addr: String,
    /// Master switch; when false the adapter performs no coordination.
    pub enabled: bool,
    /// Hostname of the fixed primary (static mode only).
    pub primary_hostname: Option<String>,
    /// This node's raft address (raft mode only).
    pub self_addr: Option<String>,
    /// All raft peer addresses (raft mode only).
    pub peers: Vec<String>,
    /// Optional write-forwarding configuration.
    pub forwarding: Option<ForwardingSettings>,
    /// Optional daemon proxy configuration.
    pub proxy: Option<ProxySettings>,
}

impl ClusterSettings {
    /// Start building settings from the always-required fields.
    pub fn builder(
        mount_path: impl Into<PathBuf>,
        data_path: impl Into<PathBuf>,
        database_name: impl Into<String>,
        leader_election: LeaderElectionMode,
    ) -> ClusterSettingsBuilder {
        ClusterSettingsBuilder {
            settings: ClusterSettings {
                mount_path: mount_path.into(),
                data_path: data_path.into(),
                database_name: database_name.into(),
                leader_election,
                proxy_addr: String::new(),
                enabled: true,
                primary_hostname: None,
                self_addr: None,
                peers: Vec::new(),
                forwarding: None,
                proxy: None,
            },
        }
    }

    /// Parse settings from a JSON-shaped document.
    ///
    /// Unknown keys are rejected; recognized keys are exactly the fields of
    /// this struct. Sub-documents (`forwarding`, `proxy`) apply the same
    /// rule to their own keys.
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ConfigError::invalid_value("settings", "an object", value.to_string()))?;

        for key in map.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                return Err(ConfigError::UnknownKey(key.clone()));
            }
        }

        let leader_election = LeaderElectionMode::parse(require_str(map, "leader_election")?)?;

        let mut builder = Self::builder(
            require_str(map, "mount_path")?,
            require_str(map, "data_path")?,
            require_str(map, "database_name")?,
            leader_election,
        );

        if let Some(addr) = optional_str(map, "proxy_addr")? {
            builder = builder.proxy_addr(addr);
        }
        if let Some(enabled) = map.get("enabled") {
            let enabled = enabled.as_bool().ok_or_else(|| {
                ConfigError::invalid_value("enabled", "a boolean", enabled.to_string())
            })?;
            builder = builder.enabled(enabled);
        }
        if let Some(hostname) = optional_str(map, "primary_hostname")? {
            builder = builder.primary_hostname(hostname);
        }
        // In static mode the raft fields are ignored entirely, even when
        // malformed.
        if leader_election == LeaderElectionMode::Raft {
            if let Some(addr) = optional_str(map, "self_addr")? {
                builder = builder.self_addr(addr);
            }
            if let Some(peers) = map.get("peers") {
                builder = builder.peers(parse_string_list("peers", peers)?);
            }
        }
        if let Some(fwd) = map.get("forwarding") {
            builder = builder.forwarding(parse_forwarding(fwd)?);
        }
        if let Some(proxy) = map.get("proxy") {
            builder = builder.proxy(parse_proxy(proxy)?);
        }

        builder.build()
    }

    /// Whether this configuration uses raft-based leader election.
    pub fn is_raft(&self) -> bool {
        self.leader_election == LeaderElectionMode::Raft
    }

    fn validate(&self) -> ConfigResult<()> {
        validate_path("mount_path", &self.mount_path)?;
        validate_path("data_path", &self.data_path)?;

        if self.database_name.trim().is_empty() {
            return Err(ConfigError::EmptyField("database_name"));
        }

        match self.leader_election {
            LeaderElectionMode::Static => {
                // Raft fields are ignored here even if present and malformed.
                match &self.primary_hostname {
                    Some(hostname) if !hostname.trim().is_empty() => {}
                    _ => {
                        return Err(ConfigError::MissingModeField {
                            field: "primary_hostname",
                            mode: "static",
                        })
                    }
                }
            }
            LeaderElectionMode::Raft => {
                match &self.self_addr {
                    Some(addr) if !addr.trim().is_empty() => {}
                    _ => {
                        return Err(ConfigError::MissingModeField {
                            field: "self_addr",
                            mode: "raft",
                        })
                    }
                }
                if self.peers.is_empty() {
                    return Err(ConfigError::MissingModeField {
                        field: "peers",
                        mode: "raft",
                    });
                }
                for peer in &self.peers {
                    if peer.trim().is_empty() {
                        return Err(ConfigError::EmptyField("peers"));
                    }
                }
            }
        }

        if let Some(forwarding) = &self.forwarding {
            forwarding.validate()?;
        }
        if let Some(proxy) = &self.proxy {
            proxy.validate()?;
        }

        Ok(())
    }
}

/// Builder enforcing settings invariants at `build` time.
pub struct ClusterSettingsBuilder {
    settings: ClusterSettings,
}

impl ClusterSettingsBuilder {
    pub fn proxy_addr(mut self, addr: impl Into<String>) -> Self {
        self.settings.proxy_addr = addr.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.settings.enabled = enabled;
        self
    }

    pub fn primary_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.settings.primary_hostname = Some(hostname.into());
        self
    }

    pub fn self_addr(mut self, addr: impl Into<String>) -> Self {
        self.settings.self_addr = Some(addr.into());
        self
    }

    pub fn peers(mut self, peers: Vec<String>) -> Self {
        self.settings.peers = peers;
        self
    }

    pub fn forwarding(mut self, forwarding: ForwardingSettings) -> Self {
        self.settings.forwarding = Some(forwarding);
        self
    }

    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.settings.proxy = Some(proxy);
        self
    }

    pub fn build(self) -> ConfigResult<ClusterSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

const KNOWN_KEYS: &[&str] = &[
    "mount_path",
    "data_path",
    "database_name",
    "leader_election",
    "proxy_addr",
    "enabled",
    "primary_hostname",
    "self_addr",
    "peers",
    "forwarding",
    "proxy",
];

const KNOWN_FORWARDING_KEYS: &[&str] = &[
    "enabled",
    "connect_timeout",
    "read_timeout",
    "retry_count",
    "retry_backoff_base",
    "max_backoff",
    "circuit_breaker_threshold",
    "circuit_reset_timeout",
    "excluded_exact",
    "excluded_glob",
    "excluded_regex",
    "scheme",
    "primary_hint",
];

const KNOWN_PROXY_KEYS: &[&str] = &[
    "addr",
    "target",
    "db",
    "passthrough",
    "primary_redirect_timeout",
];

fn validate_path(field: &'static str, path: &Path) -> ConfigResult<()> {
    // Traversal is rejected first so a relative `../x` reports the sharper error.
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(ConfigError::PathTraversal {
            field,
            value: path.display().to_string(),
        });
    }
    if !path.is_absolute() {
        return Err(ConfigError::RelativePath {
            field,
            value: path.display().to_string(),
        });
    }
    Ok(())
}

fn require_str<'a>(
    map: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> ConfigResult<&'a str> {
    match map.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ConfigError::invalid_value(
            field,
            "a string",
            other.to_string(),
        )),
        None => Err(ConfigError::EmptyField(field)),
    }
}

fn optional_str<'a>(
    map: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> ConfigResult<Option<&'a str>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ConfigError::invalid_value(
            field,
            "a string",
            other.to_string(),
        )),
    }
}

fn parse_string_list(field: &'static str, value: &Value) -> ConfigResult<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| ConfigError::invalid_value(field, "a list of strings", value.to_string()))?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ConfigError::invalid_value(field, "a list of strings", item.to_string())
            })
        })
        .collect()
}

fn parse_duration_secs(field: &'static str, value: &Value) -> ConfigResult<Duration> {
    let secs = value
        .as_f64()
        .ok_or_else(|| ConfigError::invalid_value(field, "a number of seconds", value.to_string()))?;
    if secs <= 0.0 || !secs.is_finite() {
        return Err(ConfigError::invalid_value(
            field,
            "positive",
            value.to_string(),
        ));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_u32(field: &'static str, value: &Value) -> ConfigResult<u32> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            ConfigError::invalid_value(field, "a non-negative integer", value.to_string())
        })
}

fn parse_forwarding(value: &Value) -> ConfigResult<ForwardingSettings> {
    let map = value.as_object().ok_or_else(|| {
        ConfigError::invalid_value("forwarding", "an object", value.to_string())
    })?;

    for key in map.keys() {
        if !KNOWN_FORWARDING_KEYS.contains(&key.as_str()) {
            return Err(ConfigError::UnknownKey(format!("forwarding.{key}")));
        }
    }

    let mut settings = ForwardingSettings::default();
    if let Some(enabled) = map.get("enabled") {
        settings.enabled = enabled.as_bool().ok_or_else(|| {
            ConfigError::invalid_value("forwarding.enabled", "a boolean", enabled.to_string())
        })?;
    }
    if let Some(v) = map.get("connect_timeout") {
        settings.connect_timeout = parse_duration_secs("connect_timeout", v)?;
    }
    if let Some(v) = map.get("read_timeout") {
        settings.read_timeout = parse_duration_secs("read_timeout", v)?;
    }
    if let Some(v) = map.get("retry_count") {
        settings.retry_count = parse_u32("retry_count", v)?;
    }
    if let Some(v) = map.get("retry_backoff_base") {
        settings.retry_backoff_base = parse_duration_secs("retry_backoff_base", v)?;
    }
    if let Some(v) = map.get("max_backoff") {
        settings.max_backoff = parse_duration_secs("max_backoff", v)?;
    }
    if let Some(v) = map.get("circuit_breaker_threshold") {
        settings.circuit_breaker_threshold = parse_u32("circuit_breaker_threshold", v)?;
    }
    if let Some(v) = map.get("circuit_reset_timeout") {
        settings.circuit_reset_timeout = parse_duration_secs("circuit_reset_timeout", v)?;
    }
    if let Some(v) = map.get("excluded_exact") {
        settings.excluded_exact = parse_string_list("excluded_exact", v)?.into_iter().collect();
    }
    if let Some(v) = map.get("excluded_glob") {
        settings.excluded_glob = parse_string_list("excluded_glob", v)?;
    }
    if let Some(v) = map.get("excluded_regex") {
        settings.excluded_regex = parse_string_list("excluded_regex", v)?;
    }
    if let Some(v) = map.get("scheme") {
        let scheme = v.as_str().ok_or_else(|| {
            ConfigError::invalid_value("forwarding.scheme", "a string", v.to_string())
        })?;
        settings.scheme = ForwardScheme::parse(scheme)?;
    }
    if let Some(hint) = optional_str(map, "primary_hint")? {
        settings.primary_hint = Some(hint.to_string());
    }

    settings.validate()?;
    Ok(settings)
}

fn parse_proxy(value: &Value) -> ConfigResult<ProxySettings> {
    let map = value
        .as_object()
        .ok_or_else(|| ConfigError::invalid_value("proxy", "an object", value.to_string()))?;

    for key in map.keys() {
        if !KNOWN_PROXY_KEYS.contains(&key.as_str()) {
            return Err(ConfigError::UnknownKey(format!("proxy.{key}")));
        }
    }

    let mut proxy = ProxySettings::new(
        require_str(map, "addr")?,
        require_str(map, "target")?,
        require_str(map, "db")?,
    )?;
    if let Some(v) = map.get("passthrough") {
        proxy.passthrough = parse_string_list("passthrough", v)?;
    }
    if let Some(timeout) = optional_str(map, "primary_redirect_timeout")? {
        proxy.primary_redirect_timeout = timeout.to_string();
    }
    Ok(proxy)
}
