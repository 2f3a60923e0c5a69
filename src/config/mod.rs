//! Configuration Subsystem
//!
//! Process-wide settings for the cluster adapter. Settings are validated at
//! construction and immutable afterwards; every other subsystem receives
//! them by shared reference at startup.

mod daemon;
mod errors;
mod forwarding;
mod settings;

pub use daemon::{parse_daemon_config, render_daemon_config};
pub use errors::{ConfigError, ConfigResult};
pub use forwarding::{ForwardScheme, ForwardingSettings};
pub use settings::{
    ClusterSettings, ClusterSettingsBuilder, LeaderElectionMode, ProxySettings,
};
