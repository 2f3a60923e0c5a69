//! Mount Observer
//!
//! Observes the replication daemon's mount point: whether the mount is
//! alive and what the `.primary` marker says about the cluster.
//!
//! Marker protocol:
//! - absent: no primary elected
//! - present and empty: this node is the primary
//! - present with content: another node is the primary; the content is its
//!   URL or `host:port`
//!
//! Each call re-observes the filesystem by default. An optional TTL cache
//! returns the last observation until the TTL elapses; a zero TTL disables
//! caching.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::errors::{MountError, MountResult};

/// Marker file the daemon maintains on the mount.
pub const PRIMARY_MARKER: &str = ".primary";

/// Sentinel name the marker is moved to when writes are fenced.
pub const BLOCKED_MARKER: &str = ".primary.blocked";

/// Observed state of the `.primary` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryMarker {
    /// No primary has been elected.
    Absent,
    /// This node is the primary.
    PresentEmpty,
    /// Another node is the primary; the content is its address.
    Present(String),
}

impl PrimaryMarker {
    /// The primary's address, when the marker names another node.
    pub fn primary_url(&self) -> Option<&str> {
        match self {
            Self::Present(url) => Some(url),
            _ => None,
        }
    }

    /// Whether the marker says this node is the primary.
    pub fn is_local_primary(&self) -> bool {
        matches!(self, Self::PresentEmpty)
    }
}

struct CachedObservation {
    marker: PrimaryMarker,
    observed_at: Instant,
}

/// Observer for the replicated filesystem mount.
pub struct MountObserver {
    mount_path: PathBuf,
    marker_path: PathBuf,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedObservation>>,
}

impl MountObserver {
    /// Create an observer without caching.
    pub fn new(mount_path: impl Into<PathBuf>) -> Self {
        Self::with_cache_ttl(mount_path, Duration::ZERO)
    }

    /// Create an observer that caches observations for `cache_ttl`.
    /// A zero TTL disables caching.
    pub fn with_cache_ttl(mount_path: impl Into<PathBuf>, cache_ttl: Duration) -> Self {
        let mount_path = mount_path.into();
        let marker_path = mount_path.join(PRIMARY_MARKER);
        Self {
            mount_path,
            marker_path,
            cache_ttl,
            cache: RwLock::new(None),
        }
    }

    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    /// Whether the mount directory exists and is accessible.
    pub fn mount_exists(&self) -> bool {
        self.mount_path.is_dir()
    }

    /// Fail with an infrastructure-unavailable error when the mount is gone.
    pub fn ensure_mounted(&self) -> MountResult<()> {
        if self.mount_exists() {
            Ok(())
        } else {
            Err(MountError::infrastructure_unavailable(&self.mount_path))
        }
    }

    /// Read the `.primary` marker, through the cache when one is configured.
    pub fn read_primary_marker(&self) -> MountResult<PrimaryMarker> {
        if self.cache_ttl.is_zero() {
            return self.observe();
        }

        if let Some(cached) = self
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
        {
            if cached.observed_at.elapsed() < self.cache_ttl {
                return Ok(cached.marker.clone());
            }
        }

        let marker = self.observe()?;
        *self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(CachedObservation {
            marker: marker.clone(),
            observed_at: Instant::now(),
        });
        Ok(marker)
    }

    /// Drop any cached observation.
    pub fn invalidate(&self) {
        *self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn observe(&self) -> MountResult<PrimaryMarker> {
        self.ensure_mounted()?;

        match fs::read_to_string(&self.marker_path) {
            Ok(content) => {
                let content = content.trim();
                if content.is_empty() {
                    Ok(PrimaryMarker::PresentEmpty)
                } else {
                    Ok(PrimaryMarker::Present(content.to_string()))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PrimaryMarker::Absent),
            Err(e) => Err(MountError::io(
                format!("could not read {}", self.marker_path.display()),
                e,
            )),
        }
    }
}
