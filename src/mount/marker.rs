//! Marker Maintenance and Fencing
//!
//! Writes, removes and fences the `.primary` marker. In static leader
//! election the designated primary writes the marker itself; fencing moves
//! it to a sentinel name so the filesystem rejects writes regardless of any
//! node's role belief.
//!
//! Every operation here is idempotent: fencing twice is indistinguishable
//! from fencing once, and removing a missing marker is not an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::errors::{MountError, MountResult};
use super::observer::{BLOCKED_MARKER, PRIMARY_MARKER};

/// Maintains the `.primary` marker on the mount.
pub struct MarkerWriter {
    marker_path: PathBuf,
    blocked_path: PathBuf,
}

impl MarkerWriter {
    pub fn new(mount_path: impl AsRef<Path>) -> Self {
        let mount_path = mount_path.as_ref();
        Self {
            marker_path: mount_path.join(PRIMARY_MARKER),
            blocked_path: mount_path.join(BLOCKED_MARKER),
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Write the marker with this node's identifier.
    pub fn write_marker(&self, node_id: &str) -> MountResult<()> {
        fs::write(&self.marker_path, node_id).map_err(|e| {
            MountError::io(
                format!("could not write {}", self.marker_path.display()),
                e,
            )
        })
    }

    /// Remove the marker. Missing marker is success.
    pub fn remove_marker(&self) -> MountResult<()> {
        match fs::remove_file(&self.marker_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MountError::io(
                format!("could not remove {}", self.marker_path.display()),
                e,
            )),
        }
    }

    /// Whether the marker file exists.
    pub fn marker_exists(&self) -> bool {
        self.marker_path.exists()
    }

    /// Read the marker content, trimmed. None when the marker is absent.
    pub fn read_marker(&self) -> MountResult<Option<String>> {
        match fs::read_to_string(&self.marker_path) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MountError::io(
                format!("could not read {}", self.marker_path.display()),
                e,
            )),
        }
    }

    /// Move the marker to its blocked sentinel so the daemon refuses
    /// writes. A missing marker means fencing is already in effect.
    pub fn fence(&self) -> MountResult<()> {
        match fs::rename(&self.marker_path, &self.blocked_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MountError::io(
                format!(
                    "could not fence {} to {}",
                    self.marker_path.display(),
                    self.blocked_path.display()
                ),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_remove_marker() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkerWriter::new(dir.path());

        assert!(!writer.marker_exists());
        assert_eq!(writer.read_marker().unwrap(), None);

        writer.write_marker("node1").unwrap();
        assert!(writer.marker_exists());
        assert_eq!(writer.read_marker().unwrap(), Some("node1".to_string()));

        writer.remove_marker().unwrap();
        assert!(!writer.marker_exists());
    }

    #[test]
    fn test_remove_missing_marker_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkerWriter::new(dir.path());
        writer.remove_marker().unwrap();
        writer.remove_marker().unwrap();
    }

    #[test]
    fn test_fence_moves_marker_to_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkerWriter::new(dir.path());
        writer.write_marker("node1").unwrap();

        writer.fence().unwrap();
        assert!(!writer.marker_exists());
        assert!(dir.path().join(BLOCKED_MARKER).exists());
    }

    #[test]
    fn test_fencing_twice_equals_fencing_once() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkerWriter::new(dir.path());
        writer.write_marker("node1").unwrap();

        writer.fence().unwrap();
        let blocked = fs::read_to_string(dir.path().join(BLOCKED_MARKER)).unwrap();

        writer.fence().unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join(BLOCKED_MARKER)).unwrap(),
            blocked
        );
        assert!(!writer.marker_exists());
    }

    #[test]
    fn test_fence_with_no_marker_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkerWriter::new(dir.path());
        writer.fence().unwrap();
        assert!(!dir.path().join(BLOCKED_MARKER).exists());
    }
}
