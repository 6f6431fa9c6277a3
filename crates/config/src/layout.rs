//! On-disk layout of the warden data directory
//!
//! ```text
//! <data>/
//!   versions/<version>-<short_commit>/   immutable installed trees
//!   current                              symlink to the active version
//!   staging/                             fetch scratch space
//!   .upgrade-marker.json                 in-flight upgrade record
//!   watcher.pid                          watchdog liveness handle
//!   status.json                          agent heartbeat snapshot
//! ```

use std::path::{Path, PathBuf};

/// Resolved paths under a single data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    base: PathBuf,
}

impl DataLayout {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory holding one subdirectory per installed version
    #[must_use]
    pub fn versions_dir(&self) -> PathBuf {
        self.base.join("versions")
    }

    /// Directory of one installed version, keyed `<version>-<short_commit>`
    #[must_use]
    pub fn version_dir(&self, key: &str) -> PathBuf {
        self.versions_dir().join(key)
    }

    /// The atomically-switched pointer to the active version
    #[must_use]
    pub fn current_link(&self) -> PathBuf {
        self.base.join("current")
    }

    /// Scratch space for in-flight downloads
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.base.join("staging")
    }

    /// Durable record of an in-flight upgrade
    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        self.base.join(".upgrade-marker.json")
    }

    /// Watchdog liveness handle
    #[must_use]
    pub fn watcher_pid_path(&self) -> PathBuf {
        self.base.join("watcher.pid")
    }

    /// Agent heartbeat snapshot
    #[must_use]
    pub fn status_path(&self) -> PathBuf {
        self.base.join("status.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_base() {
        let layout = DataLayout::new("/var/lib/warden");
        assert_eq!(
            layout.version_dir("1.2.3-abc123"),
            PathBuf::from("/var/lib/warden/versions/1.2.3-abc123")
        );
        assert_eq!(
            layout.current_link(),
            PathBuf::from("/var/lib/warden/current")
        );
        assert_eq!(
            layout.marker_path(),
            PathBuf::from("/var/lib/warden/.upgrade-marker.json")
        );
    }
}
