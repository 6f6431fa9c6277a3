//! Agent heartbeat snapshot file
//!
//! The running agent writes its own state and that of every supervised
//! unit to `status.json` on a fixed cadence. The watchdog polls this file
//! to judge post-upgrade health; a snapshot that stops updating means the
//! agent cannot be observed at all.

use crate::write_atomic;
use std::path::PathBuf;
use warden_config::DataLayout;
use warden_errors::Error;
use warden_types::AgentSnapshot;

/// Reads and writes the agent heartbeat snapshot
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    #[must_use]
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            path: layout.status_path(),
        }
    }

    /// Write a snapshot atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn write(&self, snapshot: &AgentSnapshot) -> Result<(), Error> {
        let content = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &content).await
    }

    /// Read the latest snapshot, if any has been written.
    ///
    /// An unparseable file counts as no snapshot: to the watchdog, a
    /// half-written or garbage heartbeat and a missing one mean the same
    /// thing.
    ///
    /// # Errors
    ///
    /// Returns an error only on I/O failures other than the file missing.
    pub async fn read(&self) -> Result<Option<AgentSnapshot>, Error> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io_with_path(&e, &self.path)),
        };
        Ok(serde_json::from_str(&content).ok())
    }
}
