//! Watcher liveness handle
//!
//! The watchdog records its pid in `watcher.pid` and refreshes the file on
//! every poll tick. Liveness is judged from the heartbeat age rather than
//! pid probing, which distinguishes "a watcher is already active" from "a
//! watcher died without deciding" across both crashes and pid reuse.

use crate::write_atomic;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use warden_config::DataLayout;
use warden_errors::Error;

/// A live (or stale) watcher as read from disk
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    pub pid: u32,
    /// Time since the watcher last refreshed its heartbeat
    pub heartbeat_age: Duration,
}

/// Reads and writes the `watcher.pid` file
#[derive(Debug, Clone)]
pub struct WatcherHandleFile {
    path: PathBuf,
}

impl WatcherHandleFile {
    #[must_use]
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            path: layout.watcher_pid_path(),
        }
    }

    /// Record this process as the active watcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the pid file cannot be written.
    pub async fn acquire(&self, pid: u32) -> Result<(), Error> {
        write_atomic(&self.path, pid.to_string().as_bytes()).await
    }

    /// Refresh the heartbeat; called every poll tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the pid file cannot be rewritten.
    pub async fn refresh(&self, pid: u32) -> Result<(), Error> {
        self.acquire(pid).await
    }

    /// Read the handle if a pid file exists.
    ///
    /// # Errors
    ///
    /// Returns an error on unreadable metadata; a malformed pid counts as
    /// no handle.
    pub async fn read(&self) -> Result<Option<WatcherHandle>, Error> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io_with_path(&e, &self.path)),
        };

        let Ok(pid) = content.trim().parse::<u32>() else {
            return Ok(None);
        };

        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.path))?;
        let heartbeat_age = metadata
            .modified()
            .ok()
            .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
            .unwrap_or(Duration::ZERO);

        Ok(Some(WatcherHandle { pid, heartbeat_age }))
    }

    /// Whether a watcher is alive: pid file present with a fresh heartbeat.
    pub async fn is_alive(&self, staleness: Duration) -> bool {
        match self.read().await {
            Ok(Some(handle)) => handle.heartbeat_age < staleness,
            _ => false,
        }
    }

    /// Remove the handle on watcher exit.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails for a reason other than the file
    /// already being gone.
    pub async fn release(&self) -> Result<(), Error> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io_with_path(&e, &self.path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_read_release() {
        let dir = tempfile::tempdir().unwrap();
        let file = WatcherHandleFile::new(&DataLayout::new(dir.path()));

        assert!(file.read().await.unwrap().is_none());

        file.acquire(4242).await.unwrap();
        let handle = file.read().await.unwrap().unwrap();
        assert_eq!(handle.pid, 4242);
        assert!(file.is_alive(Duration::from_secs(60)).await);

        file.release().await.unwrap();
        assert!(file.read().await.unwrap().is_none());
        assert!(!file.is_alive(Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn stale_heartbeat_counts_as_dead() {
        let dir = tempfile::tempdir().unwrap();
        let file = WatcherHandleFile::new(&DataLayout::new(dir.path()));

        file.acquire(4242).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!file.is_alive(Duration::from_millis(10)).await);
        assert!(file.is_alive(Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn malformed_pid_file_is_no_handle() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        tokio::fs::write(layout.watcher_pid_path(), "not a pid")
            .await
            .unwrap();

        let file = WatcherHandleFile::new(&layout);
        assert!(file.read().await.unwrap().is_none());
    }
}
