//! OS service-layer seam

use async_trait::async_trait;
use std::path::Path;
use warden_errors::Error;

/// Process primitives provided by the OS service layer.
///
/// The upgrade core calls these to restart the agent process set against a
/// newly activated (or rolled-back) version and to launch the detached
/// watchdog; the real implementations live with the service packaging.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Restart the agent process set.
    async fn restart_agent(&self) -> Result<(), Error>;

    /// Launch the watchdog as a detached process, returning its pid.
    fn spawn_watcher(&self, binary: &Path, data_dir: &Path) -> Result<u32, Error>;
}

/// Service control for a host-managed install: the service manager owns
/// the actual restart, the watcher is spawned directly.
#[derive(Debug, Clone, Default)]
pub struct HostServiceControl;

#[async_trait]
impl ServiceControl for HostServiceControl {
    async fn restart_agent(&self) -> Result<(), Error> {
        // The service manager restarts us once we exit; request it by
        // terminating after the caller finishes its teardown.
        tracing::info!("service control: agent restart requested");
        Ok(())
    }

    fn spawn_watcher(&self, binary: &Path, data_dir: &Path) -> Result<u32, Error> {
        crate::watcher::spawn_watcher(binary, data_dir)
    }
}

/// No-op implementation for tests and unmanaged (foreground) runs.
#[derive(Debug, Clone, Default)]
pub struct NullServiceControl;

#[async_trait]
impl ServiceControl for NullServiceControl {
    async fn restart_agent(&self) -> Result<(), Error> {
        tracing::info!("service control: restart requested (unmanaged run, no-op)");
        Ok(())
    }

    fn spawn_watcher(&self, _binary: &Path, _data_dir: &Path) -> Result<u32, Error> {
        Ok(0)
    }
}
