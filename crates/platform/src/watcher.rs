//! Detached watchdog spawning

use std::path::Path;
use std::process::Stdio;
use warden_errors::{Error, WatchError};

/// Spawn the watchdog as a detached OS process.
///
/// The watcher must survive the main process crashing or being killed
/// mid-restart, so it runs in its own process group with no inherited
/// stdio, invoked as `<binary> watch --data-dir <data>`.
///
/// # Errors
///
/// Returns `WatchError::SpawnFailed` if the process cannot be started.
pub fn spawn_watcher(binary: &Path, data_dir: &Path) -> Result<u32, Error> {
    let mut command = std::process::Command::new(binary);
    command
        .arg("watch")
        .arg("--data-dir")
        .arg(data_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = command.spawn().map_err(|e| WatchError::SpawnFailed {
        message: format!("{}: {e}", binary.display()),
    })?;

    let pid = child.id();
    tracing::info!(pid, binary = %binary.display(), "spawned watcher");
    Ok(pid)
}
