#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Durable upgrade state for warden
//!
//! Three flat files under the data directory carry all cross-process
//! coordination: the upgrade marker (the single source of truth for an
//! in-flight upgrade and its own concurrency lock), the watcher pid file
//! (liveness handle), and the agent heartbeat snapshot. All writes are
//! atomic write-then-rename; nothing is ever mutated in place.

mod handle;
mod marker;
mod status;

pub use handle::{WatcherHandle, WatcherHandleFile};
pub use marker::{MarkerStore, UpgradeMarker};
pub use status::StatusFile;

use std::path::Path;
use warden_errors::Error;

/// Write `content` to `path` atomically: temp file, fsync, rename.
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), Error> {
    let tmp = path.with_extension("tmp");

    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| Error::io_with_path(&e, &tmp))?;
    tokio::io::AsyncWriteExt::write_all(&mut file, content).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    Ok(())
}
