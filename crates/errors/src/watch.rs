//! Watchdog error types

use thiserror::Error;

use crate::UserFacingError;
use std::borrow::Cow;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WatchError {
    #[error("watcher already running with pid {pid}")]
    AlreadyRunning { pid: u32 },

    #[error("watcher spawn failed: {message}")]
    SpawnFailed { message: String },

    #[error("health probe failed: {message}")]
    ProbeFailed { message: String },

    #[error("rollback failed, manual intervention required: {message}")]
    RollbackFailed { message: String },

    #[error("no marker to watch")]
    NothingToWatch,
}

impl UserFacingError for WatchError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::RollbackFailed { .. } => Some(
                "The installed tree may be inconsistent. Inspect the versions directory and restore manually.",
            ),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::AlreadyRunning { .. } => "watch.already_running",
            Self::SpawnFailed { .. } => "watch.spawn_failed",
            Self::ProbeFailed { .. } => "watch.probe_failed",
            Self::RollbackFailed { .. } => "watch.rollback_failed",
            Self::NothingToWatch => "watch.nothing_to_watch",
        };
        Some(code)
    }
}
