//! Upgrade orchestration error types

use thiserror::Error;

use crate::UserFacingError;
use std::borrow::Cow;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UpgradeError {
    #[error("an upgrade is already in progress (action {action_id})")]
    AlreadyInProgress { action_id: String },

    #[error("already at requested version {version}")]
    SameVersion { version: String },

    #[error("upgrade request invalid: {message}")]
    InvalidRequest { message: String },

    #[error("upgrade failed during {phase}: {message}")]
    PhaseFailed { phase: String, message: String },

    #[error("upgrade recovery failed: {message}")]
    RecoveryFailed { message: String },

    #[error("restart of the process set failed: {message}")]
    RestartFailed { message: String },
}

impl UserFacingError for UpgradeError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::AlreadyInProgress { .. } => {
                Some("Wait for the pending upgrade to commit or roll back, then retry.")
            }
            Self::SameVersion { .. } => {
                Some("Request a version different from the one currently running.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::AlreadyInProgress { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::AlreadyInProgress { .. } => "upgrade.already_in_progress",
            Self::SameVersion { .. } => "upgrade.same_version",
            Self::InvalidRequest { .. } => "upgrade.invalid_request",
            Self::PhaseFailed { .. } => "upgrade.phase_failed",
            Self::RecoveryFailed { .. } => "upgrade.recovery_failed",
            Self::RestartFailed { .. } => "upgrade.restart_failed",
        };
        Some(code)
    }
}
