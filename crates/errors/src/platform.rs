//! Process and service-control error types

use thiserror::Error;

use crate::UserFacingError;
use std::borrow::Cow;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlatformError {
    #[error("process not registered: {name}")]
    ProcessNotFound { name: String },

    #[error("process already registered: {name}")]
    ProcessExists { name: String },

    #[error("failed to spawn {name}: {message}")]
    SpawnFailed { name: String, message: String },

    #[error("failed to stop {name}: {message}")]
    StopFailed { name: String, message: String },

    #[error("service control failed: {message}")]
    ServiceControlFailed { message: String },
}

impl UserFacingError for PlatformError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ProcessNotFound { .. } => "platform.process_not_found",
            Self::ProcessExists { .. } => "platform.process_exists",
            Self::SpawnFailed { .. } => "platform.spawn_failed",
            Self::StopFailed { .. } => "platform.stop_failed",
            Self::ServiceControlFailed { .. } => "platform.service_control_failed",
        };
        Some(code)
    }
}
