//! Upgrade marker state error types

use thiserror::Error;

use crate::UserFacingError;
use std::borrow::Cow;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("marker already exists for action {action_id}")]
    MarkerExists { action_id: String },

    #[error("no upgrade marker present")]
    MarkerMissing,

    #[error("marker corrupted: {message}")]
    MarkerCorrupted { message: String },

    #[error("marker write failed: {message}")]
    MarkerWriteFailed { message: String },

    #[error("marker owned by {owner}, refusing write")]
    MarkerOwnershipViolation { owner: String },
}

impl UserFacingError for StateError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidTransition { .. } => "state.invalid_transition",
            Self::MarkerExists { .. } => "state.marker_exists",
            Self::MarkerMissing => "state.marker_missing",
            Self::MarkerCorrupted { .. } => "state.marker_corrupted",
            Self::MarkerWriteFailed { .. } => "state.marker_write_failed",
            Self::MarkerOwnershipViolation { .. } => "state.marker_ownership",
        };
        Some(code)
    }
}
