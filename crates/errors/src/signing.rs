//! Signing error types

use thiserror::Error;

use crate::UserFacingError;
use std::borrow::Cow;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SigningError {
    #[error("signature verification failed: {reason}")]
    VerificationFailed { reason: String },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("no trusted key found for signature with key id: {key_id}")]
    NoTrustedKeyFound { key_id: String },

    #[error("invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("invalid public key format: {0}")]
    InvalidPublicKey(String),

    #[error("missing sidecar file: {path}")]
    MissingSidecar { path: String },
}

impl UserFacingError for SigningError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::VerificationFailed { .. } | Self::ChecksumMismatch { .. } => Some(
                "The downloaded artifact is not trustworthy. Verify the artifact source is correct.",
            ),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::VerificationFailed { .. } => "signing.verification_failed",
            Self::ChecksumMismatch { .. } => "signing.checksum_mismatch",
            Self::NoTrustedKeyFound { .. } => "signing.no_trusted_key",
            Self::InvalidSignatureFormat(_) => "signing.invalid_signature",
            Self::InvalidPublicKey(_) => "signing.invalid_public_key",
            Self::MissingSidecar { .. } => "signing.missing_sidecar",
        };
        Some(code)
    }
}
