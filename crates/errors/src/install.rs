//! Version store / installer error types

use thiserror::Error;

use crate::UserFacingError;
use std::borrow::Cow;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstallError {
    #[error("extraction failed: {message}")]
    ExtractionFailed { message: String },

    #[error("manifest mismatch: {message}")]
    ManifestMismatch { message: String },

    #[error("invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("version not installed: {version}")]
    VersionNotInstalled { version: String },

    #[error("version already installed: {version}")]
    VersionAlreadyInstalled { version: String },

    #[error("atomic operation failed: {message}")]
    AtomicOperationFailed { message: String },

    #[error("cannot prune active version {version}")]
    PruneActiveVersion { version: String },

    #[error("filesystem operation failed: {operation} on {path}: {message}")]
    FilesystemError {
        operation: String,
        path: String,
        message: String,
    },
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ManifestMismatch { .. } => {
                Some("The package contents do not match the requested version. Check the artifact source.")
            }
            Self::FilesystemError { .. } | Self::AtomicOperationFailed { .. } => {
                Some("Check permissions and free space under the warden data directory.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ExtractionFailed { .. } => "install.extraction_failed",
            Self::ManifestMismatch { .. } => "install.manifest_mismatch",
            Self::InvalidManifest { .. } => "install.invalid_manifest",
            Self::VersionNotInstalled { .. } => "install.version_not_installed",
            Self::VersionAlreadyInstalled { .. } => "install.version_already_installed",
            Self::AtomicOperationFailed { .. } => "install.atomic_operation_failed",
            Self::PruneActiveVersion { .. } => "install.prune_active_version",
            Self::FilesystemError { .. } => "install.filesystem_error",
        };
        Some(code)
    }
}
