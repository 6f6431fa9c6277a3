#![deny(clippy::pedantic, unsafe_code)]

//! Artifact verification for warden
//!
//! Two independent checks guard every upgrade artifact: a BLAKE3 digest
//! match against the published checksum sidecar, and a minisign detached
//! signature validated against a trusted key set. Both must pass; failure
//! is fatal for the upgrade attempt and never retried.

use minisign_verify::{PublicKey, Signature};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use warden_errors::{Error, SigningError};
use warden_hash::Hash;

/// Release signing key embedded in the binary; the default trust anchor
/// when no override is configured.
pub const EMBEDDED_RELEASE_KEY: &str = "RWSGOq2NVecA2UPNdBUZykp1MLhfMmkAK/SZSjK3bpq2q7I8LbSVVBDm";

/// Key id reported when the embedded key verified the artifact.
pub const EMBEDDED_KEY_ID: &str = "embedded";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Minisign,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyRef {
    pub id: String,
    pub algo: Algorithm,
    pub data: String,
}

impl PublicKeyRef {
    /// The key set used when no override is available.
    #[must_use]
    pub fn embedded() -> Vec<Self> {
        vec![Self {
            id: EMBEDDED_KEY_ID.to_string(),
            algo: Algorithm::Minisign,
            data: EMBEDDED_RELEASE_KEY.to_string(),
        }]
    }
}

/// A package that passed both verification checks.
///
/// Created here, consumed exactly once by the installer's staging step.
#[derive(Debug)]
pub struct VerifiedArtifact {
    pub package_path: PathBuf,
    pub hash: Hash,
    /// Id of the trusted key that validated the signature, or
    /// [`EMBEDDED_KEY_ID`]; empty when verification was skipped.
    pub key_id: String,
}

/// Verify a downloaded package against its checksum and signature sidecars.
///
/// # Errors
///
/// Returns `SigningError::ChecksumMismatch` when the computed digest differs
/// from the sidecar, or `SigningError::VerificationFailed` when no trusted
/// key validates the signature. Sidecar read failures surface as
/// `SigningError::MissingSidecar`.
pub async fn verify_artifact(
    package_path: &Path,
    checksum_path: &Path,
    signature_path: &Path,
    trusted_keys: &[PublicKeyRef],
) -> Result<VerifiedArtifact, Error> {
    let expected = read_checksum_sidecar(checksum_path).await?;
    let actual = Hash::hash_file(package_path).await?;
    if actual != expected {
        return Err(SigningError::ChecksumMismatch {
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        }
        .into());
    }

    let signature_str = tokio::fs::read_to_string(signature_path)
        .await
        .map_err(|_| SigningError::MissingSidecar {
            path: signature_path.display().to_string(),
        })?;

    let key_id = verify_minisign_file_with_keys(package_path, &signature_str, trusted_keys)?;

    Ok(VerifiedArtifact {
        package_path: package_path.to_path_buf(),
        hash: actual,
        key_id,
    })
}

/// Digest-only check used when signature verification is explicitly
/// disabled (test-only escape hatch; callers must never default to it).
///
/// # Errors
///
/// Returns an error if the digest cannot be computed or does not match.
pub async fn verify_checksum_only(
    package_path: &Path,
    checksum_path: &Path,
) -> Result<VerifiedArtifact, Error> {
    let expected = read_checksum_sidecar(checksum_path).await?;
    let actual = Hash::hash_file(package_path).await?;
    if actual != expected {
        return Err(SigningError::ChecksumMismatch {
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        }
        .into());
    }
    Ok(VerifiedArtifact {
        package_path: package_path.to_path_buf(),
        hash: actual,
        key_id: String::new(),
    })
}

async fn read_checksum_sidecar(path: &Path) -> Result<Hash, Error> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|_| SigningError::MissingSidecar {
            path: path.display().to_string(),
        })?;
    // Sidecar format: "<hex digest>" optionally followed by the file name
    let hex = content
        .split_whitespace()
        .next()
        .ok_or_else(|| SigningError::MissingSidecar {
            path: path.display().to_string(),
        })?;
    Hash::from_hex(hex)
}

/// Verify content at `content_path` against a minisign signature string
/// using any of the provided trusted keys. Returns the key id that
/// successfully verified.
///
/// # Errors
/// Returns an error if the content cannot be read, the signature cannot be
/// parsed, or if verification fails for all provided keys.
pub fn verify_minisign_file_with_keys(
    content_path: &Path,
    signature_str: &str,
    trusted_keys: &[PublicKeyRef],
) -> Result<String, Error> {
    let content = fs::read(content_path).map_err(|e| {
        Error::internal(format!(
            "Failed to read content for signature verification: {e}"
        ))
    })?;
    verify_minisign_bytes_with_keys(&content, signature_str, trusted_keys)
}

/// Verify raw bytes against a minisign signature string using any of the
/// provided trusted keys. Returns the key id that successfully verified.
///
/// # Errors
/// Returns an error if the signature cannot be parsed or if no trusted key
/// verifies the content.
pub fn verify_minisign_bytes_with_keys(
    content: &[u8],
    signature_str: &str,
    trusted_keys: &[PublicKeyRef],
) -> Result<String, Error> {
    if trusted_keys.is_empty() {
        return Err(SigningError::VerificationFailed {
            reason: "No trusted keys available for verification".to_string(),
        }
        .into());
    }

    // Parse signature (full minisign string including comment line)
    let sig =
        Signature::decode(signature_str).map_err(|e| SigningError::InvalidSignatureFormat(e.to_string()))?;

    let mut last_err = None;
    for key in trusted_keys {
        if key.algo != Algorithm::Minisign {
            continue;
        }
        match PublicKey::from_base64(&key.data) {
            Ok(pk) => match pk.verify(content, &sig, false) {
                Ok(()) => return Ok(key.id.clone()),
                Err(e) => {
                    last_err = Some(format!("{e}"));
                }
            },
            Err(e) => {
                last_err = Some(format!("Invalid trusted key format for {}: {e}", key.id));
            }
        }
    }

    Err(SigningError::VerificationFailed {
        reason: format!(
            "Signature verification failed with {} trusted keys. Last error: {}",
            trusted_keys.len(),
            last_err.unwrap_or_else(|| "unknown".to_string())
        ),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_artifact(dir: &Path, body: &[u8]) -> (PathBuf, PathBuf) {
        let package = dir.join("pkg.wpk");
        let checksum = dir.join("pkg.wpk.blake3");
        tokio::fs::write(&package, body).await.unwrap();
        tokio::fs::write(&checksum, Hash::from_data(body).to_hex())
            .await
            .unwrap();
        (package, checksum)
    }

    #[tokio::test]
    async fn checksum_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (package, checksum) = write_artifact(dir.path(), b"real bytes").await;
        tokio::fs::write(&checksum, Hash::from_data(b"other bytes").to_hex())
            .await
            .unwrap();

        let err = verify_checksum_only(&package, &checksum).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::ChecksumMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn checksum_only_passes_on_match() {
        let dir = tempfile::tempdir().unwrap();
        let (package, checksum) = write_artifact(dir.path(), b"real bytes").await;

        let verified = verify_checksum_only(&package, &checksum).await.unwrap();
        assert_eq!(verified.hash, Hash::from_data(b"real bytes"));
        assert!(verified.key_id.is_empty());
    }

    #[tokio::test]
    async fn garbage_signature_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (package, checksum) = write_artifact(dir.path(), b"real bytes").await;
        let signature = dir.path().join("pkg.wpk.minisig");
        tokio::fs::write(&signature, "not a minisign signature")
            .await
            .unwrap();

        let err = verify_artifact(&package, &checksum, &signature, &PublicKeyRef::embedded())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[tokio::test]
    async fn missing_sidecar_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("pkg.wpk");
        tokio::fs::write(&package, b"bytes").await.unwrap();

        let err = verify_checksum_only(&package, &dir.path().join("absent.blake3"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::MissingSidecar { .. })
        ));
    }

    #[test]
    fn empty_key_set_fails_closed() {
        let err = verify_minisign_bytes_with_keys(b"content", "sig", &[]).unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }
}
