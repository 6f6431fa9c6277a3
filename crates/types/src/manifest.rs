//! Package manifest handling
//!
//! Every installable artifact carries a `manifest.toml` declaring what it
//! is. The installer checks these fields against the upgrade request before
//! a staged version can ever be activated.

use crate::{PackageSpec, Version, VersionIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_errors::{Error, InstallError};

/// Package manifest (manifest.toml contents)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub package: PackageInfo,
}

/// Package information section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default)]
    pub snapshot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_time: Option<DateTime<Utc>>,
    /// BLAKE3 digest of the agent binary shipped in this package
    pub binary_hash: String,
}

impl Manifest {
    /// Create a new manifest
    #[must_use]
    pub fn new(identity: &VersionIdentity, snapshot: bool, binary_hash: String) -> Self {
        Self {
            package: PackageInfo {
                version: identity.version.to_string(),
                commit: identity.commit.clone(),
                snapshot,
                build_time: Some(Utc::now()),
                binary_hash,
            },
        }
    }

    /// Parse the package version
    ///
    /// # Errors
    ///
    /// Returns an error if the version string is not a valid semantic version.
    pub fn version(&self) -> Result<Version, Error> {
        Version::parse(&self.package.version).map_err(|_e| {
            warden_errors::VersionError::InvalidVersion {
                input: self.package.version.clone(),
            }
            .into()
        })
    }

    /// Build identity declared by this manifest
    ///
    /// # Errors
    ///
    /// Returns an error if the version string cannot be parsed.
    pub fn identity(&self) -> Result<VersionIdentity, Error> {
        Ok(VersionIdentity::new(
            self.version()?,
            self.package.commit.clone(),
        ))
    }

    /// Check the manifest against the spec it was requested for.
    ///
    /// Protects against a tampered or mismatched artifact that passed
    /// signature verification but declares a different build.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::ManifestMismatch` on any disagreement.
    pub fn check_against(&self, spec: &PackageSpec) -> Result<(), Error> {
        let declared = self.identity()?;
        if !declared.same_build(&spec.identity) {
            return Err(InstallError::ManifestMismatch {
                message: format!(
                    "manifest declares {declared}, request was for {}",
                    spec.identity
                ),
            }
            .into());
        }
        Ok(())
    }

    /// Check the unpacked binary's digest against the manifest declaration.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::ManifestMismatch` if the digests disagree.
    pub fn check_binary_hash(&self, actual: &str) -> Result<(), Error> {
        if self.package.binary_hash != actual {
            return Err(InstallError::ManifestMismatch {
                message: format!(
                    "manifest binary hash {} does not match unpacked binary {actual}",
                    self.package.binary_hash
                ),
            }
            .into());
        }
        Ok(())
    }

    /// Parse from TOML content
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid manifest TOML.
    pub fn from_toml(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| {
            InstallError::InvalidManifest {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Serialize to TOML content
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Arch, Os, PackageFormat};

    fn spec(version: &str, commit: Option<&str>) -> PackageSpec {
        PackageSpec {
            identity: VersionIdentity::new(
                Version::parse(version).unwrap(),
                commit.map(ToString::to_string),
            ),
            os: Os::Linux,
            arch: Arch::X86_64,
            format: PackageFormat::Tar,
            source_uri: "https://artifacts.example.com".to_string(),
        }
    }

    #[test]
    fn roundtrip_toml() {
        let manifest = Manifest::new(
            &VersionIdentity::new(Version::parse("1.2.3").unwrap(), Some("abc123".into())),
            true,
            "deadbeef".to_string(),
        );
        let parsed = Manifest::from_toml(&manifest.to_toml().unwrap()).unwrap();
        assert_eq!(parsed.package.version, "1.2.3");
        assert_eq!(parsed.package.commit.as_deref(), Some("abc123"));
        assert!(parsed.package.snapshot);
    }

    #[test]
    fn check_against_rejects_version_mismatch() {
        let manifest = Manifest::new(
            &VersionIdentity::new(Version::parse("1.2.3").unwrap(), None),
            false,
            "deadbeef".to_string(),
        );
        let err = manifest.check_against(&spec("1.2.4", None)).unwrap_err();
        assert!(err.to_string().contains("manifest mismatch"));
    }

    #[test]
    fn check_against_rejects_commit_mismatch() {
        let manifest = Manifest::new(
            &VersionIdentity::new(Version::parse("1.2.3").unwrap(), Some("abc123".into())),
            true,
            "deadbeef".to_string(),
        );
        assert!(manifest
            .check_against(&spec("1.2.3", Some("fff000")))
            .is_err());
        assert!(manifest
            .check_against(&spec("1.2.3", Some("abc123")))
            .is_ok());
    }

    #[test]
    fn binary_hash_must_match() {
        let manifest = Manifest::new(
            &VersionIdentity::new(Version::parse("1.2.3").unwrap(), None),
            false,
            "deadbeef".to_string(),
        );
        assert!(manifest.check_binary_hash("deadbeef").is_ok());
        assert!(manifest.check_binary_hash("cafebabe").is_err());
    }

    #[test]
    fn tolerates_missing_optional_fields() {
        let parsed =
            Manifest::from_toml("[package]\nversion = \"0.9.0\"\nbinary_hash = \"00ff\"\n")
                .unwrap();
        assert!(!parsed.package.snapshot);
        assert!(parsed.package.commit.is_none());
        assert!(parsed.package.build_time.is_none());
    }
}
