//! Package specification types

use crate::{Arch, Os, PackageFormat};
use semver::Version;
use serde::{Deserialize, Serialize};

/// The identity of an agent build: version plus optional short commit hash.
///
/// Snapshot builds of the same version differ only by commit, so equality
/// compares the commit when both sides carry one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionIdentity {
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl VersionIdentity {
    #[must_use]
    pub fn new(version: Version, commit: Option<String>) -> Self {
        Self { version, commit }
    }

    /// Whether two identities refer to the same build.
    #[must_use]
    pub fn same_build(&self, other: &Self) -> bool {
        if self.version != other.version {
            return false;
        }
        match (&self.commit, &other.commit) {
            (Some(a), Some(b)) => a == b,
            // A side without a commit hash can only compare by version.
            _ => true,
        }
    }

    /// Short commit hash, truncated to six characters like directory keys use.
    #[must_use]
    pub fn short_commit(&self) -> Option<&str> {
        self.commit.as_deref().map(|c| {
            let end = c.char_indices().nth(6).map_or(c.len(), |(i, _)| i);
            &c[..end]
        })
    }
}

impl std::fmt::Display for VersionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.short_commit() {
            Some(commit) => write!(f, "{}-{commit}", self.version),
            None => write!(f, "{}", self.version),
        }
    }
}

/// Fully-resolved description of the package an upgrade should install.
///
/// Immutable once the upgrade begins; the orchestrator resolves the request
/// into one of these before the first download attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSpec {
    pub identity: VersionIdentity,
    pub os: Os,
    pub arch: Arch,
    #[serde(default)]
    pub format: PackageFormat,
    /// Base URI the artifact and its sidecars are fetched from.
    pub source_uri: String,
}

impl PackageSpec {
    /// File name of the package artifact for this spec.
    #[must_use]
    pub fn artifact_name(&self) -> String {
        format!(
            "warden-{}-{}-{}.{}",
            self.identity.version,
            self.os,
            self.arch,
            self.format.extension()
        )
    }

    /// Full URI of the package artifact.
    #[must_use]
    pub fn artifact_uri(&self) -> String {
        format!(
            "{}/{}",
            self.source_uri.trim_end_matches('/'),
            self.artifact_name()
        )
    }

    /// Directory key for the installed version: `<version>-<short_commit>`.
    #[must_use]
    pub fn install_key(&self) -> String {
        self.identity.to_string()
    }
}
