#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the warden agent
//!
//! This crate provides fundamental types used throughout the system:
//! package specifications, the installed-version manifest, upgrade state
//! enums, and the health snapshot exchanged between the agent and the
//! watchdog.

pub mod health;
pub mod manifest;
pub mod package;
pub mod state;

// Re-export commonly used types
pub use health::{AgentSnapshot, UnitState, UnitStatus};
pub use manifest::Manifest;
pub use package::{PackageSpec, VersionIdentity};
pub use semver::Version;
pub use state::{MarkerOwner, UpgradeDetails, UpgradeState};
pub use uuid::Uuid;

use serde::{Deserialize, Serialize};

/// Operating system a package targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Darwin,
}

impl Os {
    /// OS of the running binary
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::Darwin
        } else {
            Self::Linux
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Darwin => write!(f, "darwin"),
        }
    }
}

/// Architecture type for packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "arm64")]
    Arm64,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Arch {
    /// Architecture of the running binary
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_arch = "aarch64") {
            Self::Arm64
        } else {
            Self::X86_64
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arm64 => write!(f, "arm64"),
            Self::X86_64 => write!(f, "x86_64"),
        }
    }
}

/// On-disk package archive format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    /// Plain tar archive (.wpk)
    Tar,
}

impl Default for PackageFormat {
    fn default() -> Self {
        Self::Tar
    }
}

impl PackageFormat {
    /// File extension for this format, without the leading dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Tar => "wpk",
        }
    }
}
