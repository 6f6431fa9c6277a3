#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Version store for warden
//!
//! Installed versions live in immutable, version-named directories under
//! `<data>/versions/`; a single atomically-switched `current` symlink names
//! the active one. Switching never deletes the version being switched away
//! from, which is what makes rollback after a crashed restart possible.

mod archive;
mod manifest_io;

pub use archive::{create_package, extract_package};
pub use manifest_io::{read_manifest, write_manifest};

use std::path::PathBuf;
use warden_config::DataLayout;
use warden_errors::{Error, InstallError};
use warden_hash::Hash;
use warden_signing::VerifiedArtifact;
use warden_types::{Manifest, PackageSpec};

/// Path of the agent binary inside every package
pub const BINARY_PATH: &str = "bin/wardend";

/// One unpacked version directory and its manifest
#[derive(Debug, Clone)]
pub struct InstalledVersion {
    /// Directory key, `<version>-<short_commit>`
    pub key: String,
    pub path: PathBuf,
    pub manifest: Manifest,
}

/// Manages the versions directory and the `current` pointer
#[derive(Debug, Clone)]
pub struct VersionStore {
    layout: DataLayout,
}

impl VersionStore {
    #[must_use]
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Extract a verified artifact into a fresh version directory.
    ///
    /// The embedded manifest must agree with the requested spec and the
    /// artifact digest; on any failure the partially-extracted directory is
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction fails, the manifest is missing or
    /// invalid, or the manifest disagrees with the request.
    pub async fn stage(
        &self,
        artifact: &VerifiedArtifact,
        spec: &PackageSpec,
    ) -> Result<InstalledVersion, Error> {
        let key = spec.install_key();
        let dest = self.layout.version_dir(&key);

        // A crashed earlier attempt may have left a partial tree
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&dest)
                .await
                .map_err(|e| Error::io_with_path(&e, &dest))?;
        }

        let staged = async {
            extract_package(&artifact.package_path, &dest).await?;
            let manifest = read_manifest(&dest.join("manifest.toml")).await?;
            manifest.check_against(spec)?;
            let binary_hash = Hash::hash_file(&dest.join(BINARY_PATH)).await?;
            manifest.check_binary_hash(&binary_hash.to_hex())?;
            Ok::<Manifest, Error>(manifest)
        }
        .await;

        match staged {
            Ok(manifest) => Ok(InstalledVersion {
                key,
                path: dest,
                manifest,
            }),
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&dest).await;
                Err(e)
            }
        }
    }

    /// Atomically switch the `current` pointer to an installed version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is not installed or the pointer swap
    /// fails.
    pub async fn activate(&self, key: &str) -> Result<(), Error> {
        self.switch_current(key).await
    }

    /// Atomically switch the `current` pointer back to a prior version.
    ///
    /// Never re-verifies the target; it was valid when first activated.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is not installed or the pointer swap
    /// fails.
    pub async fn rollback(&self, key: &str) -> Result<(), Error> {
        self.switch_current(key).await
    }

    /// Remove a version directory that is no longer current.
    ///
    /// # Errors
    ///
    /// Refuses to prune the active version; returns an error if removal
    /// fails.
    pub async fn prune(&self, key: &str) -> Result<(), Error> {
        if self.current().await?.as_deref() == Some(key) {
            return Err(InstallError::PruneActiveVersion {
                version: key.to_string(),
            }
            .into());
        }
        let dir = self.layout.version_dir(key);
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| Error::io_with_path(&e, &dir))?;
        }
        Ok(())
    }

    /// Key of the currently active version, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the pointer exists but cannot be read.
    pub async fn current(&self) -> Result<Option<String>, Error> {
        let link = self.layout.current_link();
        match tokio::fs::read_link(&link).await {
            Ok(target) => Ok(target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io_with_path(&e, &link)),
        }
    }

    /// Whether a version directory exists on disk.
    pub async fn is_installed(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.layout.version_dir(key))
            .await
            .unwrap_or(false)
    }

    /// Load the manifest of an installed version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is not installed or its manifest
    /// cannot be read.
    pub async fn installed_version(&self, key: &str) -> Result<InstalledVersion, Error> {
        let path = self.layout.version_dir(key);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(InstallError::VersionNotInstalled {
                version: key.to_string(),
            }
            .into());
        }
        let manifest = read_manifest(&path.join("manifest.toml")).await?;
        Ok(InstalledVersion {
            key: key.to_string(),
            path,
            manifest,
        })
    }

    /// Keys of every version directory on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the versions directory cannot be listed.
    pub async fn installed_keys(&self) -> Result<Vec<String>, Error> {
        let dir = self.layout.versions_dir();
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| Error::io_with_path(&e, &dir))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                keys.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Swap `current` in a single rename so a crash mid-switch leaves the
    /// previous pointer intact.
    async fn switch_current(&self, key: &str) -> Result<(), Error> {
        if !self.is_installed(key).await {
            return Err(InstallError::VersionNotInstalled {
                version: key.to_string(),
            }
            .into());
        }

        let link = self.layout.current_link();
        let tmp = self.layout.base().join(".current.tmp");
        let target = PathBuf::from("versions").join(key);

        let _ = tokio::fs::remove_file(&tmp).await;

        #[cfg(unix)]
        tokio::fs::symlink(&target, &tmp)
            .await
            .map_err(|e| InstallError::AtomicOperationFailed {
                message: format!("creating staging link: {e}"),
            })?;

        #[cfg(not(unix))]
        tokio::fs::symlink_dir(&target, &tmp).await.map_err(|e| {
            InstallError::AtomicOperationFailed {
                message: format!("creating staging link: {e}"),
            }
        })?;

        tokio::fs::rename(&tmp, &link)
            .await
            .map_err(|e| InstallError::AtomicOperationFailed {
                message: format!("switching current pointer: {e}"),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_hash::Hash;
    use warden_types::{Arch, Os, PackageFormat, Version, VersionIdentity};

    fn spec_for(version: &str, commit: &str) -> PackageSpec {
        PackageSpec {
            identity: VersionIdentity::new(
                Version::parse(version).unwrap(),
                Some(commit.to_string()),
            ),
            os: Os::current(),
            arch: Arch::current(),
            format: PackageFormat::Tar,
            source_uri: "unused".to_string(),
        }
    }

    /// Build a `.wpk` for `spec` and return a `VerifiedArtifact` for it.
    async fn build_artifact(
        dir: &std::path::Path,
        spec: &PackageSpec,
        manifest_identity: Option<&VersionIdentity>,
    ) -> VerifiedArtifact {
        let tree = dir.join(format!("tree-{}", spec.install_key()));
        tokio::fs::create_dir_all(tree.join("bin")).await.unwrap();
        let binary_bytes = spec.install_key();
        tokio::fs::write(tree.join(BINARY_PATH), &binary_bytes)
            .await
            .unwrap();

        let identity = manifest_identity.unwrap_or(&spec.identity).clone();
        let manifest = Manifest::new(
            &identity,
            false,
            Hash::from_data(binary_bytes.as_bytes()).to_hex(),
        );
        write_manifest(&tree.join("manifest.toml"), &manifest)
            .await
            .unwrap();

        let package_path = dir.join(spec.artifact_name());
        create_package(&tree, &package_path).await.unwrap();

        VerifiedArtifact {
            hash: Hash::hash_file(&package_path).await.unwrap(),
            package_path,
            key_id: "embedded".to_string(),
        }
    }

    #[tokio::test]
    async fn stage_activate_rollback_prune_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(DataLayout::new(dir.path()));

        let v1 = spec_for("1.0.0", "aaa111");
        let v2 = spec_for("2.0.0", "bbb222");
        let a1 = build_artifact(dir.path(), &v1, None).await;
        let a2 = build_artifact(dir.path(), &v2, None).await;

        let i1 = store.stage(&a1, &v1).await.unwrap();
        store.activate(&i1.key).await.unwrap();
        assert_eq!(store.current().await.unwrap().as_deref(), Some("1.0.0-aaa111"));

        let i2 = store.stage(&a2, &v2).await.unwrap();
        store.activate(&i2.key).await.unwrap();
        assert_eq!(store.current().await.unwrap().as_deref(), Some("2.0.0-bbb222"));

        // Both versions still on disk: switching never deletes
        assert!(store.is_installed("1.0.0-aaa111").await);
        assert!(store.is_installed("2.0.0-bbb222").await);

        store.rollback("1.0.0-aaa111").await.unwrap();
        assert_eq!(store.current().await.unwrap().as_deref(), Some("1.0.0-aaa111"));

        store.prune("2.0.0-bbb222").await.unwrap();
        assert!(!store.is_installed("2.0.0-bbb222").await);
    }

    #[tokio::test]
    async fn prune_refuses_active_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(DataLayout::new(dir.path()));

        let v1 = spec_for("1.0.0", "aaa111");
        let a1 = build_artifact(dir.path(), &v1, None).await;
        let i1 = store.stage(&a1, &v1).await.unwrap();
        store.activate(&i1.key).await.unwrap();

        let err = store.prune(&i1.key).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Install(InstallError::PruneActiveVersion { .. })
        ));
    }

    #[tokio::test]
    async fn stage_rejects_manifest_mismatch_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(DataLayout::new(dir.path()));

        let requested = spec_for("2.0.0", "bbb222");
        // Artifact whose embedded manifest declares a different build
        let lying_identity =
            VersionIdentity::new(Version::parse("9.9.9").unwrap(), Some("fff999".to_string()));
        let artifact = build_artifact(dir.path(), &requested, Some(&lying_identity)).await;

        let err = store.stage(&artifact, &requested).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Install(InstallError::ManifestMismatch { .. })
        ));
        assert!(!store.is_installed(&requested.install_key()).await);
    }

    #[tokio::test]
    async fn activate_requires_installed_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = VersionStore::new(DataLayout::new(dir.path()));
        assert!(store.activate("3.0.0-nope").await.is_err());
        assert_eq!(store.current().await.unwrap(), None);
    }
}
