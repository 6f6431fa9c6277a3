//! Package archive handling (.wpk files)

use std::path::Path;
use tar::Archive;
use warden_errors::{Error, InstallError};

/// Extract a .wpk package file to a directory
///
/// # Errors
///
/// Returns an error if:
/// - Tar extraction fails
/// - The extracted package is missing manifest.toml
/// - I/O operations fail
pub async fn extract_package(wpk_file: &Path, dest: &Path) -> Result<(), Error> {
    extract_tar_file(wpk_file, dest).await?;

    // Verify manifest exists
    let manifest_path = dest.join("manifest.toml");
    if !tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
        return Err(InstallError::InvalidManifest {
            message: "missing manifest.toml in package".to_string(),
        }
        .into());
    }

    Ok(())
}

/// Create a .wpk package file from a directory
///
/// # Errors
///
/// Returns an error if:
/// - Source directory is missing manifest.toml
/// - Archive creation fails
/// - I/O operations fail
pub async fn create_package(src: &Path, wpk_file: &Path) -> Result<(), Error> {
    // Verify source has required structure
    let manifest_path = src.join("manifest.toml");
    if !tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
        return Err(InstallError::InvalidManifest {
            message: "source directory missing manifest.toml".to_string(),
        }
        .into());
    }

    if let Some(parent) = wpk_file.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io_with_path(&e, parent))?;
    }

    // Create archive using blocking operations
    let src = src.to_path_buf();
    let wpk_file = wpk_file.to_path_buf();

    tokio::task::spawn_blocking(move || {
        use std::fs::File;
        use std::io::BufWriter;

        let file = File::create(&wpk_file)?;
        let buf_writer = BufWriter::new(file);
        let mut builder = tar::Builder::new(buf_writer);

        // Set options for deterministic output
        builder.mode(tar::HeaderMode::Deterministic);
        builder.follow_symlinks(false);

        add_dir_to_tar(&mut builder, &src, Path::new(""))?;
        builder.finish()?;

        Ok::<(), Error>(())
    })
    .await
    .map_err(|e| Error::internal(format!("create task failed: {e}")))??;

    Ok(())
}

/// Recursively add directory contents to tar
fn add_dir_to_tar<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    src: &Path,
    prefix: &Path,
) -> Result<(), Error> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;

        let path = entry.path();
        let name = entry.file_name();
        let tar_path = prefix.join(&name);

        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            builder.append_dir(&tar_path, &path)?;
            add_dir_to_tar(builder, &path, &tar_path)?;
        } else if metadata.is_file() {
            let mut file = std::fs::File::open(&path)?;
            builder.append_file(&tar_path, &mut file)?;
        }
    }

    Ok(())
}

/// Extract a tar archive from a file
async fn extract_tar_file(file_path: &Path, dest: &Path) -> Result<(), Error> {
    tokio::fs::create_dir_all(dest)
        .await
        .map_err(|e| Error::io_with_path(&e, dest))?;

    let file_path = file_path.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || {
        use std::fs::File;

        let file = File::open(&file_path)?;
        let mut archive = Archive::new(file);

        // Set options for security
        archive.set_preserve_permissions(true);
        archive.set_preserve_mtime(true);
        archive.set_unpack_xattrs(false); // Don't unpack extended attributes

        for entry in archive.entries()? {
            let mut entry = entry?;

            let path = entry.path()?;

            // Security check: ensure path doesn't escape destination
            if path
                .components()
                .any(|c| c == std::path::Component::ParentDir)
            {
                return Err(InstallError::ExtractionFailed {
                    message: "archive contains path traversal".to_string(),
                }
                .into());
            }

            entry.unpack_in(&dest)?;
        }

        Ok::<(), Error>(())
    })
    .await
    .map_err(|e| Error::internal(format!("extract task failed: {e}")))??;

    Ok(())
}
