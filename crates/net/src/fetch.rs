//! Artifact fetcher
//!
//! Pulls a release package and its detached checksum/signature sidecars
//! into a staging directory, with bounded retry and an overall deadline.
//! Retried attempts overwrite the same staging targets, and every staged
//! file is removed on any failure path.

use crate::client::NetClient;
use crate::download::{calculate_backoff_delay, download_file, is_retryable, RetryConfig};
use std::path::{Path, PathBuf};
use std::time::Instant;
use warden_errors::{Error, NetworkError};
use warden_events::{AppEvent, DownloadEvent, EventEmitter, EventSender};
use warden_types::PackageSpec;

/// Checksum sidecar extension (BLAKE3 hex digest)
pub const CHECKSUM_EXT: &str = "blake3";
/// Signature sidecar extension (minisign detached signature)
pub const SIGNATURE_EXT: &str = "minisig";

/// Result of fetching one release package
#[derive(Debug)]
pub struct FetchedArtifact {
    pub package_path: PathBuf,
    pub checksum_path: PathBuf,
    pub signature_path: PathBuf,
    /// Attempts consumed by the package download; retries = attempts - 1
    pub attempts: u32,
}

/// Downloads release packages into a staging directory
pub struct ArtifactFetcher {
    client: NetClient,
    retry: RetryConfig,
    staging_dir: PathBuf,
    tx: EventSender,
}

impl ArtifactFetcher {
    #[must_use]
    pub fn new(
        client: NetClient,
        retry: RetryConfig,
        staging_dir: PathBuf,
        tx: EventSender,
    ) -> Self {
        Self {
            client,
            retry,
            staging_dir,
            tx,
        }
    }

    /// Fetch the package named by `spec` plus both sidecars.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::RetriesExhausted` once the attempt budget is
    /// spent, `NetworkError::DeadlineExceeded` when the overall deadline
    /// cuts the retry loop short, or the underlying error for non-retryable
    /// failures. Staged files are removed before returning an error.
    pub async fn fetch(&self, spec: &PackageSpec) -> Result<FetchedArtifact, Error> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.staging_dir))?;

        let result = self.fetch_inner(spec).await;
        if result.is_err() {
            self.cleanup(spec).await;
        }
        result
    }

    async fn fetch_inner(&self, spec: &PackageSpec) -> Result<FetchedArtifact, Error> {
        let name = spec.artifact_name();
        let package_path = self.staging_dir.join(&name);
        let checksum_path = self.staging_dir.join(format!("{name}.{CHECKSUM_EXT}"));
        let signature_path = self.staging_dir.join(format!("{name}.{SIGNATURE_EXT}"));

        if is_remote(&spec.source_uri) {
            let base = spec.artifact_uri();

            self.tx.emit(AppEvent::Download(DownloadEvent::Started {
                url: base.clone(),
                total_size: None,
            }));

            let attempts = self.download_with_retry(&base, &package_path).await?;
            self.download_with_retry(&format!("{base}.{CHECKSUM_EXT}"), &checksum_path)
                .await?;
            self.download_with_retry(&format!("{base}.{SIGNATURE_EXT}"), &signature_path)
                .await?;

            let size = tokio::fs::metadata(&package_path).await?.len();
            self.tx.emit(AppEvent::Download(DownloadEvent::Completed {
                url: base,
                final_size: size,
                hash: String::new(),
            }));

            Ok(FetchedArtifact {
                package_path,
                checksum_path,
                signature_path,
                attempts,
            })
        } else {
            // Air-gapped source: a local directory holding the same files
            let source = Path::new(&spec.source_uri);
            copy_local(&source.join(&name), &package_path).await?;
            copy_local(
                &source.join(format!("{name}.{CHECKSUM_EXT}")),
                &checksum_path,
            )
            .await?;
            copy_local(
                &source.join(format!("{name}.{SIGNATURE_EXT}")),
                &signature_path,
            )
            .await?;

            Ok(FetchedArtifact {
                package_path,
                checksum_path,
                signature_path,
                attempts: 1,
            })
        }
    }

    /// Download one file, retrying transient failures with backoff.
    ///
    /// Returns the number of attempts consumed.
    async fn download_with_retry(&self, url: &str, dest: &Path) -> Result<u32, Error> {
        let started = Instant::now();
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.retry.max_attempts {
            match download_file(&self.client, url, dest).await {
                Ok(_) => return Ok(attempt),
                Err(e) => {
                    if !is_retryable(&e) {
                        return Err(e);
                    }

                    if attempt < self.retry.max_attempts {
                        let delay = calculate_backoff_delay(&self.retry, attempt);
                        if started.elapsed() + delay >= self.retry.deadline {
                            return Err(NetworkError::DeadlineExceeded { attempts: attempt }.into());
                        }
                        self.tx.emit(AppEvent::Download(DownloadEvent::Retrying {
                            url: url.to_string(),
                            attempt,
                            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error: e.to_string(),
                        }));
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let message = last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string());
        self.tx.emit(AppEvent::Download(DownloadEvent::Failed {
            url: url.to_string(),
            attempts: self.retry.max_attempts,
            error: message.clone(),
        }));
        Err(NetworkError::RetriesExhausted {
            attempts: self.retry.max_attempts,
            message,
        }
        .into())
    }

    async fn cleanup(&self, spec: &PackageSpec) {
        let name = spec.artifact_name();
        for path in [
            self.staging_dir.join(&name),
            self.staging_dir.join(format!("{name}.{CHECKSUM_EXT}")),
            self.staging_dir.join(format!("{name}.{SIGNATURE_EXT}")),
        ] {
            let _ = tokio::fs::remove_file(path).await;
        }
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

async fn copy_local(src: &Path, dest: &Path) -> Result<(), Error> {
    if !tokio::fs::try_exists(src).await.unwrap_or(false) {
        return Err(NetworkError::NotFound {
            url: src.display().to_string(),
        }
        .into());
    }
    tokio::fs::copy(src, dest)
        .await
        .map_err(|e| Error::io_with_path(&e, dest))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://artifacts.warden.dev/downloads"));
        assert!(is_remote("http://localhost:8080"));
        assert!(!is_remote("/var/lib/warden/mirror"));
        assert!(!is_remote("relative/dir"));
    }
}
