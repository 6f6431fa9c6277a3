//! Streaming downloads and backoff calculations

use crate::client::NetClient;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use warden_errors::{Error, NetworkError};

/// Retry configuration for downloads
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included)
    pub max_attempts: u32,
    /// Initial backoff delay
    pub initial_delay: Duration,
    /// Maximum backoff delay
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
    /// Overall deadline across all attempts
    pub deadline: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            deadline: Duration::from_secs(600),
        }
    }
}

/// Calculate exponential backoff delay with jitter
#[must_use]
pub(crate) fn calculate_backoff_delay(retry_config: &RetryConfig, attempt: u32) -> Duration {
    let base_delay = {
        // Precision loss acceptable for backoff calculations
        #[allow(clippy::cast_precision_loss)]
        {
            retry_config
                .initial_delay
                .as_millis()
                .min(u128::from(u64::MAX)) as f64
        }
    };
    let multiplier = retry_config.backoff_multiplier;
    let max_delay = {
        #[allow(clippy::cast_precision_loss)]
        {
            retry_config.max_delay.as_millis().min(u128::from(u64::MAX)) as f64
        }
    };

    let delay = base_delay
        * multiplier.powi({
            // Retry attempts are small (< 10)
            #[allow(clippy::cast_possible_wrap)]
            {
                attempt as i32 - 1
            }
        });
    let delay = delay.min(max_delay);

    // Add jitter
    let jitter = delay * retry_config.jitter_factor * (rand::random::<f64>() - 0.5);
    let final_delay = {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            (delay + jitter).max(0.0).round() as u64
        }
    };

    Duration::from_millis(final_delay)
}

/// Download a file to `dest`, truncating any partial previous attempt.
///
/// A single attempt with no internal retry; callers drive the retry loop.
///
/// # Errors
///
/// Returns an error on HTTP failure (404 and 5xx included) or I/O failure
/// while writing the destination.
pub async fn download_file(client: &NetClient, url: &str, dest: &Path) -> Result<u64, Error> {
    let response = client.get(url).await?;

    let status = response.status();
    if status.as_u16() == 404 {
        return Err(NetworkError::NotFound {
            url: url.to_string(),
        }
        .into());
    }
    if !status.is_success() {
        return Err(NetworkError::HttpError {
            status: status.as_u16(),
            message: status.to_string(),
        }
        .into());
    }

    // Truncate so a retried attempt overwrites rather than appends
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| Error::io_with_path(&e, dest))?;
    let mut stream = response.bytes_stream();
    let mut downloaded = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| NetworkError::DownloadFailed(e.to_string()))?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }

    file.sync_all().await?;
    Ok(downloaded)
}

/// Whether a failed attempt is worth retrying
#[must_use]
pub(crate) fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Network(net) => !matches!(net, NetworkError::InvalidUrl(_)),
        Error::Io { .. } => false,
        _ => false,
    }
}
