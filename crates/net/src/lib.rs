#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for warden
//!
//! This crate handles artifact retrieval: an HTTP client with connection
//! pooling, streaming downloads with bounded retry, and the fetcher that
//! pulls a release package plus its sidecars into staging.

mod client;
mod download;
mod fetch;

pub use client::{NetClient, NetConfig};
pub use download::{download_file, RetryConfig};
pub use fetch::{ArtifactFetcher, FetchedArtifact};

use warden_errors::{Error, NetworkError};
use warden_events::{EventEmitter, EventSender};

/// Fetch text content from a URL
///
/// # Errors
///
/// Returns an error if the HTTP request fails, the server returns an error
/// status, or the response body cannot be decoded as text.
pub async fn fetch_text(client: &NetClient, url: &str, tx: &EventSender) -> Result<String, Error> {
    tx.emit_debug(format!("Fetching text from {url}"));

    let response = client.get(url).await?;

    if !response.status().is_success() {
        return Err(NetworkError::HttpError {
            status: response.status().as_u16(),
            message: response.status().to_string(),
        }
        .into());
    }

    response
        .text()
        .await
        .map_err(|e| NetworkError::DownloadFailed(e.to_string()).into())
}
