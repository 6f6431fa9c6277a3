//! Integration tests for artifact fetching against a misbehaving server

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use warden_errors::{Error, NetworkError};
use warden_net::{ArtifactFetcher, NetClient, RetryConfig};
use warden_types::{Arch, Os, PackageFormat, PackageSpec, Version, VersionIdentity};

/// Minimal HTTP server that returns 500 for the first `fail_first` requests
/// to each path, then serves the registered bytes.
struct FlakyServer {
    addr: String,
    hits: Arc<Mutex<HashMap<String, u32>>>,
}

impl FlakyServer {
    async fn start(files: HashMap<String, Vec<u8>>, fail_first: u32) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let hits: Arc<Mutex<HashMap<String, u32>>> = Arc::new(Mutex::new(HashMap::new()));

        let hit_counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let files = files.clone();
                let hit_counter = hit_counter.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();

                    let hit = {
                        let mut hits = hit_counter.lock().unwrap();
                        let entry = hits.entry(path.clone()).or_insert(0);
                        *entry += 1;
                        *entry
                    };

                    let response = if hit <= fail_first {
                        b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_vec()
                    } else if let Some(body) = files.get(&path) {
                        let mut r = format!(
                            "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                            body.len()
                        )
                        .into_bytes();
                        r.extend_from_slice(body);
                        r
                    } else {
                        b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                            .to_vec()
                    };

                    let _ = socket.write_all(&response).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, hits }
    }

    fn hits_for(&self, path: &str) -> u32 {
        *self.hits.lock().unwrap().get(path).unwrap_or(&0)
    }
}

fn spec(source_uri: &str) -> PackageSpec {
    PackageSpec {
        identity: VersionIdentity::new(Version::parse("1.0.0").unwrap(), None),
        os: Os::Linux,
        arch: Arch::X86_64,
        format: PackageFormat::Tar,
        source_uri: source_uri.to_string(),
    }
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter_factor: 0.0,
        deadline: Duration::from_secs(10),
    }
}

fn artifact_files() -> HashMap<String, Vec<u8>> {
    let name = "warden-1.0.0-linux-x86_64.wpk";
    HashMap::from([
        (format!("/{name}"), b"package bytes".to_vec()),
        (format!("/{name}.blake3"), b"00ff".to_vec()),
        (format!("/{name}.minisig"), b"untrusted sig".to_vec()),
    ])
}

#[tokio::test]
async fn fetch_succeeds_after_transient_failures() {
    let server = FlakyServer::start(artifact_files(), 2).await;
    let staging = tempfile::tempdir().unwrap();
    let (tx, _rx) = warden_events::channel();

    let fetcher = ArtifactFetcher::new(
        NetClient::with_defaults().unwrap(),
        fast_retry(4),
        staging.path().to_path_buf(),
        tx,
    );

    let fetched = fetcher.fetch(&spec(&server.addr)).await.unwrap();

    // Two failures then success: three attempts, retry count two
    assert_eq!(fetched.attempts, 3);
    assert_eq!(server.hits_for("/warden-1.0.0-linux-x86_64.wpk"), 3);

    let body = tokio::fs::read(&fetched.package_path).await.unwrap();
    assert_eq!(body, b"package bytes");
}

#[tokio::test]
async fn fetch_gives_up_after_attempt_budget() {
    let server = FlakyServer::start(artifact_files(), u32::MAX).await;
    let staging = tempfile::tempdir().unwrap();
    let (tx, _rx) = warden_events::channel();

    let fetcher = ArtifactFetcher::new(
        NetClient::with_defaults().unwrap(),
        fast_retry(3),
        staging.path().to_path_buf(),
        tx,
    );

    let err = fetcher.fetch(&spec(&server.addr)).await.unwrap_err();
    match err {
        Error::Network(NetworkError::RetriesExhausted { attempts, .. }) => {
            assert_eq!(attempts, 3);
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }

    // Failure path leaves no staged files behind
    let mut entries = tokio::fs::read_dir(staging.path()).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn missing_sidecar_cleans_up_staged_package() {
    let name = "warden-1.0.0-linux-x86_64.wpk";
    // Package present, sidecars absent: 404s exhaust retries
    let files = HashMap::from([(format!("/{name}"), b"package bytes".to_vec())]);
    let server = FlakyServer::start(files, 0).await;
    let staging = tempfile::tempdir().unwrap();
    let (tx, _rx) = warden_events::channel();

    let fetcher = ArtifactFetcher::new(
        NetClient::with_defaults().unwrap(),
        fast_retry(2),
        staging.path().to_path_buf(),
        tx,
    );

    assert!(fetcher.fetch(&spec(&server.addr)).await.is_err());
    assert!(!staging.path().join(name).exists());
}

#[tokio::test]
async fn fetch_from_local_directory() {
    let source = tempfile::tempdir().unwrap();
    let name = "warden-1.0.0-linux-x86_64.wpk";
    for (file, body) in [
        (name.to_string(), "package bytes"),
        (format!("{name}.blake3"), "00ff"),
        (format!("{name}.minisig"), "sig"),
    ] {
        std::fs::write(source.path().join(file), body).unwrap();
    }

    let staging = tempfile::tempdir().unwrap();
    let (tx, _rx) = warden_events::channel();
    let fetcher = ArtifactFetcher::new(
        NetClient::with_defaults().unwrap(),
        fast_retry(2),
        staging.path().to_path_buf(),
        tx,
    );

    let fetched = fetcher
        .fetch(&spec(&source.path().display().to_string()))
        .await
        .unwrap();
    assert_eq!(fetched.attempts, 1);
    assert!(fetched.package_path.exists());
    assert!(fetched.signature_path.exists());
}
