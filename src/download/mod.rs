use anyhow::Context;
use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::storefront::{selectors, StorefrontSession};
use crate::utils::{format_file_size, validate_and_normalize_url};
use crate::{Result, ScribeError};

/// How a container file ended up on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was already present; no session was opened and nothing was written
    AlreadyPresent(PathBuf),
    /// The file was captured from the library session
    Downloaded(PathBuf),
}

impl DownloadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            DownloadOutcome::AlreadyPresent(path) => path,
            DownloadOutcome::Downloaded(path) => path,
        }
    }
}

/// Get the container file for a book, going through the storefront if needed
///
/// An existing file at `destination` short-circuits the whole browser flow;
/// no content validation is performed on it. Otherwise the session is opened,
/// the request watch is installed before any navigation, and the sign-in /
/// search / download-click sequence runs until the watch captures the file.
pub async fn acquire_container(
    config: &Config,
    client: &Client,
    email: &str,
    password: &str,
    title: &str,
    destination: &Path,
    quiet: bool,
) -> Result<DownloadOutcome> {
    if destination.exists() {
        tracing::info!(
            path = %destination.display(),
            "Container already on disk, skipping the storefront session"
        );
        return Ok(DownloadOutcome::AlreadyPresent(destination.to_path_buf()));
    }

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }

    let session = StorefrontSession::launch(&config.storefront).await?;

    // Subscribe before navigating anywhere so the download request cannot
    // slip past the watch.
    let watch = RequestWatch::install(
        session.page(),
        client.clone(),
        destination.to_path_buf(),
        quiet,
    )
    .await?;

    session.sign_in(email, password).await?;
    session.open_library(title).await?;
    session.trigger_download(title).await?;

    let timeout = Duration::from_secs(config.storefront.download_timeout_secs);
    let captured = watch.wait(timeout).await;
    session.close().await?;

    Ok(DownloadOutcome::Downloaded(captured?))
}

/// Watches a page's network traffic for the library download request
///
/// Every request whose URL lacks the download marker is ignored; the page's
/// own traffic is never blocked or modified. The first matching request is
/// re-issued with the intercepted headers and streamed to the destination.
pub struct RequestWatch {
    task: JoinHandle<Result<PathBuf>>,
}

impl RequestWatch {
    /// Install the watch on a page; must happen before navigation
    pub async fn install(
        page: &chromiumoxide::Page,
        client: Client,
        destination: PathBuf,
        quiet: bool,
    ) -> Result<Self> {
        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;

        let task = tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                if !selectors::is_download_request(&event.request.url) {
                    continue;
                }

                let url = event.request.url.clone();
                tracing::info!(%url, "Download request intercepted");
                let headers = forward_headers(&event.request.headers)?;
                stream_to_file(&client, &url, headers, &destination, quiet).await?;
                return Ok(destination);
            }

            Err(ScribeError::DownloadFailed(
                "browser session ended before a download request was seen".to_string(),
            )
            .into())
        });

        Ok(Self { task })
    }

    /// Wait for the watched download to finish streaming to disk
    pub async fn wait(self, timeout: Duration) -> Result<PathBuf> {
        let mut task = self.task;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => joined.context("Request watch task failed")?,
            Err(_) => {
                task.abort();
                Err(ScribeError::DownloadFailed(format!(
                    "no download request observed within {}s",
                    timeout.as_secs()
                ))
                .into())
            }
        }
    }
}

/// Map intercepted CDP request headers onto a reqwest header map
///
/// HTTP/2 pseudo-headers (`:authority` and friends) and anything that is not
/// a valid header name/value are skipped.
fn forward_headers<T: Serialize>(headers: &T) -> Result<HeaderMap> {
    let value = serde_json::to_value(headers)?;
    let mut map = HeaderMap::new();

    if let Some(object) = value.as_object() {
        for (name, val) in object {
            if name.starts_with(':') {
                continue;
            }
            let text = match val.as_str() {
                Some(text) => text,
                None => continue,
            };
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::from_str(text),
            ) {
                (Ok(header_name), Ok(header_value)) => {
                    map.insert(header_name, header_value);
                }
                _ => tracing::debug!(header = %name, "Skipping unforwardable header"),
            }
        }
    }

    Ok(map)
}

/// Streaming GET piped chunk-by-chunk into a file
///
/// Resolves with the byte count on finish; any stream or write error
/// propagates to the caller. No retry, no partial-file cleanup.
pub async fn stream_to_file(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    destination: &Path,
    quiet: bool,
) -> Result<u64> {
    let response = client.get(url).headers(headers).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to download: HTTP {}", response.status());
    }

    let total_size = response.content_length().unwrap_or(0);
    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total_size)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap(),
    );
    progress.set_message("Downloading...");

    let mut file = fs_err::File::create(destination)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress.set_position(downloaded);
    }

    progress.finish_with_message("Download complete");
    tracing::info!(
        path = %destination.display(),
        size = %format_file_size(downloaded),
        "Download written"
    );

    Ok(downloaded)
}

/// Fetch any URL straight to a file, independent of the browser flow
pub async fn fetch_to_file(
    client: &Client,
    url: &str,
    destination: &Path,
    quiet: bool,
) -> Result<u64> {
    let url = validate_and_normalize_url(url)?;
    stream_to_file(client, &url, HeaderMap::new(), destination, quiet).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Minimal HTTP server answering exactly one request with a canned body
    async fn spawn_one_shot_server(body: &'static str) -> Result<String> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Ok(format!("http://{}/file.bin", addr))
    }

    #[tokio::test]
    async fn test_fetch_resolves_and_writes_body() {
        let url = spawn_one_shot_server("hello").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.bin");

        let client = Client::new();
        let written = fetch_to_file(&client, &url, &destination, true)
            .await
            .unwrap();

        assert_eq!(written, 5);
        assert_eq!(fs_err::read_to_string(&destination).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_fetch_rejects_on_write_error() {
        let url = spawn_one_shot_server("hello").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so the file create fails
        let destination = dir.path().join("missing").join("out.bin");

        let client = Client::new();
        let result = fetch_to_file(&client, &url, &destination, true).await;

        assert!(result.is_err());
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.bin");

        let client = Client::new();
        let result = fetch_to_file(&client, "not-a-url", &destination, true).await;

        assert!(result.is_err());
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_existing_container_skips_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("book.aax");
        fs_err::write(&destination, b"container bytes").unwrap();

        // No browser is installed in the test environment; reaching the
        // session launch would fail, so success proves the short-circuit.
        let config = Config::default();
        let client = Client::new();
        let outcome = acquire_container(
            &config,
            &client,
            "user@example.com",
            "secret",
            "Some Book",
            &destination,
            true,
        )
        .await
        .unwrap();

        assert_eq!(outcome, DownloadOutcome::AlreadyPresent(destination.clone()));
        assert_eq!(
            fs_err::read(&destination).unwrap(),
            b"container bytes".to_vec()
        );
    }

    #[test]
    fn test_forward_headers_skips_pseudo_headers() {
        let headers = serde_json::json!({
            ":authority": "www.audible.com",
            "user-agent": "Mozilla/5.0",
            "cookie": "session=abc123",
            "x-bad\nname": "value",
        });

        let map = forward_headers(&headers).unwrap();

        assert_eq!(map.get("user-agent").unwrap(), "Mozilla/5.0");
        assert_eq!(map.get("cookie").unwrap(), "session=abc123");
        assert_eq!(map.len(), 2);
    }
}
