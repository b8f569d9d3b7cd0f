// src/fetch.rs

//! Artifact downloads
//!
//! [`download_cached`] is the idempotent fetch-to-disk used for every
//! upstream file: if the target already exists it is returned untouched,
//! with no network traffic and no validation. Otherwise the body is streamed
//! into a `.part` file and renamed into place once complete.
//!
//! The transport sits behind the [`Fetcher`] trait. [`HttpFetcher`] is the
//! production implementation; every request it makes is bounded by a
//! connect timeout and an overall deadline.

use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default overall deadline for one download
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Connect timeout for HTTP requests
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffer size for streaming downloads (64 KB)
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Fallback file name when a URL ends in `/`
const DEFAULT_FILENAME: &str = "download";

/// Source of remote bytes
pub trait Fetcher {
    /// Stream the body at `url` into `sink`, returning the byte count
    ///
    /// A non-success response must fail with [`Error::HttpStatus`].
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;
}

/// Blocking HTTP fetcher
pub struct HttpFetcher {
    client: Client,
    show_progress: bool,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .user_agent(concat!("debrepack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            show_progress: false,
        })
    }

    /// Draw a progress bar on stderr while downloading
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, total_size: Option<u64>, url: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let name = file_name_from_url(url);
        let pb = match total_size {
            Some(size) => {
                let pb = ProgressBar::new(size);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec}) {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            }
        };
        pb.set_message(name);
        pb
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        debug!("GET {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to fetch {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let pb = self.progress_bar(response.content_length(), url);
        let mut downloaded: u64 = 0;
        let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];

        loop {
            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| Error::DownloadError(format!("Failed to read response from {url}: {e}")))?;
            if bytes_read == 0 {
                break;
            }
            sink.write_all(&buffer[..bytes_read])
                .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;
            downloaded += bytes_read as u64;
            pb.set_position(downloaded);
        }

        pb.finish_and_clear();
        Ok(downloaded)
    }
}

/// Last path segment of a URL, without query string or fragment
pub fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let without_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    match without_scheme.split_once('/') {
        Some((_, path)) => path
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string(),
        None => DEFAULT_FILENAME.to_string(),
    }
}

/// Fetch `url` to `dir/filename` unless that file already exists
pub fn download_cached(
    fetcher: &dyn Fetcher,
    dir: &Path,
    filename: &str,
    url: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| {
        Error::IoError(format!("Failed to create directory {}: {e}", dir.display()))
    })?;

    let dest_path = dir.join(filename);
    if dest_path.exists() {
        debug!("Using cached {}", dest_path.display());
        return Ok(dest_path);
    }

    info!("Downloading {} to {}", url, dest_path.display());

    let temp_path = dir.join(format!("{filename}.part"));
    let file = File::create(&temp_path).map_err(|e| {
        Error::IoError(format!("Failed to create file {}: {e}", temp_path.display()))
    })?;
    let mut writer = BufWriter::new(file);

    let written = fetcher
        .fetch(url, &mut writer)
        .and_then(|n| writer.flush().map(|()| n).map_err(Error::from));
    drop(writer);

    let bytes = match written {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
    };

    fs::rename(&temp_path, &dest_path).map_err(|e| {
        Error::IoError(format!(
            "Failed to move {} to {}: {e}",
            temp_path.display(),
            dest_path.display()
        ))
    })?;

    debug!("Downloaded {} bytes to {}", bytes, dest_path.display());
    Ok(dest_path)
}

/// Fetch `url` to an exact file path, with the same caching rule
pub fn download_to(fetcher: &dyn Fetcher, dest_path: &Path, url: &str) -> Result<PathBuf> {
    let dir = dest_path.parent().ok_or_else(|| {
        Error::InvalidPath(format!("{} has no parent directory", dest_path.display()))
    })?;
    let filename = dest_path
        .file_name()
        .ok_or_else(|| Error::InvalidPath(format!("{} has no file name", dest_path.display())))?;
    download_cached(fetcher, dir, &filename.to_string_lossy(), url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct CountingFetcher {
        calls: Cell<usize>,
        body: &'static [u8],
    }

    impl Fetcher for CountingFetcher {
        fn fetch(&self, _url: &str, sink: &mut dyn Write) -> Result<u64> {
            self.calls.set(self.calls.get() + 1);
            sink.write_all(self.body)?;
            Ok(self.body.len() as u64)
        }
    }

    struct FailingFetcher;

    impl Fetcher for FailingFetcher {
        fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
            sink.write_all(b"partial")?;
            Err(Error::HttpStatus {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/v1/app-amd64.tar.gz?raw=1#x"),
            "app-amd64.tar.gz"
        );
        assert_eq!(file_name_from_url("https://example.com/dl/kubectl"), "kubectl");
        assert_eq!(file_name_from_url("https://example.com/"), DEFAULT_FILENAME);
        assert_eq!(file_name_from_url("https://example.com"), DEFAULT_FILENAME);
    }

    #[test]
    fn test_existing_file_skips_network() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app.tar.gz"), b"stale").unwrap();

        let fetcher = CountingFetcher {
            calls: Cell::new(0),
            body: b"fresh",
        };
        let path = download_cached(&fetcher, temp.path(), "app.tar.gz", "https://x/app.tar.gz")
            .unwrap();

        assert_eq!(fetcher.calls.get(), 0);
        assert_eq!(fs::read(path).unwrap(), b"stale");
    }

    #[test]
    fn test_download_creates_directory_and_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cache/amd64");
        let fetcher = CountingFetcher {
            calls: Cell::new(0),
            body: b"payload",
        };

        let path = download_cached(&fetcher, &dir, "tool", "https://x/tool").unwrap();
        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(fs::read(&path).unwrap(), b"payload");
        assert!(!dir.join("tool.part").exists());

        download_cached(&fetcher, &dir, "tool", "https://x/tool").unwrap();
        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn test_failed_download_leaves_no_file() {
        let temp = TempDir::new().unwrap();
        let err = download_cached(&FailingFetcher, temp.path(), "app.deb", "https://x/app.deb")
            .unwrap_err();

        assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
        assert!(!temp.path().join("app.deb").exists());
        assert!(!temp.path().join("app.deb.part").exists());
    }

    #[test]
    fn test_download_to_nested_path() {
        let temp = TempDir::new().unwrap();
        let fetcher = CountingFetcher {
            calls: Cell::new(0),
            body: b"man page",
        };
        let dest = temp.path().join("usr/share/man/man1/tool.1");
        download_to(&fetcher, &dest, "https://x/tool.1").unwrap();
        assert_eq!(fs::read(dest).unwrap(), b"man page");
    }

    #[test]
    fn test_http_fetcher_streams_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/releases/app.tar.gz")
            .with_status(200)
            .with_body("archive bytes")
            .create();

        let fetcher = HttpFetcher::new(Duration::from_secs(10)).unwrap();
        let mut body = Vec::new();
        let n = fetcher
            .fetch(&format!("{}/releases/app.tar.gz", server.url()), &mut body)
            .unwrap();

        mock.assert();
        assert_eq!(n, 13);
        assert_eq!(body, b"archive bytes");
    }

    #[test]
    fn test_http_fetcher_reports_status() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/missing").with_status(404).create();

        let fetcher = HttpFetcher::new(Duration::from_secs(10)).unwrap();
        let url = format!("{}/missing", server.url());
        let err = fetcher.fetch(&url, &mut Vec::new()).unwrap_err();

        match err {
            Error::HttpStatus { url: u, status } => {
                assert_eq!(status, 404);
                assert_eq!(u, url);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
