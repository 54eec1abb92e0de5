//! Streaming file download with bounded retry and progress reporting.
//!
//! Each attempt writes to a fresh, uniquely named temp file; a failed attempt
//! deletes its partial file before the next one starts. When every attempt
//! fails, no temp file is left behind.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{DownloadCause, UpdateError};
use crate::http::{validate_url, HttpClient};
use crate::types::{ProgressInfo, ProgressSink, ToolKind};

/// Downloads files into a temp directory, retrying transient failures.
pub struct RetryingFetcher {
    client: Arc<dyn HttpClient>,
    temp_dir: PathBuf,
    retry_delay: Duration,
}

impl RetryingFetcher {
    pub fn new(client: Arc<dyn HttpClient>, temp_dir: PathBuf, retry_delay: Duration) -> Self {
        Self {
            client,
            temp_dir,
            retry_delay,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Downloads `url` and returns the path of the temp file holding it.
    ///
    /// Makes up to `max_retries + 1` attempts. The delay before retry `n` is
    /// `retry_delay * n`.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::InvalidUrl`] if `url` is not http(s); nothing is attempted.
    /// - [`UpdateError::Io`] if the temp directory cannot be created.
    /// - [`UpdateError::Download`] with the last cause once all attempts failed.
    pub async fn fetch(
        &self,
        tool: ToolKind,
        url: &str,
        progress: Option<&ProgressSink>,
        max_retries: u32,
    ) -> Result<PathBuf, UpdateError> {
        validate_url(url)?;

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| UpdateError::io("failed to create temp directory", &self.temp_dir, e))?;

        let attempts = max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            let dest = self.temp_path(tool, url);
            debug!("Downloading {} (attempt {}/{})", url, attempt, attempts);

            match self.fetch_once(tool, url, &dest, progress).await {
                Ok(bytes) => {
                    info!(
                        "Downloaded {}: {} bytes written to {}",
                        tool,
                        bytes,
                        dest.display()
                    );
                    return Ok(dest);
                }
                Err(cause) => {
                    discard(&dest).await;

                    if attempt >= attempts {
                        return Err(UpdateError::Download {
                            url: url.to_string(),
                            attempts: attempt,
                            source: cause,
                        });
                    }

                    warn!(
                        "Attempt {}/{} to download {} failed: {}",
                        attempt, attempts, url, cause
                    );
                    let delay = backoff(self.retry_delay, attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        tool: ToolKind,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressSink>,
    ) -> Result<u64, DownloadCause> {
        let response = self.client.get(url).await?;
        let total_bytes = response.content_length;

        let mut file = File::create(dest).await?;
        let mut stream = response.body;
        let mut bytes_transferred: u64 = 0;

        report(progress, ProgressInfo::new(tool, 0, total_bytes));

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;

            bytes_transferred += chunk.len() as u64;
            report(
                progress,
                ProgressInfo::new(tool, bytes_transferred, total_bytes),
            );
        }

        file.flush().await?;
        Ok(bytes_transferred)
    }

    fn temp_path(&self, tool: ToolKind, url: &str) -> PathBuf {
        let extension = archive_suffix(url);
        self.temp_dir
            .join(format!("{}-{}{}", tool, uuid::Uuid::new_v4(), extension))
    }
}

fn report(progress: Option<&ProgressSink>, info: ProgressInfo) {
    if let Some(sink) = progress {
        sink(info);
    }
}

/// Removes a temp file, ignoring "not found".
pub(crate) async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed temp file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
    }
}

/// Delay before retry `attempt`, saturating instead of overflowing.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(attempt).unwrap_or(Duration::MAX)
}

/// Archive suffix of the link's path, kept on the temp file for format detection.
fn archive_suffix(url: &str) -> &'static str {
    let lower = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => url.to_lowercase(),
    };
    [".tar.gz", ".tgz", ".tar.xz", ".zip"]
        .into_iter()
        .find(|suffix| lower.ends_with(suffix))
        .unwrap_or(".download")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::test_support::{FailureMode, FakeHttpClient};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const URL: &str = "https://example.com/ffmpeg-6.1-linux-64.zip";

    fn fetcher(fake: Arc<FakeHttpClient>, temp_dir: &TempDir) -> RetryingFetcher {
        RetryingFetcher::new(fake, temp_dir.path().to_path_buf(), Duration::ZERO)
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let temp_dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeHttpClient::new());
        fake.serve(URL, b"archive bytes".to_vec());

        let path = fetcher(fake.clone(), &temp_dir)
            .fetch(ToolKind::FFmpeg, URL, None, 2)
            .await
            .unwrap();

        assert!(path.starts_with(temp_dir.path()));
        assert!(path.to_string_lossy().ends_with(".zip"));
        assert_eq!(std::fs::read(&path).unwrap(), b"archive bytes");
        assert_eq!(fake.hits(URL), 1);
    }

    #[tokio::test]
    async fn test_fetch_succeeds_on_last_attempt() {
        let temp_dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeHttpClient::new());
        fake.serve_failing(URL, b"finally".to_vec(), 2, FailureMode::Connect);

        let path = fetcher(fake.clone(), &temp_dir)
            .fetch(ToolKind::FFmpeg, URL, None, 2)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"finally");
        assert_eq!(fake.hits(URL), 3);
    }

    #[tokio::test]
    async fn test_fetch_exhausts_retries() {
        let temp_dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeHttpClient::new());
        fake.serve_failing(URL, b"never".to_vec(), 3, FailureMode::Status(503));

        let err = fetcher(fake.clone(), &temp_dir)
            .fetch(ToolKind::FFmpeg, URL, None, 2)
            .await
            .unwrap_err();

        match err {
            UpdateError::Download {
                url,
                attempts,
                source: DownloadCause::Transport(TransportError::Status { status, .. }),
            } => {
                assert_eq!(url, URL);
                assert_eq!(attempts, 3);
                assert_eq!(status, 503);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fake.hits(URL), 3);
        assert!(dir_is_empty(temp_dir.path()));
    }

    #[tokio::test]
    async fn test_interrupted_body_discards_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeHttpClient::new());
        fake.serve_failing(URL, b"complete body".to_vec(), 1, FailureMode::MidStream);

        let path = fetcher(fake.clone(), &temp_dir)
            .fetch(ToolKind::FFmpeg, URL, None, 1)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"complete body");
        let files: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1, "partial file from failed attempt left behind");
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let temp_dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeHttpClient::new());
        fake.serve_failing(URL, b"data".to_vec(), 1, FailureMode::Connect);

        let err = fetcher(fake.clone(), &temp_dir)
            .fetch(ToolKind::FFmpeg, URL, None, 0)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Download { attempts: 1, .. }));
        assert_eq!(fake.hits(URL), 1);
    }

    #[tokio::test]
    async fn test_progress_reported() {
        let temp_dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeHttpClient::new());
        fake.serve(URL, vec![7u8; 10]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: ProgressSink = Arc::new(move |info: ProgressInfo| {
            sink_seen.lock().unwrap().push(info);
        });

        fetcher(fake, &temp_dir)
            .fetch(ToolKind::FFprobe, URL, Some(&sink), 0)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.len() >= 2);
        assert_eq!(seen[0].bytes_transferred, 0);
        let last = seen.last().unwrap();
        assert_eq!(last.tool, ToolKind::FFprobe);
        assert_eq!(last.bytes_transferred, 10);
        assert_eq!(last.total_bytes, Some(10));
        assert_eq!(last.percent, Some(100.0));
    }

    #[tokio::test]
    async fn test_invalid_url_not_attempted() {
        let temp_dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeHttpClient::new());

        let err = fetcher(fake.clone(), &temp_dir)
            .fetch(ToolKind::FFmpeg, "ftp://example.com/ffmpeg.zip", None, 3)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::InvalidUrl { .. }));
        assert_eq!(fake.hits("ftp://example.com/ffmpeg.zip"), 0);
    }

    #[test]
    fn test_archive_suffix() {
        assert_eq!(archive_suffix("https://x/ffmpeg.zip"), ".zip");
        assert_eq!(archive_suffix("https://x/ffmpeg.TAR.XZ"), ".tar.xz");
        assert_eq!(archive_suffix("https://x/ffmpeg.tgz"), ".tgz");
        assert_eq!(archive_suffix("https://x/ffmpeg"), ".download");
    }

    #[test]
    fn test_archive_suffix_ignores_query_and_fragment() {
        assert_eq!(archive_suffix("https://x/ffmpeg.tar.xz?raw=1"), ".tar.xz");
        assert_eq!(archive_suffix("https://x/ffprobe.zip#latest"), ".zip");
        assert_eq!(archive_suffix("https://x/get?file=ffmpeg.zip"), ".download");
    }

    #[test]
    fn test_backoff_is_linear_and_saturates() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff(base, 1), Duration::from_millis(500));
        assert_eq!(backoff(base, 3), Duration::from_millis(1500));
        assert_eq!(backoff(Duration::MAX, 2), Duration::MAX);
        assert_eq!(backoff(Duration::from_millis(u64::MAX), u32::MAX), Duration::MAX);
    }
}
