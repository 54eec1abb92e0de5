//! Error types for binary acquisition.
//!
//! `UpdateError` is what callers of [`crate::FFmpegUpdater`] see. Every variant
//! names the URL, path or platform key involved so a failure can be diagnosed
//! from the message alone. `TransportError` is the narrower failure type of the
//! [`crate::http::HttpClient`] seam; the fetcher retries on it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::platform::PlatformKey;

/// Boxed cause attached to extraction failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A single failed HTTP exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("could not reach {url}: {message}")]
    Connect { url: String, message: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("response body from {url} was interrupted: {message}")]
    Body { url: String, message: String },
}

/// Failure of one part of the update workflow.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The version index could not be fetched.
    #[error("failed to fetch version index from {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: TransportError,
    },

    /// The version index body did not match the expected shape.
    #[error("malformed version descriptor from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// The descriptor has no links for the resolved platform.
    #[error("no binaries published for platform '{key}' (available: {})", .supported.join(", "))]
    UnsupportedPlatform {
        key: PlatformKey,
        supported: Vec<String>,
    },

    /// A link is not an absolute http(s) URL.
    #[error("refusing to download from '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Every attempt to fetch a file failed.
    #[error("download of {url} failed after {attempts} attempt(s): {source}")]
    Download {
        url: String,
        attempts: u32,
        #[source]
        source: DownloadCause,
    },

    /// An archive could not be unpacked into the target directory.
    #[error("failed to extract {}: {source}", .archive.display())]
    Extraction {
        archive: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Local filesystem failure outside of extraction.
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Last underlying cause of a failed download.
#[derive(Debug, Error)]
pub enum DownloadCause {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("could not write temporary file: {0}")]
    Io(#[from] io::Error),
}

impl UpdateError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
