//! FFmpeg binary acquisition.
//!
//! This crate downloads the FFmpeg and FFprobe executables for the running
//! platform and keeps them current. It includes:
//!
//! - Platform resolution against the version index's platform keys
//! - Version index client and link lookup
//! - Installed-version marker (`version.json`) persistence
//! - Concurrent, retrying archive downloads with progress reporting
//! - Staged archive extraction into a flat binaries directory
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use std::sync::Arc;
//! use ffdl_core::{FFmpegUpdater, UpdaterConfig};
//!
//! let updater = FFmpegUpdater::new(UpdaterConfig::default())?;
//! let progress = Arc::new(|p: ffdl_core::ProgressInfo| {
//!     if let Some(percent) = p.percent {
//!         println!("{}: {:.1}%", p.tool, percent);
//!     }
//! });
//! let outcome = updater.ensure_latest(Path::new("./bin"), Some(progress), None).await?;
//! println!("FFmpeg {} ready", outcome.version());
//! ```

pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod http;
pub mod index;
pub mod links;
pub mod marker;
pub mod platform;
pub mod types;
pub mod updater;
pub mod version;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use config::UpdaterConfig;
pub use error::{DownloadCause, TransportError, UpdateError};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use index::{IndexClient, ToolLinks, VersionDescriptor};
pub use links::{get_links, Links};
pub use marker::{read_marker, write_marker, LocalMarker, MARKER_FILE_NAME};
pub use platform::{resolve, HostFacts, PlatformKey};
pub use types::{ProgressInfo, ProgressSink, ToolKind, UpdateOutcome};
pub use updater::FFmpegUpdater;
pub use version::ToolVersion;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
