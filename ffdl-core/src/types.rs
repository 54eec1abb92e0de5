//! Core types shared by the fetcher, installer and updater.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::platform::HostFacts;
use crate::version::ToolVersion;

// ============================================================================
// Tool Identifiers
// ============================================================================

/// The two executables kept in the target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// FFmpeg - media transcoder.
    FFmpeg,
    /// FFprobe - media prober.
    FFprobe,
}

impl ToolKind {
    /// Returns both tools.
    pub fn all() -> &'static [ToolKind] {
        &[Self::FFmpeg, Self::FFprobe]
    }

    /// Returns the lowercase identifier, also used as the progress file id.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FFmpeg => "ffmpeg",
            Self::FFprobe => "ffprobe",
        }
    }

    /// File name of the executable on the given host.
    pub fn executable_name(&self, host: &HostFacts) -> String {
        if host.is_windows() {
            format!("{}.exe", self.as_str())
        } else {
            self.as_str().to_string()
        }
    }

    /// Path of the installed executable inside `dir`.
    pub fn executable_path(&self, dir: &Path, host: &HostFacts) -> PathBuf {
        dir.join(self.executable_name(host))
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Progress of one file transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    /// Which file this update belongs to.
    pub tool: ToolKind,
    /// Bytes received in the current attempt.
    pub bytes_transferred: u64,
    /// Total bytes expected (if known from Content-Length header).
    pub total_bytes: Option<u64>,
    /// Progress percentage (0.0 to 100.0), or None if total is unknown.
    pub percent: Option<f32>,
}

impl ProgressInfo {
    pub(crate) fn new(tool: ToolKind, bytes_transferred: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes.map(|total| {
            if total > 0 {
                (bytes_transferred as f32 / total as f32) * 100.0
            } else {
                0.0
            }
        });

        Self {
            tool,
            bytes_transferred,
            total_bytes,
            percent,
        }
    }
}

/// Receiver of progress updates.
///
/// Invoked from both concurrent transfers; updates for the two tools may
/// interleave in any order.
pub type ProgressSink = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

// ============================================================================
// Update Outcome
// ============================================================================

/// Result of a successful `ensure_latest` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Installed binaries already match the latest version. Nothing was downloaded.
    UpToDate { version: ToolVersion },
    /// A new version was downloaded and installed.
    Installed {
        version: ToolVersion,
        previous: Option<ToolVersion>,
    },
}

impl UpdateOutcome {
    /// The version present in the target directory after the call.
    pub fn version(&self) -> &ToolVersion {
        match self {
            Self::UpToDate { version } | Self::Installed { version, .. } => version,
        }
    }

    /// Returns true if this call downloaded anything.
    pub fn did_install(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }
}
