//! Resolution of concrete download links for the current platform.

use crate::error::UpdateError;
use crate::http::validate_url;
use crate::index::VersionDescriptor;
use crate::platform::PlatformKey;
use crate::types::ToolKind;

/// Download links for both tools on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Links {
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Links {
    /// Link for the given tool.
    pub fn get(&self, tool: ToolKind) -> &str {
        match tool {
            ToolKind::FFmpeg => &self.ffmpeg,
            ToolKind::FFprobe => &self.ffprobe,
        }
    }
}

/// Looks up `platform` in the descriptor.
///
/// # Errors
///
/// - [`UpdateError::UnsupportedPlatform`] if the descriptor has no entry for
///   `platform`; the error lists the keys that do exist.
/// - [`UpdateError::InvalidUrl`] if either link is not an http(s) URL.
pub fn get_links(
    descriptor: &VersionDescriptor,
    platform: &PlatformKey,
) -> Result<Links, UpdateError> {
    let entry = descriptor
        .bin
        .get(platform.as_str())
        .ok_or_else(|| UpdateError::UnsupportedPlatform {
            key: platform.clone(),
            supported: descriptor.platform_keys(),
        })?;

    validate_url(&entry.ffmpeg)?;
    validate_url(&entry.ffprobe)?;

    Ok(Links {
        ffmpeg: entry.ffmpeg.clone(),
        ffprobe: entry.ffprobe.clone(),
    })
}
