//! Installed-version marker persistence.
//!
//! The marker is a `version.json` file next to the installed binaries:
//!
//! ```json
//! { "version": "6.1" }
//! ```
//!
//! It is written only after both tools were installed, so a present marker
//! always names a directory whose binaries were complete at write time.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::UpdateError;
use crate::version::ToolVersion;

/// File name of the marker inside the target directory.
pub const MARKER_FILE_NAME: &str = "version.json";

/// Persisted record of the installed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMarker {
    pub version: ToolVersion,
}

/// Returns the marker path for a target directory.
pub fn marker_path(dir: &Path) -> PathBuf {
    dir.join(MARKER_FILE_NAME)
}

/// Reads the marker from `dir`.
///
/// Returns `None` if the file is missing, unreadable or not a valid marker;
/// all of these mean "nothing installed" and lead to a fresh download.
pub fn read_marker(dir: &Path) -> Option<LocalMarker> {
    let path = marker_path(dir);
    if !path.exists() {
        debug!("No version marker at {}", path.display());
        return None;
    }

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read version marker {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<LocalMarker>(&content) {
        Ok(marker) => Some(marker),
        Err(e) => {
            warn!(
                "Ignoring unparsable version marker {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

/// Writes the marker for `version` into `dir`.
///
/// The content goes to a sibling temp file first and is then renamed over the
/// marker, so a crash never leaves a torn marker behind.
pub fn write_marker(dir: &Path, version: &ToolVersion) -> Result<(), UpdateError> {
    let path = marker_path(dir);
    let tmp_path = dir.join(format!(".{}.{}.tmp", MARKER_FILE_NAME, uuid::Uuid::new_v4()));

    let marker = LocalMarker {
        version: version.clone(),
    };
    let content = serde_json::to_string_pretty(&marker).map_err(|source| UpdateError::Parse {
        origin: path.display().to_string(),
        source,
    })?;

    let result = write_synced(&tmp_path, content.as_bytes())
        .map_err(|e| UpdateError::io("failed to write version marker", &tmp_path, e))
        .and_then(|()| {
            fs::rename(&tmp_path, &path)
                .map_err(|e| UpdateError::io("failed to replace version marker", &path, e))
        });

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result?;

    debug!("Version marker {} saved to {}", version, path.display());
    Ok(())
}

fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}

/// Decides whether an update must be downloaded.
///
/// True when nothing is installed, when the remote version is strictly newer,
/// or when the marker exists but the binaries are gone.
pub fn update_required(
    marker: Option<&LocalMarker>,
    remote: &ToolVersion,
    binaries_present: bool,
) -> bool {
    match marker {
        None => true,
        Some(marker) => remote > &marker.version || !binaries_present,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(s: &str) -> ToolVersion {
        ToolVersion::parse(s).unwrap()
    }

    fn marker(s: &str) -> LocalMarker {
        LocalMarker { version: v(s) }
    }

    #[test]
    fn test_marker_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        write_marker(temp_dir.path(), &v("6.1")).unwrap();

        let loaded = read_marker(temp_dir.path()).unwrap();
        assert_eq!(loaded.version, v("6.1"));
    }

    #[test]
    fn test_marker_json_format() {
        let temp_dir = TempDir::new().unwrap();
        write_marker(temp_dir.path(), &v("6.1")).unwrap();

        let content = fs::read_to_string(marker_path(temp_dir.path())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value, serde_json::json!({ "version": "6.1" }));
    }

    #[test]
    fn test_write_replaces_existing_and_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        write_marker(temp_dir.path(), &v("6.0")).unwrap();
        write_marker(temp_dir.path(), &v("6.1")).unwrap();

        assert_eq!(read_marker(temp_dir.path()).unwrap().version, v("6.1"));
        let entries: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from(MARKER_FILE_NAME)]);
    }

    #[test]
    fn test_missing_marker() {
        let temp_dir = TempDir::new().unwrap();
        assert!(read_marker(temp_dir.path()).is_none());
        assert!(read_marker(&temp_dir.path().join("does-not-exist")).is_none());
    }

    #[test]
    fn test_corrupted_marker_is_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = marker_path(temp_dir.path());

        fs::write(&path, "not valid json {{{{").unwrap();
        assert!(read_marker(temp_dir.path()).is_none());

        fs::write(&path, r#"{ "version": "banana" }"#).unwrap();
        assert!(read_marker(temp_dir.path()).is_none());
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone");
        assert!(matches!(
            write_marker(&missing, &v("6.1")),
            Err(UpdateError::Io { .. })
        ));
    }

    #[test]
    fn test_update_required_policy() {
        // No marker.
        assert!(update_required(None, &v("6.1"), true));
        assert!(update_required(None, &v("6.1"), false));

        // Newer remote.
        assert!(update_required(Some(&marker("6.0")), &v("6.1"), true));
        assert!(update_required(Some(&marker("6.9")), &v("6.10"), true));

        // Same or older remote with binaries present.
        assert!(!update_required(Some(&marker("6.1")), &v("6.1"), true));
        assert!(!update_required(Some(&marker("6.1.0")), &v("6.1"), true));
        assert!(!update_required(Some(&marker("6.10")), &v("6.9"), true));

        // Binaries missing.
        assert!(update_required(Some(&marker("6.1")), &v("6.1"), false));
        assert!(update_required(Some(&marker("7.0")), &v("6.1"), false));
    }
}
