//! Archive extraction for downloaded tool packages.
//!
//! Archives are unpacked flat: every regular file lands directly in the
//! destination directory under its own file name, whatever folder it sat in
//! inside the archive. Existing files with the same name are overwritten.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ============================================================================
// Archive Format
// ============================================================================

/// Archive format of a downloaded tool package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// ZIP archive (.zip)
    Zip,
    /// Gzip-compressed tar archive (.tar.gz, .tgz)
    TarGz,
    /// XZ-compressed tar archive (.tar.xz)
    TarXz,
}

impl ArchiveFormat {
    /// Infers the archive format from a URL or filename.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.xz") {
            Some(Self::TarXz)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Like [`ArchiveFormat::from_name`], falling back to zip, the format the
    /// version index publishes.
    pub fn detect(path: &Path) -> Self {
        Self::from_name(&path.to_string_lossy()).unwrap_or(Self::Zip)
    }
}

// ============================================================================
// Archive Extraction
// ============================================================================

/// Extracts an archive into `dest_dir` and returns the written file paths.
///
/// # Errors
///
/// Returns an error if the archive is corrupt or `dest_dir` is not writable.
pub fn extract_archive(
    archive_path: &Path,
    dest_dir: &Path,
    format: ArchiveFormat,
) -> Result<Vec<PathBuf>> {
    info!(
        "Extracting {:?} archive {} to {}",
        format,
        archive_path.display(),
        dest_dir.display()
    );

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let written = match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir)?,
        ArchiveFormat::TarGz => {
            let reader = open(archive_path)?;
            extract_tar(flate2::read::GzDecoder::new(reader), dest_dir)?
        }
        ArchiveFormat::TarXz => {
            let reader = open(archive_path)?;
            extract_tar(xz2::read::XzDecoder::new(reader), dest_dir)?
        }
    };

    if written.is_empty() {
        anyhow::bail!("Archive {} contains no files", archive_path.display());
    }
    Ok(written)
}

fn open(archive_path: &Path) -> Result<BufReader<File>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    Ok(BufReader::new(file))
}

/// Flattened destination for an archive entry, or `None` to skip it.
fn flat_target(entry_path: &Path, dest_dir: &Path) -> Option<PathBuf> {
    // macOS resource forks shipped alongside the real binaries.
    if entry_path
        .components()
        .any(|c| c.as_os_str() == "__MACOSX")
    {
        return None;
    }

    let name = entry_path.file_name()?;
    if name.to_string_lossy().starts_with("._") {
        return None;
    }
    Some(dest_dir.join(name))
}

fn write_entry<R: Read>(reader: &mut R, dest_path: &Path) -> Result<()> {
    let mut outfile = File::create(dest_path)
        .with_context(|| format!("Failed to create: {}", dest_path.display()))?;
    io::copy(reader, &mut outfile)
        .with_context(|| format!("Failed to write: {}", dest_path.display()))?;
    outfile.flush()?;
    make_executable(dest_path)
}

// ============================================================================
// ZIP Extraction
// ============================================================================

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open zip: {}", archive_path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip: {}", archive_path.display()))?;

    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Corrupt zip entry #{} in {}", i, archive_path.display()))?;

        if entry.is_dir() {
            continue;
        }

        let is_symlink = entry
            .unix_mode()
            .is_some_and(|mode| mode & 0o170000 == 0o120000);
        if is_symlink {
            warn!("Skipping symlink {} in zip", entry.name());
            continue;
        }

        let Some(entry_path) = entry.enclosed_name() else {
            warn!("Skipping unsafe path {} in zip", entry.name());
            continue;
        };
        let Some(dest_path) = flat_target(&entry_path, dest_dir) else {
            debug!("Skipping zip entry {}", entry_path.display());
            continue;
        };

        write_entry(&mut entry, &dest_path)?;
        written.push(dest_path);
    }

    debug!("ZIP extraction complete: {} file(s)", written.len());
    Ok(written)
}

// ============================================================================
// TAR Extraction
// ============================================================================

fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = tar::Archive::new(reader);
    let mut written = Vec::new();

    for entry_result in archive.entries().context("Failed to read tar entries")? {
        let mut entry = entry_result.context("Corrupt tar entry")?;
        let entry_type = entry.header().entry_type();

        if entry_type.is_symlink() || entry_type.is_hard_link() {
            warn!("Skipping symlink/hardlink in tar archive");
            continue;
        }
        if !entry_type.is_file() {
            continue;
        }

        let entry_path = entry.path().context("Invalid tar entry path")?.into_owned();
        let Some(dest_path) = flat_target(&entry_path, dest_dir) else {
            debug!("Skipping tar entry {}", entry_path.display());
            continue;
        };

        write_entry(&mut entry, &dest_path)?;
        written.push(dest_path);
    }

    debug!("TAR extraction complete: {} file(s)", written.len());
    Ok(written)
}

// ============================================================================
// Unix Permissions
// ============================================================================

/// Sets executable permission on a file (Unix only).
///
/// On Windows, this is a no-op.
#[allow(unused_variables)]
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to get metadata for {}", path.display()))?;

        let mut permissions = metadata.permissions();
        permissions.set_mode(permissions.mode() | 0o755);

        fs::set_permissions(path, permissions).with_context(|| {
            format!("Failed to set executable permission on {}", path.display())
        })?;
    }

    Ok(())
}
