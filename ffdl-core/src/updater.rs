//! Update orchestration.
//!
//! `FFmpegUpdater` is the main entry point. It coordinates the index client,
//! the marker store, the fetcher and the extractor:
//!
//! 1. fetch the latest descriptor (no fallback if this fails)
//! 2. compare it with the installed marker and the binaries on disk
//! 3. resolve links for the current platform
//! 4. download both archives concurrently and wait for both
//! 5. extract both into a staging directory, then move the files into place
//! 6. remove the downloaded archives, on success and on failure
//! 7. write the new marker
//!
//! A failure before step 5 completes leaves the target directory exactly as
//! it was. Concurrent runs against the same directory are not coordinated.

use anyhow::Context;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::UpdaterConfig;
use crate::error::UpdateError;
use crate::extractor::{extract_archive, ArchiveFormat};
use crate::fetcher::{discard, RetryingFetcher};
use crate::http::{HttpClient, ReqwestClient};
use crate::index::IndexClient;
use crate::links::get_links;
use crate::marker::{read_marker, update_required, write_marker};
use crate::platform::{resolve, HostFacts, PlatformKey};
use crate::types::{ProgressSink, ToolKind, UpdateOutcome};
use crate::version::ToolVersion;

/// Prefix of the private staging directory created inside the target directory.
const STAGING_PREFIX: &str = ".ffdl-staging-";

/// Keeps FFmpeg and FFprobe in a directory up to date.
pub struct FFmpegUpdater {
    config: UpdaterConfig,
    host: HostFacts,
    index: IndexClient,
    fetcher: RetryingFetcher,
}

impl FFmpegUpdater {
    /// Creates an updater that talks HTTP through `reqwest`.
    pub fn new(config: UpdaterConfig) -> anyhow::Result<Self> {
        let client = ReqwestClient::new(&config.user_agent, config.request_timeout())
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Creates an updater on top of a custom transport.
    pub fn with_client(config: UpdaterConfig, client: Arc<dyn HttpClient>) -> Self {
        let index = IndexClient::new(client.clone(), config.index_url.clone());
        let fetcher = RetryingFetcher::new(client, config.download_dir(), config.retry_delay());

        Self {
            config,
            host: HostFacts::current(),
            index,
            fetcher,
        }
    }

    /// Replaces the detected host facts.
    pub fn with_host(mut self, host: HostFacts) -> Self {
        self.host = host;
        self
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn host(&self) -> &HostFacts {
        &self.host
    }

    /// Platform key used to pick links from the index.
    pub fn platform(&self) -> PlatformKey {
        resolve(&self.host)
    }

    // ========================================================================
    // Installed State
    // ========================================================================

    /// Version recorded in `dir`, if any.
    pub fn installed_version(&self, dir: &Path) -> Option<ToolVersion> {
        read_marker(dir).map(|marker| marker.version)
    }

    /// Path to an installed executable, if it exists.
    pub fn executable_path(&self, dir: &Path, tool: ToolKind) -> Option<PathBuf> {
        let path = tool.executable_path(dir, &self.host);
        path.is_file().then_some(path)
    }

    /// Returns true if both executables exist in `dir`.
    pub fn binaries_present(&self, dir: &Path) -> bool {
        ToolKind::all()
            .iter()
            .all(|tool| self.executable_path(dir, *tool).is_some())
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Makes sure `target_dir` holds the latest published binaries.
    ///
    /// `max_retries` overrides the configured number of extra attempts per file.
    /// Progress for both downloads goes to `progress`, interleaved.
    ///
    /// # Errors
    ///
    /// Any error is fatal for this call. The marker in `target_dir` is only
    /// written after both tools were installed.
    pub async fn ensure_latest(
        &self,
        target_dir: &Path,
        progress: Option<ProgressSink>,
        max_retries: Option<u32>,
    ) -> Result<UpdateOutcome, UpdateError> {
        let descriptor = self.index.fetch_latest().await?;

        let marker = read_marker(target_dir);
        let binaries_present = self.binaries_present(target_dir);
        let required = update_required(marker.as_ref(), &descriptor.version, binaries_present);

        match (&marker, required) {
            (Some(current), false) => {
                info!(
                    "FFmpeg {} in {} is up to date (latest: {})",
                    current.version,
                    target_dir.display(),
                    descriptor.version
                );
                return Ok(UpdateOutcome::UpToDate {
                    version: current.version.clone(),
                });
            }
            (Some(current), true) if binaries_present => info!(
                "Updating FFmpeg {} -> {} in {}",
                current.version,
                descriptor.version,
                target_dir.display()
            ),
            (Some(current), true) => warn!(
                "Marker in {} names {} but binaries are missing, reinstalling {}",
                target_dir.display(),
                current.version,
                descriptor.version
            ),
            (None, _) => info!(
                "Installing FFmpeg {} into {}",
                descriptor.version,
                target_dir.display()
            ),
        }

        let platform = self.platform();
        let links = get_links(&descriptor, &platform)?;
        debug!("Resolved links for {}: {:?}", platform, links);

        let retries = max_retries.unwrap_or(self.config.max_retries);
        let (ffmpeg, ffprobe) = tokio::join!(
            self.fetcher.fetch(
                ToolKind::FFmpeg,
                links.get(ToolKind::FFmpeg),
                progress.as_ref(),
                retries
            ),
            self.fetcher.fetch(
                ToolKind::FFprobe,
                links.get(ToolKind::FFprobe),
                progress.as_ref(),
                retries
            ),
        );

        let downloaded: Vec<PathBuf> = [&ffmpeg, &ffprobe]
            .into_iter()
            .filter_map(|result| result.as_ref().ok().cloned())
            .collect();

        let installed = match (ffmpeg, ffprobe) {
            (Ok(ffmpeg), Ok(ffprobe)) => self.install(
                &[(ToolKind::FFmpeg, ffmpeg), (ToolKind::FFprobe, ffprobe)],
                target_dir,
            ),
            (Err(e), other) => {
                if let Err(other) = other {
                    warn!("FFprobe download failed as well: {}", other);
                }
                Err(e)
            }
            (Ok(_), Err(e)) => Err(e),
        };

        for archive in &downloaded {
            discard(archive).await;
        }
        installed?;

        write_marker(target_dir, &descriptor.version)?;
        info!(
            "FFmpeg {} installed in {}",
            descriptor.version,
            target_dir.display()
        );

        Ok(UpdateOutcome::Installed {
            version: descriptor.version,
            previous: marker.map(|m| m.version),
        })
    }

    /// Extracts all archives into a staging directory, then moves the files
    /// into `target_dir`. Nothing in `target_dir` changes unless every archive
    /// extracted cleanly; a target directory created here is removed again on
    /// failure.
    fn install(&self, archives: &[(ToolKind, PathBuf)], target_dir: &Path) -> Result<(), UpdateError> {
        let created = !target_dir.exists();
        fs::create_dir_all(target_dir)
            .map_err(|e| UpdateError::io("failed to create target directory", target_dir, e))?;
        sweep_stale_staging(target_dir);

        let staging = target_dir.join(format!("{}{}", STAGING_PREFIX, uuid::Uuid::new_v4()));

        let result = self
            .stage(archives, &staging)
            .and_then(|staged| commit(&staged, target_dir));

        if staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                warn!(
                    "Failed to remove staging directory {}: {}",
                    staging.display(),
                    e
                );
            }
        }

        if result.is_err() && created {
            if let Err(e) = fs::remove_dir(target_dir) {
                warn!(
                    "Failed to remove target directory {}: {}",
                    target_dir.display(),
                    e
                );
            }
        }
        result
    }

    fn stage(
        &self,
        archives: &[(ToolKind, PathBuf)],
        staging: &Path,
    ) -> Result<BTreeSet<PathBuf>, UpdateError> {
        let mut staged = BTreeSet::new();

        for (tool, archive) in archives {
            let extraction_error = |source: anyhow::Error| UpdateError::Extraction {
                archive: archive.clone(),
                source: source.into(),
            };

            let files = extract_archive(archive, staging, ArchiveFormat::detect(archive))
                .map_err(extraction_error)?;

            let executable = tool.executable_path(staging, &self.host);
            if !files.contains(&executable) {
                return Err(extraction_error(anyhow::anyhow!(
                    "archive does not contain {}",
                    tool.executable_name(&self.host)
                )));
            }

            staged.extend(files);
        }

        Ok(staged)
    }
}

/// Removes staging directories left behind by an interrupted install.
fn sweep_stale_staging(target_dir: &Path) {
    let Ok(entries) = fs::read_dir(target_dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_staging = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(STAGING_PREFIX));
        if !is_staging || !path.is_dir() {
            continue;
        }

        match fs::remove_dir_all(&path) {
            Ok(()) => debug!("Removed stale staging directory {}", path.display()),
            Err(e) => warn!(
                "Failed to remove stale staging directory {}: {}",
                path.display(),
                e
            ),
        }
    }
}

/// Moves staged files into `target_dir`, replacing existing ones.
fn commit(staged: &BTreeSet<PathBuf>, target_dir: &Path) -> Result<(), UpdateError> {
    for file in staged {
        let Some(name) = file.file_name() else {
            continue;
        };
        let dest = target_dir.join(name);
        fs::rename(file, &dest)
            .map_err(|e| UpdateError::io("failed to move installed file into place", &dest, e))?;
        debug!("Installed {}", dest.display());
    }
    Ok(())
}
