//! Installs or updates FFmpeg and FFprobe.
//!
//! Usage: `ffdl [TARGET_DIR]`. Without a directory the binaries go to
//! `{data-local dir}/ffdl/bin`.

use anyhow::{Context, Result};
use ffdl_core::{FFmpegUpdater, ProgressInfo, ProgressSink, ToolKind, UpdateOutcome, UpdaterConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ffdl=debug".parse()?)
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting ffdl v{}", ffdl_core::VERSION);

    let config = match UpdaterConfig::default_path() {
        Some(path) => UpdaterConfig::load_from(&path)?,
        None => UpdaterConfig::default(),
    }
    .with_env_overrides();

    let target_dir = match std::env::args_os().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_local_dir()
            .context("Could not determine the local data directory")?
            .join("ffdl")
            .join("bin"),
    };

    let updater = FFmpegUpdater::new(config)?;
    tracing::info!(platform = %updater.platform(), "Target directory: {}", target_dir.display());

    let progress: ProgressSink = Arc::new(log_progress);
    let outcome = updater
        .ensure_latest(&target_dir, Some(progress), None)
        .await
        .with_context(|| format!("Failed to update FFmpeg in {}", target_dir.display()))?;

    match outcome {
        UpdateOutcome::UpToDate { version } => {
            tracing::info!("FFmpeg {} is already up to date", version);
        }
        UpdateOutcome::Installed { version, previous } => match previous {
            Some(previous) => tracing::info!("Updated FFmpeg {} -> {}", previous, version),
            None => tracing::info!("Installed FFmpeg {}", version),
        },
    }

    for tool in ToolKind::all() {
        if let Some(path) = updater.executable_path(&target_dir, *tool) {
            println!("{}: {}", tool, path.display());
        }
    }

    Ok(())
}

fn log_progress(progress: ProgressInfo) {
    match progress.percent {
        Some(percent) => tracing::debug!(
            "{} download: {:.1}% ({} bytes)",
            progress.tool,
            percent,
            progress.bytes_transferred
        ),
        None => tracing::debug!(
            "{} download: {} bytes",
            progress.tool,
            progress.bytes_transferred
        ),
    }
}
