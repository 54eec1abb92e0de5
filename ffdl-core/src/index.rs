//! Client for the remote version index.
//!
//! The index answers a single GET with the latest version and, per platform
//! key, the archive links for both tools:
//!
//! ```json
//! {
//!   "version": "6.1",
//!   "bin": {
//!     "linux-64": { "ffmpeg": "https://...", "ffprobe": "https://..." }
//!   }
//! }
//! ```
//!
//! Extra fields (such as `permalink`) are ignored. There is no retry here;
//! a failed index fetch aborts the update.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::UpdateError;
use crate::http::{validate_url, HttpClient};
use crate::version::ToolVersion;

/// Archive links for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolLinks {
    pub ffmpeg: String,
    pub ffprobe: String,
}

/// Latest version and its per-platform download links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub version: ToolVersion,
    #[serde(default)]
    pub bin: BTreeMap<String, ToolLinks>,
}

impl VersionDescriptor {
    /// Parses a descriptor from a JSON body.
    pub fn from_json(body: &[u8], origin: &str) -> Result<Self, UpdateError> {
        serde_json::from_slice(body).map_err(|source| UpdateError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Platform keys with published links, in sorted order.
    pub fn platform_keys(&self) -> Vec<String> {
        self.bin.keys().cloned().collect()
    }
}

/// Fetches the latest [`VersionDescriptor`].
pub struct IndexClient {
    client: Arc<dyn HttpClient>,
    index_url: String,
}

impl IndexClient {
    pub fn new(client: Arc<dyn HttpClient>, index_url: impl Into<String>) -> Self {
        Self {
            client,
            index_url: index_url.into(),
        }
    }

    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    /// Downloads and parses the descriptor.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::InvalidUrl`] if the configured index URL is not http(s).
    /// - [`UpdateError::Network`] if the request fails or returns a non-success status.
    /// - [`UpdateError::Parse`] if the body is not a valid descriptor.
    pub async fn fetch_latest(&self) -> Result<VersionDescriptor, UpdateError> {
        validate_url(&self.index_url)?;
        debug!("Fetching version index from {}", self.index_url);

        let network = |source| UpdateError::Network {
            url: self.index_url.clone(),
            source,
        };
        let response = self.client.get(&self.index_url).await.map_err(network)?;
        let body = response.collect().await.map_err(network)?;

        let descriptor = VersionDescriptor::from_json(&body, &self.index_url)?;
        info!(
            "Latest published version is {} ({} platforms)",
            descriptor.version,
            descriptor.bin.len()
        );
        Ok(descriptor)
    }
}
