//! HTTP transport used by the index client and the fetcher.
//!
//! Both depend on the [`HttpClient`] trait rather than on `reqwest` directly,
//! so the whole update workflow can run against a scripted transport.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{TransportError, UpdateError};

// ============================================================================
// URL Validation
// ============================================================================

/// Schemes accepted for the index and for binary links.
const ALLOWED_SCHEMES: &[&str] = &["https", "http"];

/// Checks that a URL is absolute, uses http(s) and has a host.
pub fn validate_url(url_str: &str) -> Result<(), UpdateError> {
    let invalid = |reason: String| UpdateError::InvalidUrl {
        url: url_str.to_string(),
        reason,
    };

    let url = Url::parse(url_str).map_err(|e| invalid(e.to_string()))?;

    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(())
}

// ============================================================================
// Transport
// ============================================================================

/// Upper bound on the buffer reserved up front from Content-Length.
const MAX_PREALLOC: u64 = 64 * 1024;

/// Successful response whose body has not been read yet.
pub struct HttpResponse {
    /// Value of the Content-Length header, if present.
    pub content_length: Option<u64>,
    /// Body chunks in arrival order.
    pub body: BoxStream<'static, Result<Vec<u8>, TransportError>>,
}

impl HttpResponse {
    /// Reads the full body into memory.
    ///
    /// Content-Length only sizes the initial buffer, capped at 64 KiB.
    pub async fn collect(mut self) -> Result<Vec<u8>, TransportError> {
        let reserve = self.content_length.unwrap_or(0).min(MAX_PREALLOC);
        let mut buf = Vec::with_capacity(reserve as usize);
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf)
    }
}

/// Issues GET requests.
///
/// Implementations must map non-success statuses to [`TransportError::Status`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client with the given user agent and optional per-request timeout.
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Connect {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_length = response.content_length();
        debug!("GET {} -> {} (Content-Length: {:?})", url, status, content_length);

        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| TransportError::Body {
                        url: owned_url.clone(),
                        message: e.to_string(),
                    })
            })
            .boxed();

        Ok(HttpResponse {
            content_length,
            body,
        })
    }
}
