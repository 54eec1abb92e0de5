//! Scripted transport and archive builders for unit tests.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;

use crate::error::TransportError;
use crate::http::{HttpClient, HttpResponse};

pub const INDEX_URL: &str = "https://index.test/api/v1/version/latest";

/// How a scripted request fails.
#[derive(Debug, Clone, Copy)]
pub enum FailureMode {
    /// The connection is refused before any response.
    Connect,
    /// The server answers with the given status.
    Status(u16),
    /// The body stream breaks after the first half of the content.
    MidStream,
}

struct Route {
    body: Vec<u8>,
    failures_left: u32,
    mode: FailureMode,
}

/// `HttpClient` answering from a per-URL script. Unknown URLs fail to connect.
#[derive(Default)]
pub struct FakeHttpClient {
    routes: Mutex<HashMap<String, Route>>,
    hits: Mutex<HashMap<String, u32>>,
    claimed_length: Mutex<Option<u64>>,
}

impl FakeHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` on every request to `url`.
    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.serve_failing(url, body, 0, FailureMode::Connect);
    }

    /// Fails the first `failures` requests with `mode`, then serves `body`.
    pub fn serve_failing(&self, url: &str, body: Vec<u8>, failures: u32, mode: FailureMode) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route {
                body,
                failures_left: failures,
                mode,
            },
        );
    }

    /// Reports `length` as Content-Length on every response, whatever the body.
    pub fn claim_content_length(&self, length: u64) {
        *self.claimed_length.lock().unwrap() = Some(length);
    }

    /// Number of requests made to `url`.
    pub fn hits(&self, url: &str) -> u32 {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Total number of requests made.
    pub fn total_hits(&self) -> u32 {
        self.hits.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        let (body, failure) = {
            let mut routes = self.routes.lock().unwrap();
            let Some(route) = routes.get_mut(url) else {
                return Err(TransportError::Connect {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                });
            };
            let failure = if route.failures_left > 0 {
                route.failures_left -= 1;
                Some(route.mode)
            } else {
                None
            };
            (route.body.clone(), failure)
        };

        let content_length = self
            .claimed_length
            .lock()
            .unwrap()
            .or(Some(body.len() as u64));
        match failure {
            None => {
                let chunks: Vec<Result<Vec<u8>, TransportError>> =
                    body.chunks(4).map(|c| Ok(c.to_vec())).collect();
                Ok(HttpResponse {
                    content_length,
                    body: futures::stream::iter(chunks).boxed(),
                })
            }
            Some(FailureMode::Connect) => Err(TransportError::Connect {
                url: url.to_string(),
                message: "connection reset".to_string(),
            }),
            Some(FailureMode::Status(status)) => Err(TransportError::Status {
                url: url.to_string(),
                status,
            }),
            Some(FailureMode::MidStream) => {
                let half = body[..body.len() / 2].to_vec();
                let chunks = vec![
                    Ok(half),
                    Err(TransportError::Body {
                        url: url.to_string(),
                        message: "connection reset".to_string(),
                    }),
                ];
                Ok(HttpResponse {
                    content_length,
                    body: futures::stream::iter(chunks).boxed(),
                })
            }
        }
    }
}

/// Builds an in-memory zip archive from `(path, content)` pairs.
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);

    for (path, content) in files {
        zip.start_file(*path, options).unwrap();
        zip.write_all(content).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// Builds an in-memory tar.gz archive from `(path, content)` pairs.
pub fn tar_gz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}
