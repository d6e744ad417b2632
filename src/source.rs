//! Where manifest and media bytes come from

use crate::error::SourceError;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Leading bytes of a resource, at most the requested limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPrefix {
    pub bytes: Vec<u8>,
    /// False when the resource continued past the limit
    pub complete: bool,
}

impl MediaPrefix {
    /// Cut an already buffered body down to `limit` bytes
    pub fn truncate(mut bytes: Vec<u8>, limit: usize) -> Self {
        let complete = bytes.len() <= limit;
        bytes.truncate(limit);
        Self { bytes, complete }
    }
}

/// Reads source-relative paths such as `portfolio/manifest.json`.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// `fresh` asks the source to bypass intermediary caches.
    async fn fetch(&self, path: &str, fresh: bool) -> Result<Vec<u8>, SourceError>;

    /// Read no more than `limit` bytes from the start of `path`.
    ///
    /// The default buffers the whole body first; sources that can stream
    /// should override it.
    async fn fetch_prefix(&self, path: &str, limit: usize) -> Result<MediaPrefix, SourceError> {
        let bytes = self.fetch(path, false).await?;
        Ok(MediaPrefix::truncate(bytes, limit))
    }
}

/// Fetches over HTTP relative to a base URL
pub struct HttpSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, SourceError> {
        // Without the trailing slash `join` would replace the last path segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized).map_err(|e| SourceError::InvalidUrl {
            path: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { client, base })
    }

    pub fn url_for(&self, path: &str) -> Result<Url, SourceError> {
        self.base.join(path).map_err(|e| SourceError::InvalidUrl {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    async fn send(&self, path: &str, fresh: bool) -> Result<reqwest::Response, SourceError> {
        let url = self.url_for(path)?;
        let mut request = self.client.get(url.clone());
        if fresh {
            request = request
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "Request rejected");
            return Err(SourceError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl MediaSource for HttpSource {
    async fn fetch(&self, path: &str, fresh: bool) -> Result<Vec<u8>, SourceError> {
        let response = self.send(path, fresh).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Streams the body and drops the connection once `limit` bytes are in.
    async fn fetch_prefix(&self, path: &str, limit: usize) -> Result<MediaPrefix, SourceError> {
        let response = self.send(path, false).await?;
        let capacity = response
            .content_length()
            .map_or(limit, |len| limit.min(len as usize));
        let mut bytes = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SourceError::Request(e.to_string()))?;
            let room = limit - bytes.len();
            if chunk.len() > room {
                bytes.extend_from_slice(&chunk[..room]);
                debug!(path, limit, "Body cut at read limit");
                return Ok(MediaPrefix {
                    bytes,
                    complete: false,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(MediaPrefix {
            bytes,
            complete: true,
        })
    }
}

/// Serves preloaded bytes by path and records every request
#[derive(Default)]
pub struct MemorySource {
    entries: Mutex<HashMap<String, Result<Vec<u8>, u16>>>,
    requests: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.entries.lock().insert(path.into(), Ok(bytes));
    }

    /// Answer `path` with a non-success status
    pub fn insert_status(&self, path: impl Into<String>, status: u16) {
        self.entries.lock().insert(path.into(), Err(status));
    }

    /// Paths requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl MediaSource for MemorySource {
    async fn fetch(&self, path: &str, _fresh: bool) -> Result<Vec<u8>, SourceError> {
        self.requests.lock().push(path.to_string());
        match self.entries.lock().get(path) {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(status)) => Err(SourceError::Status(*status)),
            None => Err(SourceError::NotFound(path.to_string())),
        }
    }
}
