//! Error types for manifest loading and per-item resolution

use std::time::Duration;

/// Transport failure reported by a [`crate::source::MediaSource`]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("invalid url for {path}: {reason}")]
    InvalidUrl { path: String, reason: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Pass-level failure. Either variant ends the pass and replaces the grid with the error message.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("manifest unavailable: {0}")]
    ManifestUnavailable(#[source] SourceError),

    #[error("manifest malformed: {0}")]
    ManifestMalformed(String),
}

impl LoadError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::ManifestMalformed(msg.into())
    }
}

/// Why a single item was dropped. Never surfaces past the resolver.
#[derive(thiserror::Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unsupported media type")]
    Unsupported,
}

impl ItemError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
