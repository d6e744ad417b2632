//! User settings stored as settings.json in the app data directory

use crate::constants::*;
use crate::types::OrderingPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Source
    pub base_url: String,
    pub manifest_path: String,
    pub media_dir: String,

    // Loading
    pub ordering: OrderingPolicy,
    pub chunk_size: usize,
    pub item_timeout_secs: Option<u64>,
    pub read_limit_bytes: usize,

    // Output
    pub show_summary: bool,
    pub output_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            manifest_path: MANIFEST_PATH.to_string(),
            media_dir: MEDIA_DIR.to_string(),
            ordering: OrderingPolicy::Chunked,
            chunk_size: DEFAULT_CHUNK_SIZE,
            item_timeout_secs: Some(DEFAULT_ITEM_TIMEOUT_SECS),
            read_limit_bytes: DEFAULT_READ_LIMIT_BYTES,
            show_summary: false,
            output_path: None,
        }
    }
}

impl Settings {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("settings.json");
        match std::fs::read_to_string(&path) {
            Ok(s) => Self::from_json(&s).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to parse settings, using defaults");
                Self::default()
            }),
            Err(_) => {
                debug!("No settings file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        let settings = serde_json::from_str(s)?;
        debug!("Settings loaded");
        Ok(settings)
    }

    pub fn save(&self, data_dir: &Path) {
        let path = data_dir.join("settings.json");
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!(error = %e, "Failed to save settings");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize settings"),
        }
    }

    /// Chunk size with 0 treated as 1
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_secs.map(Duration::from_secs)
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        self.output_path.as_ref().map(PathBuf::from)
    }
}
