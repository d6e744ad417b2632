//! Application constants and configuration

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";
pub const MANIFEST_PATH: &str = "portfolio/manifest.json";
pub const MEDIA_DIR: &str = "portfolio";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_DIR_NAME: &str = "Portfolio Grid";

/// Suffixes are matched against the lowercased filename, images first.
pub const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg"];
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4"];

/// Ratios strictly above this are landscape
pub const LANDSCAPE_THRESHOLD: f64 = 1.2;
/// Ratios strictly below this are portrait
pub const PORTRAIT_THRESHOLD: f64 = 0.8;
/// Used for videos that carry no usable video track dimensions
pub const VIDEO_FALLBACK_RATIO: f64 = 1.77;

pub const DEFAULT_CHUNK_SIZE: usize = 5;
pub const DEFAULT_ITEM_TIMEOUT_SECS: u64 = 20;
/// Bytes read from the front of a media file to find its dimensions
pub const DEFAULT_READ_LIMIT_BYTES: usize = 8 * 1024 * 1024;

pub const LOAD_ERROR_MESSAGE: &str = "Could not load portfolio.";
