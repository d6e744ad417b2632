//! Manifest entry classification by filename suffix

use crate::constants::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::types::{MediaDescriptor, MediaKind};
use crate::utils::join_media_path;
use serde_json::Value;

/// Case-insensitive suffix match. Image suffixes are checked before video ones.
pub fn media_kind(name: &str) -> MediaKind {
    let lower = name.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        MediaKind::Image
    } else if VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        MediaKind::Video
    } else {
        MediaKind::Unsupported
    }
}

pub fn classify_name(name: &str, media_dir: &str) -> Option<MediaDescriptor> {
    let kind = media_kind(name);
    if kind == MediaKind::Unsupported {
        return None;
    }
    // A bare extension like ".png" names no file
    let lower = name.to_ascii_lowercase();
    if IMAGE_EXTENSIONS
        .iter()
        .chain(VIDEO_EXTENSIONS)
        .any(|ext| lower == *ext)
    {
        return None;
    }
    Some(MediaDescriptor {
        name: name.to_string(),
        kind,
        path: join_media_path(media_dir, name),
    })
}

/// `None` for non-string entries and unsupported suffixes
pub fn classify(entry: &Value, media_dir: &str) -> Option<MediaDescriptor> {
    entry.as_str().and_then(|name| classify_name(name, media_dir))
}
