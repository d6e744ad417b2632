//! Common types and data structures

use crate::constants::{LANDSCAPE_THRESHOLD, PORTRAIT_THRESHOLD};
use serde::{Deserialize, Serialize};

/// Media kind, decided purely by filename suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Unsupported,
}

/// A classified manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub name: String,
    pub kind: MediaKind,
    /// Source-relative path, e.g. `portfolio/a.jpg`
    pub path: String,
}

impl MediaDescriptor {
    /// Decoder format implied by the suffix. `None` for anything that is not an image.
    pub fn image_format(&self) -> Option<image::ImageFormat> {
        if self.kind != MediaKind::Image {
            return None;
        }
        let lower = self.name.to_ascii_lowercase();
        if lower.ends_with(".png") {
            Some(image::ImageFormat::Png)
        } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            Some(image::ImageFormat::Jpeg)
        } else {
            None
        }
    }
}

/// Orientation bucket used by the page stylesheet to size grid cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    /// Both thresholds map to `Square`.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > LANDSCAPE_THRESHOLD {
            Orientation::Landscape
        } else if ratio < PORTRAIT_THRESHOLD {
            Orientation::Portrait
        } else {
            Orientation::Square
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Orientation::Landscape => "orientation-landscape",
            Orientation::Portrait => "orientation-portrait",
            Orientation::Square => "orientation-square",
        }
    }
}

/// Playback attributes for video tiles: silent, looping, inline preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackHints {
    pub muted: bool,
    pub looped: bool,
    pub inline: bool,
    pub autoplay: bool,
}

impl PlaybackHints {
    pub const PREVIEW: PlaybackHints = PlaybackHints {
        muted: true,
        looped: true,
        inline: true,
        autoplay: true,
    };
}

/// The visual node handed to a grid container
#[derive(Debug, Clone, PartialEq)]
pub struct MediaTile {
    pub name: String,
    pub src: String,
    pub kind: MediaKind,
    pub aspect_ratio: f64,
    /// Assigned by the renderer right before the tile is appended
    pub orientation: Option<Orientation>,
    pub playback: Option<PlaybackHints>,
}

impl MediaTile {
    /// Value for the `class` attribute: `grid-item` plus the orientation tag, if any
    pub fn class_attr(&self) -> String {
        match self.orientation {
            Some(orientation) => format!("grid-item {}", orientation.css_class()),
            None => "grid-item".to_string(),
        }
    }
}

/// A resolved item with known intrinsic aspect ratio
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedItem {
    pub tile: MediaTile,
    pub aspect_ratio: f64,
    pub kind: MediaKind,
}

impl LoadedItem {
    pub fn new(descriptor: &MediaDescriptor, aspect_ratio: f64) -> Self {
        let playback = (descriptor.kind == MediaKind::Video).then_some(PlaybackHints::PREVIEW);
        Self {
            tile: MediaTile {
                name: descriptor.name.clone(),
                src: descriptor.path.clone(),
                kind: descriptor.kind,
                aspect_ratio,
                orientation: None,
                playback,
            },
            aspect_ratio,
            kind: descriptor.kind,
        }
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::from_ratio(self.aspect_ratio)
    }
}

/// How resolved items are ordered and batched into the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Fixed-size chunks resolved together, appended in manifest order
    #[default]
    Chunked,
    /// Everything resolved first, then appended widest first
    SortByRatio,
    /// Each item appended as soon as it settles
    Stream,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, kind: MediaKind) -> MediaDescriptor {
        MediaDescriptor {
            name: name.to_string(),
            kind,
            path: format!("portfolio/{name}"),
        }
    }

    #[test]
    fn orientation_thresholds_are_exclusive() {
        assert_eq!(Orientation::from_ratio(2.0), Orientation::Landscape);
        assert_eq!(Orientation::from_ratio(1.21), Orientation::Landscape);
        assert_eq!(Orientation::from_ratio(1.2), Orientation::Square);
        assert_eq!(Orientation::from_ratio(1.0), Orientation::Square);
        assert_eq!(Orientation::from_ratio(0.8), Orientation::Square);
        assert_eq!(Orientation::from_ratio(0.79), Orientation::Portrait);
        assert_eq!(Orientation::from_ratio(0.5), Orientation::Portrait);
    }

    #[test]
    fn image_format_follows_suffix() {
        assert_eq!(
            descriptor("a.PNG", MediaKind::Image).image_format(),
            Some(image::ImageFormat::Png)
        );
        assert_eq!(
            descriptor("b.JpEg", MediaKind::Image).image_format(),
            Some(image::ImageFormat::Jpeg)
        );
        assert_eq!(descriptor("c.mp4", MediaKind::Video).image_format(), None);
    }

    #[test]
    fn videos_get_preview_playback() {
        let item = LoadedItem::new(&descriptor("clip.mp4", MediaKind::Video), 1.77);
        assert_eq!(item.tile.playback, Some(PlaybackHints::PREVIEW));
        assert_eq!(item.tile.src, "portfolio/clip.mp4");
        assert_eq!(item.orientation(), Orientation::Landscape);

        let still = LoadedItem::new(&descriptor("still.jpg", MediaKind::Image), 1.0);
        assert_eq!(still.tile.playback, None);
        assert_eq!(still.tile.class_attr(), "grid-item");
    }
}
