//! HTML grid container
//!
//! Collects tiles the way the page's `.grid-container` element would and
//! renders them as markup for the page stylesheet: every tile is a
//! `grid-item` with one `orientation-*` class.

use crate::loader::GridContainer;
use crate::types::{MediaKind, MediaTile, PlaybackHints};
use maud::{html, Markup};
use parking_lot::Mutex;

#[derive(Default)]
struct GridState {
    placeholder: Option<String>,
    tiles: Vec<MediaTile>,
    error: Option<String>,
    summary: Option<usize>,
}

#[derive(Default)]
pub struct HtmlGrid {
    state: Mutex<GridState>,
}

impl HtmlGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with placeholder text, shown until the first pass clears it
    pub fn with_placeholder(text: impl Into<String>) -> Self {
        let grid = Self::default();
        grid.state.lock().placeholder = Some(text.into());
        grid
    }

    pub fn placeholder(&self) -> Option<String> {
        self.state.lock().placeholder.clone()
    }

    pub fn tiles(&self) -> Vec<MediaTile> {
        self.state.lock().tiles.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn summary(&self) -> Option<usize> {
        self.state.lock().summary
    }

    pub fn markup(&self) -> Markup {
        let state = self.state.lock();
        html! {
            div.grid-container {
                @if let Some(message) = &state.error {
                    p { (message) }
                } @else {
                    @if let Some(text) = &state.placeholder {
                        p.grid-placeholder { (text) }
                    }
                    @for tile in &state.tiles {
                        (tile_markup(tile))
                    }
                    @if let Some(count) = state.summary {
                        p.grid-summary { (summary_text(count)) }
                    }
                }
            }
        }
    }

    pub fn to_html(&self) -> String {
        self.markup().into_string()
    }
}

fn summary_text(count: usize) -> String {
    match count {
        1 => "1 item".to_string(),
        n => format!("{} items", n),
    }
}

fn tile_markup(tile: &MediaTile) -> Markup {
    let ratio = format!("{:.3}", tile.aspect_ratio);
    let hints = tile.playback.unwrap_or(PlaybackHints::PREVIEW);
    html! {
        div class=(tile.class_attr()) data-ratio=(ratio) {
            @if tile.kind == MediaKind::Video {
                video src=(tile.src) muted[hints.muted] autoplay[hints.autoplay] loop[hints.looped] playsinline[hints.inline] preload="metadata" {}
            } @else {
                img src=(tile.src) alt=(tile.name) loading="lazy";
            }
        }
    }
}

impl GridContainer for HtmlGrid {
    fn clear(&self) {
        *self.state.lock() = GridState::default();
    }

    fn append(&self, tile: MediaTile) {
        self.state.lock().tiles.push(tile);
    }

    fn show_error(&self, message: &str) {
        *self.state.lock() = GridState {
            error: Some(message.to_string()),
            ..GridState::default()
        };
    }

    fn set_summary(&self, count: usize) {
        self.state.lock().summary = Some(count);
    }
}
