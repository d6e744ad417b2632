//! Portfolio Grid - manifest-driven media grid loader
//!
//! A pass fetches `portfolio/manifest.json`, classifies each filename by
//! suffix, measures every image or MP4 to get its aspect ratio, and appends
//! one tile per item to a [`GridContainer`] tagged with its orientation.
//! Items that fail to load are dropped; only a manifest failure is shown to
//! the user.

pub mod constants;
pub mod error;
pub mod html;
pub mod loader;
pub mod settings;
pub mod source;
pub mod types;
pub mod utils;

pub use error::{ItemError, LoadError, SourceError};
pub use html::HtmlGrid;
pub use loader::{GridContainer, Loader, PassOutcome, PassReport};
pub use settings::Settings;
pub use source::{HttpSource, MediaPrefix, MediaSource, MemorySource};
pub use types::*;
