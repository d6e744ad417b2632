//! Grid rendering into a host-supplied container

use crate::constants::LOAD_ERROR_MESSAGE;
use crate::error::LoadError;
use crate::types::{LoadedItem, MediaTile};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The page element the grid is rendered into.
///
/// Methods take `&self` so that overlapping passes can hold the same
/// container; only the current pass is allowed to write.
pub trait GridContainer: Send + Sync {
    /// Remove everything, placeholder content included
    fn clear(&self);
    fn append(&self, tile: MediaTile);
    /// Replace all contents with a single message
    fn show_error(&self, message: &str);
    fn set_summary(&self, count: usize);
}

/// Returned when the pass owning a renderer has been superseded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stale;

/// Writes one pass's results into a container.
///
/// Every write first checks the pass token, so a superseded pass
/// stops touching the container immediately.
pub struct Renderer<'a> {
    container: &'a dyn GridContainer,
    token: CancellationToken,
    rendered: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(container: &'a dyn GridContainer, token: CancellationToken) -> Self {
        Self {
            container,
            token,
            rendered: 0,
        }
    }

    fn ensure_current(&self) -> Result<(), Stale> {
        if self.token.is_cancelled() {
            Err(Stale)
        } else {
            Ok(())
        }
    }

    /// Clear placeholder content ahead of the first item
    pub fn begin(&mut self) -> Result<(), Stale> {
        self.ensure_current()?;
        self.container.clear();
        self.rendered = 0;
        Ok(())
    }

    /// Tag each tile with its orientation and append in the order given.
    pub fn append(&mut self, items: Vec<LoadedItem>) -> Result<usize, Stale> {
        self.ensure_current()?;
        let count = items.len();
        for item in items {
            let orientation = item.orientation();
            let mut tile = item.tile;
            tile.orientation = Some(orientation);
            debug!(name = %tile.name, ratio = item.aspect_ratio, class = orientation.css_class(), "Appending tile");
            self.container.append(tile);
        }
        self.rendered += count;
        Ok(count)
    }

    /// Finish the pass, optionally adding the summary node.
    pub fn finish(&self, show_summary: bool) -> Result<usize, Stale> {
        self.ensure_current()?;
        if show_summary {
            self.container.set_summary(self.rendered);
        }
        Ok(self.rendered)
    }

    pub fn fail(&self, error: &LoadError) -> Result<(), Stale> {
        self.ensure_current()?;
        debug!(error = %error, "Showing load error");
        self.container.show_error(LOAD_ERROR_MESSAGE);
        Ok(())
    }

    pub fn rendered(&self) -> usize {
        self.rendered
    }
}
