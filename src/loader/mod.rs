//! Loader module - runs grid passes: fetch, classify, resolve, render

mod classify;
mod manifest;
mod pass;
mod render;
mod resolve;

pub use classify::{classify, classify_name, media_kind};
pub use manifest::{fetch_manifest, parse_manifest};
pub use pass::Progress;
pub use render::{GridContainer, Renderer, Stale};
pub use resolve::{image_ratio, video_ratio, Resolver};

use crate::error::LoadError;
use crate::settings::Settings;
use crate::source::MediaSource;
use crate::types::MediaDescriptor;
use parking_lot::Mutex;
use pass::PolicyRun;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Summary of a completed pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub generation: u64,
    pub manifest_entries: usize,
    /// Entries dropped at classification
    pub skipped: usize,
    pub rendered: usize,
    /// Items that failed to load or timed out
    pub failed: usize,
    pub chunks: Vec<std::ops::Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(PassReport),
    /// A newer pass started before this one finished
    Superseded { generation: u64 },
    /// No container to render into; nothing was fetched
    NoContainer,
}

/// Owns the source and settings and hands out pass generations.
///
/// Starting a pass cancels the one before it, so only the newest
/// generation ever writes to the container.
pub struct Loader {
    source: Arc<dyn MediaSource>,
    settings: Settings,
    generation: AtomicU64,
    active: Mutex<Option<CancellationToken>>,
}

impl Loader {
    pub fn new(source: Arc<dyn MediaSource>, settings: Settings) -> Self {
        Self {
            source,
            settings,
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Generation of the most recently started pass (0 before the first)
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn begin_pass(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut active = self.active.lock();
        if let Some(previous) = active.replace(token.clone()) {
            previous.cancel();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (generation, token)
    }

    /// Classify raw manifest entries, dropping anything unusable
    pub fn descriptors(&self, entries: &[serde_json::Value]) -> Vec<MediaDescriptor> {
        entries
            .iter()
            .filter_map(|entry| classify(entry, &self.settings.media_dir))
            .collect()
    }

    /// Run one full pass into `container`.
    ///
    /// Manifest failures are shown in the container and returned as `Err`.
    /// Item failures only lower the rendered count.
    pub async fn run_pass(
        &self,
        container: Option<&dyn GridContainer>,
    ) -> Result<PassOutcome, LoadError> {
        let Some(container) = container else {
            debug!("No grid container, skipping pass");
            return Ok(PassOutcome::NoContainer);
        };

        let (generation, token) = self.begin_pass();
        info!(generation, policy = ?self.settings.ordering, "Starting grid pass");
        let superseded = || -> Result<PassOutcome, LoadError> {
            debug!(generation, "Pass superseded");
            Ok(PassOutcome::Superseded { generation })
        };

        let mut renderer = Renderer::new(container, token.clone());

        let fetched = tokio::select! {
            _ = token.cancelled() => return superseded(),
            fetched = fetch_manifest(self.source.as_ref(), &self.settings.manifest_path) => fetched,
        };
        let entries = match fetched {
            Ok(entries) => entries,
            Err(e) => {
                warn!(generation, error = %e, "Failed to load manifest");
                if renderer.fail(&e).is_err() {
                    return superseded();
                }
                return Err(e);
            }
        };

        let descriptors = self.descriptors(&entries);
        let skipped = entries.len() - descriptors.len();
        debug!(generation, entries = entries.len(), usable = descriptors.len(), skipped, "Manifest classified");

        if renderer.begin().is_err() {
            return superseded();
        }

        let resolver = Resolver::new(self.source.as_ref(), self.settings.item_timeout())
            .with_read_limit(self.settings.read_limit_bytes);
        let run = PolicyRun {
            resolver: &resolver,
            renderer: &mut renderer,
            token: &token,
        };
        let progress = match run
            .run(
                self.settings.ordering,
                self.settings.effective_chunk_size(),
                &descriptors,
            )
            .await
        {
            Ok(progress) => progress,
            Err(Stale) => return superseded(),
        };

        if renderer.finish(self.settings.show_summary).is_err() {
            return superseded();
        }

        info!(
            generation,
            rendered = progress.rendered,
            failed = progress.failed,
            skipped,
            "Grid pass complete"
        );
        Ok(PassOutcome::Completed(PassReport {
            generation,
            manifest_entries: entries.len(),
            skipped,
            rendered: progress.rendered,
            failed: progress.failed,
            chunks: progress.chunks,
        }))
    }
}
