//! Ordering policies: how resolved items reach the container

use super::render::{Renderer, Stale};
use super::resolve::Resolver;
use crate::types::{LoadedItem, MediaDescriptor, OrderingPolicy};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use std::ops::Range;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What a policy run did with the descriptors it was given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub rendered: usize,
    pub failed: usize,
    /// Descriptor index ranges resolved together, in request order
    pub chunks: Vec<Range<usize>>,
}

pub(crate) struct PolicyRun<'r, 's, 'c> {
    pub resolver: &'r Resolver<'s>,
    pub renderer: &'r mut Renderer<'c>,
    pub token: &'r CancellationToken,
}

impl PolicyRun<'_, '_, '_> {
    pub async fn run(
        self,
        policy: OrderingPolicy,
        chunk_size: usize,
        descriptors: &[MediaDescriptor],
    ) -> Result<Progress, Stale> {
        match policy {
            OrderingPolicy::Chunked => self.chunked(chunk_size, descriptors).await,
            OrderingPolicy::SortByRatio => self.sort_by_ratio(descriptors).await,
            OrderingPolicy::Stream => self.stream(descriptors).await,
        }
    }

    /// Resolve `chunk_size` items together and append the batch in manifest
    /// order before requesting the next one. `chunk_size` comes from
    /// `Settings::effective_chunk_size` and is never zero.
    async fn chunked(
        self,
        chunk_size: usize,
        descriptors: &[MediaDescriptor],
    ) -> Result<Progress, Stale> {
        debug_assert!(chunk_size > 0);
        let mut progress = Progress::default();

        for (index, chunk) in descriptors.chunks(chunk_size).enumerate() {
            let start = index * chunk_size;
            let range = start..start + chunk.len();
            debug!(start = range.start, end = range.end, "Resolving chunk");
            progress.chunks.push(range);

            let results = tokio::select! {
                _ = self.token.cancelled() => return Err(Stale),
                results = join_all(chunk.iter().map(|d| self.resolver.resolve(d))) => results,
            };
            let loaded: Vec<LoadedItem> = results.into_iter().flatten().collect();
            progress.failed += chunk.len() - loaded.len();
            progress.rendered += self.renderer.append(loaded)?;
        }

        Ok(progress)
    }

    /// Wait for everything, then append widest first. Ties keep manifest order.
    async fn sort_by_ratio(self, descriptors: &[MediaDescriptor]) -> Result<Progress, Stale> {
        let mut progress = Progress::default();
        if !descriptors.is_empty() {
            progress.chunks.push(0..descriptors.len());
        }

        let results = tokio::select! {
            _ = self.token.cancelled() => return Err(Stale),
            results = join_all(descriptors.iter().map(|d| self.resolver.resolve(d))) => results,
        };
        let mut loaded: Vec<LoadedItem> = results.into_iter().flatten().collect();
        loaded.sort_by(|a, b| b.aspect_ratio.total_cmp(&a.aspect_ratio));

        progress.failed = descriptors.len() - loaded.len();
        progress.rendered = self.renderer.append(loaded)?;
        Ok(progress)
    }

    /// Append each item the moment it settles, in arrival order.
    async fn stream(self, descriptors: &[MediaDescriptor]) -> Result<Progress, Stale> {
        let mut progress = Progress::default();
        if !descriptors.is_empty() {
            progress.chunks.push(0..descriptors.len());
        }

        let mut pending: FuturesUnordered<_> = descriptors
            .iter()
            .map(|d| self.resolver.resolve(d))
            .collect();

        loop {
            let next = tokio::select! {
                _ = self.token.cancelled() => return Err(Stale),
                next = pending.next() => next,
            };
            match next {
                Some(Some(item)) => progress.rendered += self.renderer.append(vec![item])?,
                Some(None) => progress.failed += 1,
                None => break,
            }
        }

        Ok(progress)
    }
}
