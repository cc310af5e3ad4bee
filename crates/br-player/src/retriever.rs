//! Per-stream chunk retrieval: hot window, shared cache, then the network.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use br_cache::ChunkCache;
use br_core::{ChunkHash, ChunkInfo, Error, Manifest, PlaintextChunk, Result};
use bytes::Bytes;

use crate::decrypt::Decryptor;
use crate::metrics;
use crate::pool::BackgroundPool;
use crate::source::ChunkSource;

/// Tuning knobs for a [`ChunkRetriever`].
#[derive(Debug, Clone, Copy)]
pub struct RetrieverOptions {
    /// Recently served chunks kept in memory per stream.
    pub hot_window: usize,
    pub prefetch: bool,
    /// Chunks fetched ahead after a cache miss.
    pub prefetch_depth: usize,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            hot_window: 2,
            prefetch: true,
            prefetch_depth: 3,
        }
    }
}

/// Download + decrypt, shared between the foreground path and background
/// prefetch tasks.
#[derive(Clone)]
struct Fetcher {
    uri: Arc<str>,
    manifest: Arc<Manifest>,
    source: Arc<dyn ChunkSource>,
    decryptor: Arc<dyn Decryptor>,
}

impl Fetcher {
    async fn fetch(&self, info: &ChunkInfo) -> Result<Bytes> {
        let started = Instant::now();
        let ciphertext = match self.source.get(&info.hash).await {
            Ok(data) => data,
            Err(e) => {
                metrics::chunk_download_failed();
                tracing::warn!(
                    uri = %self.uri,
                    hash = %info.hash,
                    index = info.sequence,
                    "Chunk download failed: {e}"
                );
                return Err(e);
            }
        };
        metrics::chunk_downloaded(ciphertext.len(), started.elapsed());

        let plaintext = self
            .decryptor
            .decrypt(&ciphertext, &self.manifest.key, &info.iv)
            .inspect_err(|e| {
                tracing::warn!(
                    uri = %self.uri,
                    hash = %info.hash,
                    index = info.sequence,
                    "Chunk decryption failed: {e}"
                );
            })?;

        tracing::debug!(
            uri = %self.uri,
            index = info.sequence,
            bytes = plaintext.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Chunk retrieved"
        );
        Ok(plaintext)
    }
}

/// Serves decrypted chunks of one stream.
///
/// Not shared between streams or callers: a playback request owns its
/// retriever and drives it sequentially.
pub struct ChunkRetriever {
    fetcher: Fetcher,
    cache: Option<Arc<ChunkCache>>,
    pool: Arc<BackgroundPool>,
    options: RetrieverOptions,
    /// Most recently served first.
    hot: VecDeque<(usize, PlaintextChunk)>,
}

impl ChunkRetriever {
    pub fn new(
        uri: impl Into<Arc<str>>,
        manifest: Arc<Manifest>,
        source: Arc<dyn ChunkSource>,
        decryptor: Arc<dyn Decryptor>,
        cache: Option<Arc<ChunkCache>>,
        pool: Arc<BackgroundPool>,
        options: RetrieverOptions,
    ) -> Self {
        Self {
            fetcher: Fetcher {
                uri: uri.into(),
                manifest,
                source,
                decryptor,
            },
            cache,
            pool,
            options,
            hot: VecDeque::with_capacity(options.hot_window),
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.fetcher.manifest
    }

    pub fn chunk_count(&self) -> usize {
        self.fetcher.manifest.chunk_count()
    }

    /// Decrypted contents of chunk `index`.
    pub async fn get(&mut self, index: usize) -> Result<PlaintextChunk> {
        let manifest = Arc::clone(&self.fetcher.manifest);
        let info = manifest.chunk(index).ok_or(Error::IndexOutOfRange {
            index,
            count: manifest.chunk_count(),
        })?;

        if let Some(chunk) = self.hot_lookup(index) {
            metrics::hot_window_hit();
            tracing::trace!(index, "Hot window hit");
            return Ok(chunk);
        }

        if let Some(cache) = &self.cache {
            if let Some(chunk) = cache.get(&info.hash).await {
                metrics::cache_hit();
                tracing::trace!(index, hash = %info.hash.short(), "Cache hit");
                self.remember(index, chunk.clone());
                return Ok(chunk);
            }
            metrics::cache_miss();
        }

        let plaintext = self.fetcher.fetch(info).await?;
        let chunk = PlaintextChunk::Remote(plaintext.clone());
        self.remember(index, chunk.clone());
        self.schedule_background(index, info.hash.clone(), plaintext);

        Ok(chunk)
    }

    fn hot_lookup(&mut self, index: usize) -> Option<PlaintextChunk> {
        let pos = self.hot.iter().position(|(i, _)| *i == index)?;
        let entry = self.hot.remove(pos)?;
        let chunk = entry.1.clone();
        self.hot.push_front(entry);
        Some(chunk)
    }

    fn remember(&mut self, index: usize, chunk: PlaintextChunk) {
        if self.options.hot_window == 0 {
            return;
        }
        self.hot.retain(|(i, _)| *i != index);
        self.hot.push_front((index, chunk));
        self.hot.truncate(self.options.hot_window);
    }

    /// Persist a freshly downloaded chunk and prefetch the ones after it.
    fn schedule_background(&self, index: usize, hash: ChunkHash, plaintext: Bytes) {
        let Some(cache) = &self.cache else {
            return;
        };

        let persist_cache = Arc::clone(cache);
        self.pool.submit("persist", async move {
            if let Err(e) = persist_cache.set(&hash, plaintext).await {
                tracing::warn!(hash = %hash.short(), "Failed to cache chunk: {e}");
            }
        });

        if !self.options.prefetch {
            return;
        }
        let start = index + 1;
        let end = (start + self.options.prefetch_depth).min(self.chunk_count());
        if start >= end {
            return;
        }

        let cache = Arc::clone(cache);
        let fetcher = self.fetcher.clone();
        self.pool.submit("prefetch", async move {
            tracing::debug!(uri = %fetcher.uri, start, end, "Prefetching chunks");
            for info in &fetcher.manifest.chunks[start..end] {
                if cache.has(&info.hash) {
                    tracing::trace!(hash = %info.hash.short(), "Already cached, not prefetching");
                    continue;
                }
                match fetcher.fetch(info).await {
                    Ok(plaintext) => {
                        if let Err(e) = cache.set(&info.hash, plaintext).await {
                            tracing::warn!(hash = %info.hash.short(), "Failed to cache prefetched chunk: {e}");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            uri = %fetcher.uri,
                            hash = %info.hash.short(),
                            "Prefetch stopped: {e}"
                        );
                        return;
                    }
                }
            }
        });
    }
}
