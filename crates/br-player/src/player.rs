//! Entry point for playback: resolve a URI, open its stream.

use std::sync::Arc;

use br_cache::ChunkCache;
use br_core::config::{Config, PlayerConfig};
use br_core::{Error, Manifest, Result};

use crate::decrypt::{AesCbcDecryptor, Decryptor};
use crate::pool::BackgroundPool;
use crate::resolver::{CatalogResolver, StreamMetadata, StreamResolver};
use crate::retriever::{ChunkRetriever, RetrieverOptions};
use crate::source::{ChunkSource, HttpChunkSource};
use crate::stream::SeekableStream;

impl From<&PlayerConfig> for RetrieverOptions {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            hot_window: config.hot_window,
            prefetch: config.prefetch,
            prefetch_depth: config.prefetch_depth,
        }
    }
}

/// Shared by every playback request; opening a stream is cheap.
pub struct Player {
    resolver: Arc<dyn StreamResolver>,
    source: Arc<dyn ChunkSource>,
    decryptor: Arc<dyn Decryptor>,
    cache: Option<Arc<ChunkCache>>,
    pool: Arc<BackgroundPool>,
    options: RetrieverOptions,
}

impl Player {
    /// A player with AES decryption, no cache and default options.
    pub fn new(resolver: Arc<dyn StreamResolver>, source: Arc<dyn ChunkSource>) -> Self {
        Self {
            resolver,
            source,
            decryptor: Arc::new(AesCbcDecryptor),
            cache: None,
            pool: Arc::new(BackgroundPool::default()),
            options: RetrieverOptions::default(),
        }
    }

    /// Build the production player: HTTP chunk source, catalog resolver and
    /// the disk cache when enabled.
    pub fn from_config(config: &Config) -> Result<Self> {
        let resolver = match &config.catalog {
            Some(path) => CatalogResolver::load(path)?,
            None => {
                tracing::warn!("No catalog configured; every stream URI will be unknown");
                CatalogResolver::default()
            }
        };
        let source = HttpChunkSource::new(&config.source)?;

        let mut player = Self::new(Arc::new(resolver), Arc::new(source))
            .with_pool(BackgroundPool::bounded(
                config.player.background_workers,
                config.player.background_queue,
            ))
            .with_options(RetrieverOptions::from(&config.player));

        if config.cache.enabled {
            let cache = ChunkCache::open(
                &config.cache.dir,
                config.cache.max_cost,
                config.cache.chunk_cost,
            )?;
            tracing::info!(dir = %config.cache.dir.display(), max_cost = config.cache.max_cost, "Chunk cache ready");
            player = player.with_cache(cache);
        } else {
            tracing::info!("Chunk cache disabled");
        }

        Ok(player)
    }

    pub fn with_cache(mut self, cache: Arc<ChunkCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_decryptor(mut self, decryptor: Arc<dyn Decryptor>) -> Self {
        self.decryptor = decryptor;
        self
    }

    pub fn with_pool(mut self, pool: BackgroundPool) -> Self {
        self.pool = Arc::new(pool);
        self
    }

    pub fn with_options(mut self, options: RetrieverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cache(&self) -> Option<&Arc<ChunkCache>> {
        self.cache.as_ref()
    }

    pub fn pool(&self) -> &BackgroundPool {
        &self.pool
    }

    /// Look up `uri`, refusing unknown and paid streams.
    pub async fn resolve(&self, uri: &str) -> Result<StreamMetadata> {
        let metadata = self
            .resolver
            .resolve(uri)
            .await?
            .ok_or_else(|| Error::stream_not_found(uri))?;

        if metadata.is_paid() {
            return Err(Error::PaidStream {
                uri: uri.to_string(),
            });
        }
        Ok(metadata)
    }

    /// Fetch and parse the stream descriptor, then wrap it in a stream
    /// positioned at byte 0.
    pub async fn open(&self, metadata: &StreamMetadata) -> Result<SeekableStream> {
        let descriptor = self.source.get(&metadata.sd_hash).await.inspect_err(|e| {
            tracing::warn!(uri = %metadata.uri, hash = %metadata.sd_hash, "Descriptor fetch failed: {e}");
        })?;
        let manifest = Manifest::from_json(&descriptor)?;

        let size = if metadata.size > 0 {
            metadata.size
        } else {
            manifest.inferred_size()
        };
        tracing::info!(
            uri = %metadata.uri,
            chunks = manifest.chunk_count(),
            size,
            "Stream opened"
        );

        let retriever = ChunkRetriever::new(
            metadata.uri.as_str(),
            Arc::new(manifest),
            Arc::clone(&self.source),
            Arc::clone(&self.decryptor),
            self.cache.clone(),
            Arc::clone(&self.pool),
            self.options,
        );
        Ok(SeekableStream::new(metadata, size, retriever))
    }

    /// [`resolve`](Self::resolve) then [`open`](Self::open).
    pub async fn play(&self, uri: &str) -> Result<SeekableStream> {
        let metadata = self.resolve(uri).await?;
        self.open(&metadata).await
    }

    /// Let background work finish and refuse new work.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
