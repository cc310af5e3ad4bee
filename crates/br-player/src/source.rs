//! Remote chunk store access.

use std::time::Duration;

use async_trait::async_trait;
use br_core::config::SourceConfig;
use br_core::{ChunkHash, Error, Result};
use bytes::Bytes;

/// Fetches raw (encrypted) chunks by content hash.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn get(&self, hash: &ChunkHash) -> Result<Bytes>;
}

/// [`ChunkSource`] that downloads `{base_url}/{hash}` over HTTP.
pub struct HttpChunkSource {
    client: reqwest::Client,
    base_url: String,
    verify_hashes: bool,
}

impl HttpChunkSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            verify_hashes: config.verify_hashes,
        })
    }

    fn url_for(&self, hash: &ChunkHash) -> String {
        format!("{}/{}", self.base_url, hash)
    }
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    async fn get(&self, hash: &ChunkHash) -> Result<Bytes> {
        let response = self
            .client
            .get(self.url_for(hash))
            .send()
            .await
            .map_err(|e| Error::remote(hash, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::ChunkNotFound {
                hash: hash.to_string(),
            });
        }
        if !status.is_success() {
            return Err(Error::remote(hash, format!("unexpected status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::remote(hash, e.to_string()))?;

        if self.verify_hashes {
            let actual = ChunkHash::digest(&body);
            if &actual != hash {
                return Err(Error::HashMismatch {
                    expected: hash.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> SourceConfig {
        SourceConfig {
            base_url: base_url.into(),
            timeout_secs: 5,
            verify_hashes: true,
        }
    }

    #[test]
    fn url_strips_trailing_slash() {
        let source = HttpChunkSource::new(&config("http://store.local/blob/")).unwrap();
        let hash = ChunkHash::digest(b"x");
        assert_eq!(source.url_for(&hash), format!("http://store.local/blob/{hash}"));
    }

    #[tokio::test]
    async fn unreachable_store_is_remote_error() {
        let source = HttpChunkSource::new(&config("http://127.0.0.1:1")).unwrap();
        let err = source.get(&ChunkHash::digest(b"x")).await.unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
    }
}
