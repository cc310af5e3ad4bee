//! Stream URI resolution.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use br_core::{ChunkHash, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price attached to a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: f64,
    #[serde(default)]
    pub currency: String,
}

/// What a URI resolves to: the descriptor to fetch plus what the HTTP layer
/// needs for headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// `name#claim_id`.
    pub uri: String,
    /// Hash of the descriptor blob.
    pub sd_hash: ChunkHash,
    /// Plaintext size; 0 means unknown and is inferred from the manifest.
    #[serde(default)]
    pub size: u64,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub fee: Option<Fee>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub file_name: Option<String>,
}

fn default_content_type() -> String {
    "application/octet-stream".into()
}

impl StreamMetadata {
    pub fn is_paid(&self) -> bool {
        self.fee.as_ref().is_some_and(|fee| fee.amount > 0.0)
    }
}

/// Builds the URI a claim is looked up by.
pub fn stream_uri(name: &str, claim_id: &str) -> String {
    format!("{name}#{claim_id}")
}

/// Maps a stream URI to its metadata. `Ok(None)` means the URI is unknown.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, uri: &str) -> Result<Option<StreamMetadata>>;
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    streams: Vec<StreamMetadata>,
}

/// [`StreamResolver`] backed by a static catalog.
///
/// The catalog file is JSON of the form `{"streams": [StreamMetadata, ...]}`.
#[derive(Debug, Default, Clone)]
pub struct CatalogResolver {
    streams: HashMap<String, StreamMetadata>,
}

impl CatalogResolver {
    pub fn from_entries(entries: impl IntoIterator<Item = StreamMetadata>) -> Self {
        Self {
            streams: entries
                .into_iter()
                .map(|meta| (meta.uri.clone(), meta))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid catalog: {e}")))?;
        Ok(Self::from_entries(file.streams))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read catalog {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), streams = catalog.len(), "Loaded stream catalog");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[async_trait]
impl StreamResolver for CatalogResolver {
    async fn resolve(&self, uri: &str) -> Result<Option<StreamMetadata>> {
        Ok(self.streams.get(uri).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_json() -> String {
        let hash = ChunkHash::digest(b"descriptor");
        format!(
            r#"{{
                "streams": [
                    {{
                        "uri": "what#6769855a9aa43b67086f9ff3c1a5bacb5698a27a",
                        "sd_hash": "{hash}",
                        "size": 158433824,
                        "content_type": "video/mp4",
                        "timestamp": "2019-10-17T08:52:41Z"
                    }},
                    {{
                        "uri": "premium#abc",
                        "sd_hash": "{hash}",
                        "fee": {{ "amount": 1.5, "currency": "LBC" }},
                        "timestamp": "2020-01-01T00:00:00Z"
                    }}
                ]
            }}"#
        )
    }

    #[tokio::test]
    async fn resolves_known_uri() {
        let catalog = CatalogResolver::from_json(&catalog_json()).unwrap();
        assert_eq!(catalog.len(), 2);

        let meta = catalog
            .resolve("what#6769855a9aa43b67086f9ff3c1a5bacb5698a27a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.size, 158433824);
        assert_eq!(meta.content_type, "video/mp4");
        assert!(!meta.is_paid());
    }

    #[tokio::test]
    async fn unknown_uri_is_none() {
        let catalog = CatalogResolver::from_json(&catalog_json()).unwrap();
        assert!(catalog.resolve("nope#1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn defaults_and_fee() {
        let catalog = CatalogResolver::from_json(&catalog_json()).unwrap();
        let meta = catalog.resolve("premium#abc").await.unwrap().unwrap();
        assert!(meta.is_paid());
        assert_eq!(meta.size, 0);
        assert_eq!(meta.content_type, "application/octet-stream");
    }

    #[test]
    fn zero_fee_is_free() {
        let mut meta: StreamMetadata = serde_json::from_value(serde_json::json!({
            "uri": "a#b",
            "sd_hash": ChunkHash::digest(b"x").to_string(),
            "timestamp": "2020-01-01T00:00:00Z"
        }))
        .unwrap();
        meta.fee = Some(Fee {
            amount: 0.0,
            currency: "LBC".into(),
        });
        assert!(!meta.is_paid());
    }

    #[test]
    fn rejects_malformed_hash() {
        let err = CatalogResolver::from_json(
            r#"{"streams": [{"uri": "a#b", "sd_hash": "zz", "timestamp": "2020-01-01T00:00:00Z"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builds_uri() {
        assert_eq!(stream_uri("what", "6769"), "what#6769");
    }
}
