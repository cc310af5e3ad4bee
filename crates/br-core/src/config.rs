//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for the server, the chunk cache, the player and the remote
//! chunk source. Every section defaults sensibly so a completely empty `{}`
//! file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub player: PlayerConfig,
    pub source: SourceConfig,
    /// JSON catalog used to resolve stream URIs.
    pub catalog: Option<PathBuf>,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))),
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.cache.enabled {
            if self.cache.max_cost < self.cache.chunk_cost {
                warnings.push(format!(
                    "cache.max_cost ({}) is smaller than one chunk ({}); nothing will be cached",
                    self.cache.max_cost, self.cache.chunk_cost
                ));
            }
            if self.cache.dir.as_os_str().is_empty() {
                warnings.push("cache is enabled but cache.dir is empty".into());
            }
        } else if self.player.prefetch {
            warnings.push("player.prefetch has no effect while the cache is disabled".into());
        }

        if self.player.hot_window == 0 {
            warnings.push("player.hot_window is 0; every read goes to cache or network".into());
        }
        if self.player.background_workers == 0 {
            warnings.push("player.background_workers is 0; background work will never run".into());
        }

        if self.source.base_url.is_empty() {
            warnings.push("source.base_url is empty".into());
        }

        if self.catalog.is_none() {
            warnings.push("no catalog configured; every stream will resolve as not found".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Local chunk cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Directory holding one file per cached chunk. Must not be shared with
    /// anything else: its contents are wiped on startup.
    pub dir: PathBuf,
    /// Total cost budget of resident chunks.
    pub max_cost: u64,
    /// Cost charged for every chunk.
    pub chunk_cost: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: std::env::temp_dir().join("blobreel_cache"),
            max_cost: 16 << 30,
            chunk_cost: 1 << 21,
        }
    }
}

/// Playback tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub prefetch: bool,
    /// Number of chunks fetched ahead after a cache miss.
    pub prefetch_depth: usize,
    /// Number of recently served chunks each stream keeps in memory.
    pub hot_window: usize,
    /// Upper bound on concurrently running background tasks.
    pub background_workers: usize,
    /// Background tasks allowed to wait for a worker; further submissions
    /// are dropped.
    pub background_queue: usize,
    /// Size of each read issued while streaming a response body.
    pub read_buffer: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            prefetch: true,
            prefetch_depth: 3,
            hot_window: 2,
            background_workers: 16,
            background_queue: 64,
            read_buffer: 256 * 1024,
        }
    }
}

/// Remote chunk store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL; chunks are fetched from `{base_url}/{hash}`.
    pub base_url: String,
    pub timeout_secs: u64,
    /// Check that downloaded bytes hash to the requested key.
    pub verify_hashes: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5567/blob".into(),
            timeout_secs: 30,
            verify_hashes: true,
        }
    }
}
