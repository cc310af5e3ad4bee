//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which encrypts a handful of fixture streams into
//! an in-memory chunk store, wires a [`Player`] with a real disk cache over
//! it and serves the full router on a random port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aes::Aes128;
use async_trait::async_trait;
use br_cache::ChunkCache;
use br_core::config::Config;
use br_core::{ChunkHash, ChunkInfo, Error, Manifest, Result, CHUNK_SIZE, IV_LEN};
use br_player::{BackgroundPool, CatalogResolver, ChunkSource, Fee, Player, StreamMetadata};
use br_server::context::AppContext;
use bytes::Bytes;
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

pub const KEY: [u8; 16] = [0x5a; 16];
pub const C: usize = CHUNK_SIZE as usize;

/// `Last-Modified` every fixture carries.
pub const LAST_MODIFIED: &str = "Thu, 17 Oct 2019 08:52:41 GMT";

pub fn encrypt(plaintext: &[u8], iv: &[u8; IV_LEN]) -> Vec<u8> {
    let encryptor = cbc::Encryptor::<Aes128>::new(&KEY.into(), iv.into());
    encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// In-memory chunk store that counts every fetch.
#[derive(Default)]
pub struct MemorySource {
    blobs: Mutex<HashMap<ChunkHash, Bytes>>,
    total: AtomicUsize,
}

impl MemorySource {
    pub fn insert(&self, data: Vec<u8>) -> ChunkHash {
        let hash = ChunkHash::digest(&data);
        self.blobs.lock().insert(hash.clone(), Bytes::from(data));
        hash
    }

    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkSource for MemorySource {
    async fn get(&self, hash: &ChunkHash) -> Result<Bytes> {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .lock()
            .get(hash)
            .cloned()
            .ok_or_else(|| Error::ChunkNotFound {
                hash: hash.to_string(),
            })
    }
}

/// Deterministic plaintext of `len` bytes.
pub fn plaintext(len: usize, seed: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 13 + seed) % 251) as u8).collect()
}

/// Encrypt `data` into `source` in full-size chunks and store its
/// descriptor. Returns the descriptor hash.
pub fn publish(source: &MemorySource, data: &[u8], file_name: &str) -> ChunkHash {
    let chunks = data
        .chunks(C)
        .enumerate()
        .map(|(i, plain)| {
            let iv = [i as u8 + 1; IV_LEN];
            let ciphertext = encrypt(plain, &iv);
            let length = ciphertext.len() as u64;
            ChunkInfo {
                hash: source.insert(ciphertext),
                length,
                iv,
                sequence: i as u32,
            }
        })
        .collect();

    let manifest = Manifest {
        stream_name: file_name.into(),
        suggested_file_name: file_name.into(),
        stream_type: "lbryfile".into(),
        stream_hash: String::new(),
        key: KEY.to_vec(),
        chunks,
        terminator_iv: [0; IV_LEN],
    };
    source.insert(manifest.to_json().expect("descriptor encodes"))
}

/// A stream published into the harness.
pub struct Fixture {
    pub name: &'static str,
    pub claim_id: &'static str,
    pub data: Vec<u8>,
}

impl Fixture {
    pub fn path(&self, filename: &str) -> String {
        format!("/content/claims/{}/{}/{filename}", self.name, self.claim_id)
    }
}

pub struct TestHarness {
    pub ctx: AppContext,
    pub source: Arc<MemorySource>,
    /// Two full chunks and a partial third, `video/mp4`.
    pub video: Fixture,
    /// Single chunk `application/pdf` with a file name.
    pub document: Fixture,
    /// Catalog entry without a size.
    pub r#unsized: Fixture,
    cancel: CancellationToken,
    _cache_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let source = Arc::new(MemorySource::default());
        let timestamp = Utc.with_ymd_and_hms(2019, 10, 17, 8, 52, 41).unwrap();

        let video = Fixture {
            name: "what",
            claim_id: "6769855a9aa43b67086f9ff3c1a5bacb5698a27a",
            data: plaintext(2 * C + 12_345, 1),
        };
        let document = Fixture {
            name: "notes",
            claim_id: "ab12",
            data: plaintext(5_000, 2),
        };
        let r#unsized = Fixture {
            name: "unsized",
            claim_id: "cd34",
            data: plaintext(C + 100, 3),
        };

        let entry = |fixture: &Fixture, sd_hash: ChunkHash, size: u64, content_type: &str| {
            StreamMetadata {
                uri: format!("{}#{}", fixture.name, fixture.claim_id),
                sd_hash,
                size,
                content_type: content_type.into(),
                fee: None,
                timestamp,
                file_name: None,
            }
        };

        let video_hash = publish(&source, &video.data, "what.mp4");
        let document_hash = publish(&source, &document.data, "notes.pdf");
        let unsized_hash = publish(&source, &r#unsized.data, "unsized.bin");

        let mut document_entry = entry(
            &document,
            document_hash,
            document.data.len() as u64,
            "application/pdf",
        );
        document_entry.file_name = Some("notes.pdf".into());

        let mut paid = entry(&video, video_hash.clone(), video.data.len() as u64, "video/mp4");
        paid.uri = "premium#ef56".into();
        paid.fee = Some(Fee {
            amount: 5.0,
            currency: "LBC".into(),
        });

        let mut missing = entry(&video, ChunkHash::digest(b"no descriptor"), 10, "video/mp4");
        missing.uri = "gone#0000".into();

        let resolver = CatalogResolver::from_entries([
            entry(&video, video_hash, video.data.len() as u64, "video/mp4"),
            document_entry,
            entry(&r#unsized, unsized_hash, 0, "application/octet-stream"),
            paid,
            missing,
        ]);

        let config = Config::default();
        let cache_dir = tempfile::tempdir().expect("failed to create cache dir");
        let cache = ChunkCache::open(cache_dir.path(), config.cache.max_cost, config.cache.chunk_cost)
            .expect("failed to open cache");
        let player = Player::new(Arc::new(resolver), source.clone())
            .with_cache(cache)
            .with_pool(BackgroundPool::new(4))
            .with_options((&config.player).into());

        Self {
            ctx: AppContext::new(config, player, None),
            source,
            video,
            document,
            r#unsized,
            cancel: CancellationToken::new(),
            _cache_dir: cache_dir,
        }
    }

    /// Start the server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let ctx = harness.ctx.clone();
        let cancel = harness.cancel.clone();
        tokio::spawn(async move {
            br_server::serve(listener, ctx, cancel).await.ok();
        });

        (harness, addr)
    }

    pub fn url(addr: SocketAddr, path: &str) -> String {
        format!("http://{addr}{path}")
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
