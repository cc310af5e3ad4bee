//! Fixtures shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use aes::Aes128;
use async_trait::async_trait;
use br_core::{ChunkHash, ChunkInfo, Error, Manifest, Result, IV_LEN};
use bytes::Bytes;
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use parking_lot::Mutex;

use crate::source::ChunkSource;

pub const KEY: [u8; 16] = [0x11; 16];

pub fn encrypt(plaintext: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Vec<u8> {
    let encryptor = cbc::Encryptor::<Aes128>::new(key.into(), iv.into());
    let padded_len = plaintext.len() + (16 - plaintext.len() % 16);
    let mut buf = vec![0u8; padded_len];
    buf[..plaintext.len()].copy_from_slice(plaintext);
    encryptor
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .expect("buffer sized for padding")
        .to_vec()
}

/// In-memory chunk store that counts fetches per hash.
#[derive(Default)]
pub struct MemorySource {
    blobs: Mutex<HashMap<ChunkHash, Bytes>>,
    fetches: Mutex<HashMap<ChunkHash, usize>>,
    total: AtomicUsize,
}

impl MemorySource {
    pub fn insert(&self, data: Vec<u8>) -> ChunkHash {
        let hash = ChunkHash::digest(&data);
        self.blobs.lock().insert(hash.clone(), Bytes::from(data));
        hash
    }

    pub fn fetches(&self, hash: &ChunkHash) -> usize {
        self.fetches.lock().get(hash).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkSource for MemorySource {
    async fn get(&self, hash: &ChunkHash) -> Result<Bytes> {
        *self.fetches.lock().entry(hash.clone()).or_default() += 1;
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

/// Deterministic plaintext for chunk `index`.
pub fn chunk_plaintext(index: usize, len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + index * 31) % 251) as u8).collect()
}

/// Encrypt `plaintexts` chunk by chunk into `source` and describe them.
pub fn build_stream(source: &MemorySource, plaintexts: &[Vec<u8>]) -> Manifest {
    let chunks = plaintexts
        .iter()
        .enumerate()
        .map(|(i, plain)| {
            let iv = [i as u8; IV_LEN];
            let ciphertext = encrypt(plain, &KEY, &iv);
            let length = ciphertext.len() as u64;
            ChunkInfo {
                hash: source.insert(ciphertext),
                length,
                iv,
                sequence: i as u32,
            }
        })
        .collect();

    Manifest {
        stream_name: "fixture.bin".into(),
        suggested_file_name: "fixture.bin".into(),
        stream_type: "lbryfile".into(),
        stream_hash: String::new(),
        key: KEY.to_vec(),
        chunks,
        terminator_iv: [0xee; IV_LEN],
    }
}
