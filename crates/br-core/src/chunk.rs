//! Chunk format constants and decrypted chunk representation.

use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Largest ciphertext a single chunk may have.
pub const MAX_CHUNK_LEN: u64 = 2 * 1024 * 1024;

/// Plaintext bytes carried by every chunk except the last.
pub const CHUNK_SIZE: u64 = MAX_CHUNK_LEN - 1;

/// Padding of the final cipher block, subtracted when inferring stream size.
pub const PADDING_CORRECTION: u64 = 16;

/// Length of a per-chunk initialization vector.
pub const IV_LEN: usize = 16;

/// Decrypted chunk contents, either fresh from the network or read back
/// from the local cache.
#[derive(Debug, Clone)]
pub enum PlaintextChunk {
    /// Decrypted in memory right after download.
    Remote(Bytes),
    /// Read back from a cache file.
    Cached { path: PathBuf, data: Bytes },
}

impl PlaintextChunk {
    pub fn cached(path: impl Into<PathBuf>, data: Bytes) -> Self {
        Self::Cached {
            path: path.into(),
            data,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::Remote(data) | Self::Cached { data, .. } => data,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached { .. })
    }

    /// Path of the backing cache file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Remote(_) => None,
            Self::Cached { path, .. } => Some(path),
        }
    }

    /// Copy at most `len` bytes starting at `offset` into `dest`.
    ///
    /// The copy is bounded by the chunk's remaining bytes and by the size of
    /// `dest`; an offset past the end copies nothing.
    pub fn read(&self, offset: usize, len: usize, dest: &mut [u8]) -> usize {
        let data = self.bytes();
        if offset >= data.len() {
            return 0;
        }
        let n = len.min(data.len() - offset).min(dest.len());
        dest[..n].copy_from_slice(&data[offset..offset + n]);
        n
    }
}
