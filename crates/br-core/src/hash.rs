//! Content hashes used to address chunks in the remote store and the cache.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha384};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Length of a hex-encoded chunk hash (SHA-384).
pub const HASH_HEX_LEN: usize = 96;

/// Hex-encoded SHA-384 digest of a chunk's ciphertext.
///
/// Always stored lowercase so it can double as a cache file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkHash(String);

impl ChunkHash {
    /// Parse a hex hash, rejecting anything that is not 96 hex digits.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != HASH_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Validation(format!("invalid chunk hash: {s:?}")));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Hash arbitrary bytes.
    #[must_use]
    pub fn digest(data: &[u8]) -> Self {
        Self(hex::encode(Sha384::digest(data)))
    }

    /// Whether `name` has the shape of a chunk hash.
    pub fn is_hash_shaped(name: &str) -> bool {
        name.len() == HASH_HEX_LEN && name.bytes().all(|b| b.is_ascii_hexdigit())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for compact log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChunkHash {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ChunkHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChunkHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
