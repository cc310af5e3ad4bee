//! Stream descriptor ("manifest") parsing.
//!
//! A manifest is stored in the remote store as a JSON blob of its own. It
//! lists every encrypted chunk of the stream in order, the symmetric key
//! shared by all chunks, and ends with an empty terminator entry that
//! carries an IV but no data.

use serde::{Deserialize, Serialize};

use crate::chunk::{CHUNK_SIZE, IV_LEN, MAX_CHUNK_LEN, PADDING_CORRECTION};
use crate::error::{Error, Result};
use crate::hash::ChunkHash;

/// One encrypted chunk of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Hash of the ciphertext, used as the storage key.
    pub hash: ChunkHash,
    /// Ciphertext length in bytes.
    pub length: u64,
    /// Per-chunk initialization vector.
    pub iv: [u8; IV_LEN],
    /// Position of the chunk in the stream.
    pub sequence: u32,
}

/// Parsed stream descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub stream_name: String,
    pub suggested_file_name: String,
    pub stream_type: String,
    pub stream_hash: String,
    /// Symmetric key shared by every chunk.
    pub key: Vec<u8>,
    /// Data chunks, terminator excluded.
    pub chunks: Vec<ChunkInfo>,
    /// IV of the terminator entry, kept so the descriptor re-encodes intact.
    pub terminator_iv: [u8; IV_LEN],
}

#[derive(Debug, Serialize, Deserialize)]
struct WireManifest {
    stream_name: String,
    key: String,
    #[serde(default)]
    suggested_file_name: String,
    #[serde(default)]
    stream_hash: String,
    #[serde(default)]
    stream_type: String,
    blobs: Vec<WireChunk>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireChunk {
    blob_num: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blob_hash: Option<String>,
    iv: String,
    length: u64,
}

impl Manifest {
    /// Parse a descriptor blob.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let wire: WireManifest = serde_json::from_slice(data)
            .map_err(|e| Error::Manifest(format!("descriptor parse error: {e}")))?;

        let key = hex::decode(&wire.key)
            .map_err(|e| Error::Manifest(format!("invalid key: {e}")))?;

        let Some((terminator, data_entries)) = wire.blobs.split_last() else {
            return Err(Error::Manifest("descriptor has no entries".into()));
        };
        if terminator.length != 0 || terminator.blob_hash.is_some() {
            return Err(Error::Manifest(format!(
                "last entry #{} is not an empty terminator",
                terminator.blob_num
            )));
        }
        if terminator.blob_num as usize != data_entries.len() {
            return Err(Error::Manifest(format!(
                "terminator numbered {} after {} chunks",
                terminator.blob_num,
                data_entries.len()
            )));
        }

        let mut chunks = Vec::with_capacity(data_entries.len());
        for (i, entry) in data_entries.iter().enumerate() {
            if entry.blob_num as usize != i {
                return Err(Error::Manifest(format!(
                    "entry {i} is numbered {}",
                    entry.blob_num
                )));
            }
            let hash = entry
                .blob_hash
                .as_deref()
                .ok_or_else(|| Error::Manifest(format!("chunk #{i} has no hash")))?;
            if entry.length == 0 || entry.length > MAX_CHUNK_LEN {
                return Err(Error::Manifest(format!(
                    "chunk #{i} has invalid length {}",
                    entry.length
                )));
            }
            chunks.push(ChunkInfo {
                hash: ChunkHash::parse(hash)
                    .map_err(|e| Error::Manifest(format!("chunk #{i}: {e}")))?,
                length: entry.length,
                iv: parse_iv(&entry.iv)?,
                sequence: entry.blob_num,
            });
        }

        Ok(Self {
            stream_name: decode_name(&wire.stream_name),
            suggested_file_name: decode_name(&wire.suggested_file_name),
            stream_type: wire.stream_type,
            stream_hash: wire.stream_hash,
            key,
            chunks,
            terminator_iv: parse_iv(&terminator.iv)?,
        })
    }

    /// Encode back into the descriptor wire format.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut blobs: Vec<WireChunk> = self
            .chunks
            .iter()
            .map(|c| WireChunk {
                blob_num: c.sequence,
                blob_hash: Some(c.hash.to_string()),
                iv: hex::encode(c.iv),
                length: c.length,
            })
            .collect();
        blobs.push(WireChunk {
            blob_num: self.chunks.len() as u32,
            blob_hash: None,
            iv: hex::encode(self.terminator_iv),
            length: 0,
        });

        let wire = WireManifest {
            stream_name: hex::encode(&self.stream_name),
            key: hex::encode(&self.key),
            suggested_file_name: hex::encode(&self.suggested_file_name),
            stream_hash: self.stream_hash.clone(),
            stream_type: self.stream_type.clone(),
            blobs,
        };
        serde_json::to_vec(&wire).map_err(|e| Error::Internal(format!("descriptor encode: {e}")))
    }

    /// Number of addressable data chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk(&self, index: usize) -> Option<&ChunkInfo> {
        self.chunks.get(index)
    }

    /// Plaintext size estimated from ciphertext lengths.
    ///
    /// Full chunks decrypt to [`CHUNK_SIZE`] bytes; the final chunk counts its
    /// raw length, and the padding of the final block cannot be known without
    /// decrypting, so a fixed correction is subtracted.
    pub fn inferred_size(&self) -> u64 {
        self.chunks
            .iter()
            .map(|c| if c.length == MAX_CHUNK_LEN { CHUNK_SIZE } else { c.length })
            .sum::<u64>()
            .saturating_sub(PADDING_CORRECTION)
    }
}

fn parse_iv(s: &str) -> Result<[u8; IV_LEN]> {
    let bytes = hex::decode(s).map_err(|e| Error::Manifest(format!("invalid iv: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| Error::Manifest(format!("iv is {} bytes, expected {IV_LEN}", b.len())))
}

/// Names are hex-encoded on the wire; fall back to the raw value otherwise.
fn decode_name(s: &str) -> String {
    hex::decode(s)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
        .unwrap_or_else(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(lengths: &[u64]) -> serde_json::Value {
        let mut blobs: Vec<serde_json::Value> = lengths
            .iter()
            .enumerate()
            .map(|(i, len)| {
                json!({
                    "blob_num": i,
                    "blob_hash": ChunkHash::digest(&[i as u8]).to_string(),
                    "iv": hex::encode([i as u8; IV_LEN]),
                    "length": len,
                })
            })
            .collect();
        blobs.push(json!({"blob_num": lengths.len(), "iv": hex::encode([0xffu8; IV_LEN]), "length": 0}));
        json!({
            "stream_name": hex::encode("clip.mp4"),
            "key": hex::encode([7u8; 16]),
            "suggested_file_name": hex::encode("clip.mp4"),
            "stream_hash": "00",
            "stream_type": "lbryfile",
            "blobs": blobs,
        })
    }

    #[test]
    fn parses_descriptor() {
        let raw = descriptor(&[MAX_CHUNK_LEN, 1000]).to_string();
        let manifest = Manifest::from_json(raw.as_bytes()).unwrap();
        assert_eq!(manifest.chunk_count(), 2);
        assert_eq!(manifest.stream_name, "clip.mp4");
        assert_eq!(manifest.key, vec![7u8; 16]);
        assert_eq!(manifest.chunk(1).unwrap().iv, [1u8; IV_LEN]);
        assert!(manifest.chunk(2).is_none());
    }

    #[test]
    fn infers_size_from_lengths() {
        let raw = descriptor(&[MAX_CHUNK_LEN, MAX_CHUNK_LEN, 1024]).to_string();
        let manifest = Manifest::from_json(raw.as_bytes()).unwrap();
        assert_eq!(manifest.inferred_size(), 2 * CHUNK_SIZE + 1024 - 16);
    }

    #[test]
    fn reencodes_to_same_manifest() {
        let raw = descriptor(&[MAX_CHUNK_LEN, 48]).to_string();
        let manifest = Manifest::from_json(raw.as_bytes()).unwrap();
        let again = Manifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(again, manifest);
    }

    #[test]
    fn rejects_missing_terminator() {
        let mut value = descriptor(&[1000]);
        value["blobs"].as_array_mut().unwrap().pop();
        let err = Manifest::from_json(value.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }

    #[test]
    fn rejects_bad_iv() {
        let mut value = descriptor(&[1000]);
        value["blobs"][0]["iv"] = json!("abcd");
        assert!(Manifest::from_json(value.to_string().as_bytes()).is_err());
    }

    #[test]
    fn rejects_empty_descriptor() {
        let raw = json!({"stream_name": "", "key": "", "blobs": []}).to_string();
        assert!(Manifest::from_json(raw.as_bytes()).is_err());
    }
}
