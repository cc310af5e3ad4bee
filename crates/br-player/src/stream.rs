//! Seekable plaintext view over a chunked stream.

use br_core::{ChunkHash, Error, Result};
use chrono::{DateTime, Utc};

use crate::math::ChunkRange;
use crate::metrics;
use crate::resolver::StreamMetadata;
use crate::retriever::ChunkRetriever;

/// Reference point for [`SeekableStream::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// A read that failed part way through. `copied` bytes at the front of the
/// destination are valid and the cursor has moved past them.
#[derive(Debug, thiserror::Error)]
#[error("read failed after {copied} bytes: {source}")]
pub struct ReadError {
    pub copied: usize,
    pub source: Error,
}

pub struct SeekableStream {
    uri: String,
    hash: ChunkHash,
    size: u64,
    content_type: String,
    timestamp: DateTime<Utc>,
    position: u64,
    retriever: ChunkRetriever,
}

impl SeekableStream {
    pub fn new(metadata: &StreamMetadata, size: u64, retriever: ChunkRetriever) -> Self {
        Self {
            uri: metadata.uri.clone(),
            hash: metadata.sd_hash.clone(),
            size,
            content_type: metadata.content_type.clone(),
            timestamp: metadata.timestamp,
            position: 0,
            retriever,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Descriptor hash the stream was opened from.
    pub fn hash(&self) -> &ChunkHash {
        &self.hash
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the cursor. `End` counts `offset` bytes back from the end.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        if self.size == 0 {
            return Err(Error::SizeUnknown);
        }
        if offset.unsigned_abs() > self.size {
            return Err(Error::OutOfBounds {
                offset,
                size: self.size,
            });
        }

        let size = i128::from(self.size);
        let target = match whence {
            Whence::Start => i128::from(offset),
            Whence::Current => i128::from(self.position) + i128::from(offset),
            Whence::End => size - i128::from(offset),
        };
        if target < 0 {
            return Err(Error::BeforeStart {
                position: target as i64,
            });
        }
        if target > size {
            return Err(Error::OutOfBounds {
                offset: target as i64,
                size: self.size,
            });
        }

        self.position = target as u64;
        tracing::debug!(uri = %self.uri, offset, ?whence, position = self.position, "Seek");
        Ok(self.position)
    }

    /// Fill `dest` from the cursor onwards. Returns `Ok(0)` at the end of the
    /// stream.
    pub async fn read(&mut self, dest: &mut [u8]) -> std::result::Result<usize, ReadError> {
        let remaining = self.size.saturating_sub(self.position);
        let want = (dest.len() as u64).min(remaining);
        if want == 0 {
            return Ok(0);
        }

        let range = ChunkRange::new(self.size, self.position, want);
        let dest = &mut dest[..want as usize];
        let mut copied = 0usize;

        for index in range.indices() {
            let (start, len) = range.span(index);
            if len == 0 {
                continue;
            }

            let chunk = match self.retriever.get(index).await {
                Ok(chunk) => chunk,
                Err(source) => {
                    self.position += copied as u64;
                    metrics::stream_read(false);
                    tracing::warn!(
                        uri = %self.uri,
                        range = %range,
                        size = self.size,
                        "Stream read failed: {source}"
                    );
                    return Err(ReadError { copied, source });
                }
            };

            let n = chunk.read(start, len, &mut dest[copied..]);
            copied += n;
            if n < len {
                tracing::warn!(
                    uri = %self.uri,
                    index,
                    expected = len,
                    got = n,
                    "Chunk shorter than expected"
                );
                break;
            }
        }

        self.position += copied as u64;
        metrics::stream_read(true);
        tracing::debug!(uri = %self.uri, range = %range, copied, "Read");
        Ok(copied)
    }
}
