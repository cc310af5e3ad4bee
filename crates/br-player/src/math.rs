//! Byte-range to chunk arithmetic.

use std::fmt;

use br_core::CHUNK_SIZE;

/// Chunks covering a requested byte range of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub offset: u64,
    pub len: u64,
    pub first_index: usize,
    pub last_index: usize,
    pub first_offset: u64,
    pub last_offset: u64,
    pub last_read_len: u64,
}

impl ChunkRange {
    /// Compute the range for `len` bytes starting at `offset` in a stream of
    /// `size` bytes. `size` is carried for symmetry with the caller; the
    /// arithmetic depends only on the chunk size.
    pub fn new(_size: u64, offset: u64, len: u64) -> Self {
        let end = offset + len;
        let first_index = (offset / CHUNK_SIZE) as usize;
        let last_index = (end / CHUNK_SIZE) as usize;
        let first_offset = offset - first_index as u64 * CHUNK_SIZE;
        let last_offset = if first_index == last_index {
            offset - last_index as u64 * CHUNK_SIZE
        } else {
            0
        };
        let last_read_len = end - last_offset - CHUNK_SIZE * last_index as u64;

        Self {
            offset,
            len,
            first_index,
            last_index,
            first_offset,
            last_offset,
            last_read_len,
        }
    }

    /// Intra-chunk start offset and byte count to read from chunk `index`.
    pub fn span(&self, index: usize) -> (usize, usize) {
        if self.first_index == self.last_index {
            (self.last_offset as usize, self.last_read_len as usize)
        } else if index == self.first_index {
            (self.first_offset as usize, (CHUNK_SIZE - self.first_offset) as usize)
        } else if index == self.last_index {
            (0, self.last_read_len as usize)
        } else {
            (0, CHUNK_SIZE as usize)
        }
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.first_index..=self.last_index
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C{}[{}:]-C{}[:{}]",
            self.first_index, self.first_offset, self.last_index, self.last_read_len
        )
    }
}
