//! br-core: shared errors, configuration, chunk hashes and manifest types.
//!
//! This crate is the foundational dependency for all other br-* crates. It
//! has no async code and does no network or cache I/O of its own.

pub mod chunk;
pub mod config;
pub mod error;
pub mod hash;
pub mod manifest;

// Re-export the most commonly used items at the crate root.
pub use chunk::{PlaintextChunk, CHUNK_SIZE, IV_LEN, MAX_CHUNK_LEN, PADDING_CORRECTION};
pub use error::{Error, Result};
pub use hash::ChunkHash;
pub use manifest::{ChunkInfo, Manifest};
