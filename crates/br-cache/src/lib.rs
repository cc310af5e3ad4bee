//! br-cache: process-wide, disk-backed cache of decrypted chunks.
//!
//! [`ChunkCache`] is constructed once at startup and shared by every stream
//! through an `Arc`. Resident chunks are bounded by a total cost budget;
//! chunks with the fewest reads are evicted first and their files deleted in
//! the background.

pub mod cache;
pub mod index;

pub use cache::ChunkCache;
pub use index::{Admission, CostIndex};
