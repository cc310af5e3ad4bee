//! br-player: turns a stream URI into a seekable plaintext byte stream.
//!
//! A [`Player`] resolves the URI, fetches the stream descriptor and hands out
//! a [`SeekableStream`]. Each stream owns a [`ChunkRetriever`] that serves
//! decrypted chunks from a small in-memory window, the shared disk cache or
//! the remote chunk store, in that order.

pub mod decrypt;
pub mod math;
pub mod metrics;
pub mod player;
pub mod pool;
pub mod resolver;
pub mod retriever;
pub mod source;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use decrypt::{AesCbcDecryptor, Decryptor};
pub use math::ChunkRange;
pub use self::metrics::RunningStreamGuard;
pub use player::Player;
pub use pool::BackgroundPool;
pub use resolver::{stream_uri, CatalogResolver, Fee, StreamMetadata, StreamResolver};
pub use retriever::{ChunkRetriever, RetrieverOptions};
pub use source::{ChunkSource, HttpChunkSource};
pub use stream::{ReadError, SeekableStream, Whence};
