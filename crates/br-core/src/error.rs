//! Unified error type for blobreel.
//!
//! Every crate funnels its failures into [`Error`], which carries enough
//! context for the HTTP layer to derive a status code via
//! [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in blobreel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stream URI did not resolve to anything.
    #[error("could not resolve stream URI: {uri}")]
    StreamNotFound {
        /// The URI that was looked up.
        uri: String,
    },

    /// The stream exists but is behind a fee.
    #[error("paid stream: {uri}")]
    PaidStream {
        /// The URI that was looked up.
        uri: String,
    },

    /// Seeking was attempted on a stream whose size is zero.
    #[error("stream size is zero")]
    SizeUnknown,

    /// A seek offset or target lies past the stream boundaries.
    #[error("seeking out of bounds: offset {offset}, size {size}")]
    OutOfBounds {
        /// Offset or resulting position that was rejected.
        offset: i64,
        /// Total stream size.
        size: u64,
    },

    /// A seek would move the cursor before the first byte.
    #[error("seeking before the beginning of file: {position}")]
    BeforeStart {
        /// The negative position the seek resolved to.
        position: i64,
    },

    /// A chunk index outside the manifest was requested.
    #[error("chunk index {index} out of range ({count} chunks)")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of data chunks in the manifest.
        count: usize,
    },

    /// The remote store does not have the chunk.
    #[error("blob not found: {hash}")]
    ChunkNotFound {
        /// Hash of the missing chunk.
        hash: String,
    },

    /// The remote store returned bytes that do not hash to the key.
    #[error("hash in response does not match: expected {expected}, got {actual}")]
    HashMismatch {
        /// Hash that was requested.
        expected: String,
        /// Hash of the received bytes.
        actual: String,
    },

    /// Fetching a chunk from the remote store failed.
    #[error("remote error [{hash}]: {message}")]
    Remote {
        /// Hash of the chunk being fetched.
        hash: String,
        /// Human-readable error description.
        message: String,
    },

    /// Ciphertext could not be decrypted.
    #[error("decrypt error: {0}")]
    Decrypt(String),

    /// The stream descriptor is malformed.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// A local cache operation failed.
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Request data failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::StreamNotFound { .. } => 404,
            Error::PaidStream { .. } => 402,
            Error::SizeUnknown | Error::OutOfBounds { .. } | Error::BeforeStart { .. } => 416,
            Error::IndexOutOfRange { .. } => 416,
            Error::ChunkNotFound { .. } | Error::HashMismatch { .. } => 503,
            Error::Validation(_) => 400,
            Error::Remote { .. }
            | Error::Decrypt(_)
            | Error::Manifest(_)
            | Error::Cache(_)
            | Error::Config(_)
            | Error::Io { .. }
            | Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::StreamNotFound { .. } => "not_found",
            Error::PaidStream { .. } => "paid_stream",
            Error::SizeUnknown => "size_unknown",
            Error::OutOfBounds { .. } => "out_of_bounds",
            Error::BeforeStart { .. } => "before_start",
            Error::IndexOutOfRange { .. } => "index_out_of_range",
            Error::ChunkNotFound { .. } => "chunk_not_found",
            Error::HashMismatch { .. } => "hash_mismatch",
            Error::Remote { .. } => "remote_error",
            Error::Decrypt(_) => "decrypt_error",
            Error::Manifest(_) => "manifest_error",
            Error::Cache(_) => "cache_error",
            Error::Config(_) => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::StreamNotFound`].
    pub fn stream_not_found(uri: impl Into<String>) -> Self {
        Error::StreamNotFound { uri: uri.into() }
    }

    /// Convenience constructor for [`Error::Remote`].
    pub fn remote(hash: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::Remote {
            hash: hash.to_string(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
