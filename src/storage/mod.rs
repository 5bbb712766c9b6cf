//! Object storage abstraction and the normalized batch format.
//!
//! The pipeline reads source objects and commits batches through the [`ObjectStore`] trait, so
//! the same engine runs against a cloud bucket adapter, a local directory ([`LocalObjectStore`])
//! or an in-memory map ([`MemoryObjectStore`]).
//!
//! - [`batch`]: gzip NDJSON encoding, the `processed/YYYY/MM/DD/` path contract, and
//!   [`BatchWriter`]

pub mod batch;
mod local;
mod memory;

use thiserror::Error;

pub use batch::{
    BatchWriter, CommittedBatch, batch_key, batch_prefix_for_date, decode_batch, encode_batch,
    list_batches_for_date,
};
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

/// Error returned by [`ObjectStore`] implementations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object exists under the key.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Writes never overwrite; the key is already taken.
    #[error("object already exists: {key}")]
    AlreadyExists { key: String },

    /// The key cannot be mapped to a storage location (e.g. `..` segments).
    #[error("invalid object key: {key}")]
    InvalidKey { key: String },

    /// Underlying I/O error.
    #[error("io error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The store is unreachable or refused the request.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

/// Byte-oriented key/value content store.
pub trait ObjectStore: Send + Sync {
    /// Fetch the full payload stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Store `body` under `key`. Fails with [`StorageError::AlreadyExists`] if the key is taken.
    fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError>;

    /// Keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
