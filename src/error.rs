use thiserror::Error;

use crate::processing::enrich::EnrichmentError;
use crate::storage::StorageError;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned by pipeline functions.
///
/// This is a single error enum shared by decoding, enrichment, batch writing and the engine.
/// Collaborator failures ([`StorageError`]) are wrapped with the object key they concern.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The notified source object could not be fetched (missing, permissions, I/O).
    #[error("failed to read source object '{key}': {source}")]
    SourceRead {
        key: String,
        #[source]
        source: StorageError,
    },

    /// The payload is neither a single JSON document nor valid NDJSON.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// A validated record could not be enriched.
    #[error("enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    /// The normalized batch could not be committed.
    #[error("failed to write batch '{key}': {source}")]
    DestinationWrite {
        key: String,
        #[source]
        source: StorageError,
    },

    /// Gzip encoding/decoding failed.
    #[error("encode error: {0}")]
    Encode(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A notification event document did not have the expected shape.
    #[error("invalid notification event: {message}")]
    InvalidEvent { message: String },

    /// The worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
