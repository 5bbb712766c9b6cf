//! `telemetry-ingest` turns device telemetry objects landing in object storage into normalized,
//! gzip-compressed NDJSON batches, routing records it cannot accept to a dead-letter channel.
//!
//! The primary entrypoint is [`execution::IngestionEngine`], which takes a list of
//! "object created" [`types::Notification`]s (or an S3-style event document) and, for each:
//!
//! 1. fetches the object from the source [`storage::ObjectStore`],
//! 2. decodes it into candidate records ([`ingestion::decode`]),
//! 3. validates each candidate ([`processing::validate`]) and enriches the accepted ones
//!    ([`processing::enrich`]),
//! 4. routes rejects to a [`deadletter::DeadLetterSink`] on a best-effort basis,
//! 5. commits the accepted records as one batch ([`storage::BatchWriter`]).
//!
//! ## What you can ingest
//!
//! - A single JSON document: `{"device_id": "d1", "metrics": {"temp": 21}}`
//! - A JSON array of documents
//! - Newline-delimited JSON, one document per line
//!
//! A record is accepted when it is an object with `device_id` and `metrics` keys. Accepted records
//! gain:
//!
//! - `received_at`: UTC ingestion time, e.g. `2024-03-09T12:30:15.123456Z`
//! - `metrics.temp_c`: `metrics.temp` as a float (`0.0` when absent)
//! - `id`: `"<device_id>-<8 hex chars>"`
//!
//! ## Output format
//!
//! Each notification with at least one accepted record produces exactly one new object at
//! `processed/{YYYY}/{MM}/{DD}/batch-{32 hex}.json.gz`: a single gzip stream with one JSON record
//! per line. Objects are never overwritten; retries produce new batches.
//!
//! ## Quick example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use telemetry_ingest::deadletter::MemoryDeadLetterSink;
//! use telemetry_ingest::execution::{IngestionEngine, PipelineOptions};
//! use telemetry_ingest::storage::{MemoryObjectStore, ObjectStore, decode_batch};
//!
//! # fn main() -> Result<(), telemetry_ingest::PipelineError> {
//! let source = Arc::new(MemoryObjectStore::new());
//! source.insert("raw/2024/batch.json", r#"[{"device_id":"d1","metrics":{"temp":19}}]"#);
//! let dest = Arc::new(MemoryObjectStore::new());
//!
//! let engine = IngestionEngine::new(
//!     source,
//!     dest.clone(),
//!     Arc::new(MemoryDeadLetterSink::new()),
//!     PipelineOptions::default(),
//! )?;
//! let report = engine.handle_event(
//!     br#"{"Records":[{"s3":{"bucket":{"name":"raw"},"object":{"key":"raw/2024/batch.json"}}}]}"#,
//! )?;
//!
//! let batch = report.batches().next().unwrap();
//! let body = dest.get(&batch.key).unwrap();
//! let records = decode_batch(&body)?;
//! assert_eq!(records[0].temp_c(), Some(19.0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`execution`]: the ingestion engine, options, reports, observer hooks and metrics
//! - [`ingestion`]: event parsing and payload decoding
//! - [`processing`]: validation and enrichment
//! - [`deadletter`]: best-effort dead-letter routing and sinks
//! - [`storage`]: object stores and the normalized batch format
//! - [`types`]: record and envelope types
//! - [`error`]: the shared error type

pub mod clock;
pub mod deadletter;
pub mod error;
pub mod execution;
pub mod ids;
pub mod ingestion;
pub mod processing;
pub mod storage;
pub mod types;

pub use error::{PipelineError, PipelineResult};
