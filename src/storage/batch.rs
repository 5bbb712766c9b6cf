//! Normalized batch format: gzip-compressed NDJSON of [`EnrichedRecord`]s.
//!
//! Batches are committed under `processed/{YYYY}/{MM}/{DD}/batch-{hex}.json.gz`, where the date is
//! the UTC processing date. Downstream consumers scan a day by listing
//! [`batch_prefix_for_date`].

use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::info;

use crate::clock::Clock;
use crate::error::{PipelineError, PipelineResult};
use crate::ids::IdGenerator;
use crate::types::EnrichedRecord;

use super::{ObjectStore, StorageError};

/// Top-level prefix for committed batches.
pub const PROCESSED_PREFIX: &str = "processed";

/// `processed/YYYY/MM/DD/` for a UTC date.
pub fn batch_prefix_for_date(date: NaiveDate) -> String {
    format!("{PROCESSED_PREFIX}/{}/", date.format("%Y/%m/%d"))
}

/// Full batch key for a processing time and batch id.
pub fn batch_key(at: DateTime<Utc>, batch_id: &str) -> String {
    format!(
        "{}batch-{batch_id}.json.gz",
        batch_prefix_for_date(at.date_naive())
    )
}

/// Encode records as one gzip stream of newline-terminated JSON lines.
pub fn encode_batch(records: &[EnrichedRecord], level: Compression) -> PipelineResult<Vec<u8>> {
    let mut gz = GzEncoder::new(Vec::new(), level);
    for rec in records {
        serde_json::to_writer(&mut gz, rec)?;
        gz.write_all(b"\n")?;
    }
    Ok(gz.finish()?)
}

/// Decode a batch produced by [`encode_batch`]. Blank lines are skipped.
pub fn decode_batch(bytes: &[u8]) -> PipelineResult<Vec<EnrichedRecord>> {
    let reader = BufReader::new(GzDecoder::new(bytes));
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}

/// Keys of all batches committed on `date`, sorted.
pub fn list_batches_for_date(
    store: &dyn ObjectStore,
    date: NaiveDate,
) -> Result<Vec<String>, StorageError> {
    let mut keys = store.list(&batch_prefix_for_date(date))?;
    keys.retain(|k| k.ends_with(".json.gz"));
    Ok(keys)
}

/// Summary of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedBatch {
    /// Destination object key.
    pub key: String,
    pub record_count: usize,
    pub compressed_bytes: usize,
}

/// Serializes enriched records and commits them as one new object.
#[derive(Clone)]
pub struct BatchWriter {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    level: Compression,
}

impl fmt::Debug for BatchWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchWriter")
            .field("level", &self.level.level())
            .finish_non_exhaustive()
    }
}

impl BatchWriter {
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            store,
            clock,
            ids,
            level: Compression::default(),
        }
    }

    /// Set the gzip level (0-9).
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }

    /// Commit `records` as one batch.
    ///
    /// Returns `Ok(None)` without touching the store when `records` is empty.
    pub fn write(&self, records: &[EnrichedRecord]) -> PipelineResult<Option<CommittedBatch>> {
        if records.is_empty() {
            return Ok(None);
        }

        let body = encode_batch(records, self.level)?;
        let key = batch_key(self.clock.now(), &self.ids.batch_id());
        let compressed_bytes = body.len();

        self.store
            .put(&key, body)
            .map_err(|source| PipelineError::DestinationWrite {
                key: key.clone(),
                source,
            })?;

        info!(key = %key, records = records.len(), compressed_bytes, "wrote batch");
        Ok(Some(CommittedBatch {
            key,
            record_count: records.len(),
            compressed_bytes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::ids::SequentialIdGenerator;
    use crate::storage::MemoryObjectStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(n: i64) -> EnrichedRecord {
        serde_json::from_value(json!({
            "device_id": "d",
            "metrics": {"temp": n, "temp_c": n as f64},
            "received_at": "2024-02-29T23:59:59.000000Z",
            "id": format!("d-{n:08x}")
        }))
        .unwrap()
    }

    fn writer(store: Arc<MemoryObjectStore>) -> BatchWriter {
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        BatchWriter::new(
            store,
            Arc::new(FixedClock(at)),
            Arc::new(SequentialIdGenerator::default()),
        )
    }

    #[test]
    fn key_follows_date_layout() {
        let at = Utc.with_ymd_and_hms(2023, 1, 5, 0, 0, 0).unwrap();
        assert_eq!(
            batch_key(at, "deadbeef"),
            "processed/2023/01/05/batch-deadbeef.json.gz"
        );
    }

    #[test]
    fn writes_one_gzip_object_with_lines_in_order() {
        let store = Arc::new(MemoryObjectStore::new());
        let records = vec![record(1), record(2), record(3)];

        let batch = writer(store.clone()).write(&records).unwrap().unwrap();

        assert_eq!(
            batch.key,
            "processed/2024/02/29/batch-00000000000000000000000000000001.json.gz"
        );
        assert_eq!(batch.record_count, 3);
        let body = store.get(&batch.key).unwrap();
        assert_eq!(body.len(), batch.compressed_bytes);
        assert_eq!(&body[..2], &[0x1f, 0x8b]);
        assert_eq!(decode_batch(&body).unwrap(), records);
    }

    #[test]
    fn each_line_is_one_json_object() {
        let body = encode_batch(&[record(1), record(2)], Compression::fast()).unwrap();
        let mut text = String::new();
        std::io::Read::read_to_string(&mut GzDecoder::new(&body[..]), &mut text).unwrap();
        let lines: Vec<_> = text.split_terminator('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(text.ends_with('\n'));
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], json!("d-00000001"));
    }

    #[test]
    fn empty_input_writes_nothing() {
        let store = Arc::new(MemoryObjectStore::new());
        assert_eq!(writer(store.clone()).write(&[]).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn lists_only_batches_of_the_day() {
        let store = MemoryObjectStore::new();
        store.insert("processed/2024/02/29/batch-a.json.gz", Vec::new());
        store.insert("processed/2024/02/29/notes.txt", Vec::new());
        store.insert("processed/2024/03/01/batch-b.json.gz", Vec::new());
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            list_batches_for_date(&store, day).unwrap(),
            vec!["processed/2024/02/29/batch-a.json.gz".to_string()]
        );
    }
}
