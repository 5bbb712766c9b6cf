//! Batch decoding: one source object's bytes into candidate records.
//!
//! Supported inputs:
//! - A single JSON document: `{"device_id":"a","metrics":{}}`
//! - A JSON array of documents: `[{"device_id":"a"}, {"device_id":"b"}]`
//! - Newline-delimited JSON (NDJSON): `{"device_id":"a"}\n{"device_id":"b"}\n`, with `\n`,
//!   `\r\n` or a lone `\r` as the line break
//!
//! The whole payload is always tried as one JSON value first, so a valid document is never split
//! line by line (even if string values contain newlines).

use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};
use crate::types::RawRecord;

/// Decode a raw payload into an ordered list of candidate records.
///
/// An empty or whitespace-only payload yields no candidates. A single non-array JSON value
/// (including scalars) is returned as the sole candidate; rejecting non-objects is the
/// validator's job.
///
/// # Errors
///
/// Returns [`PipelineError::Decode`] if the payload is not UTF-8, or if it is not a single JSON
/// document and at least one non-blank line fails to parse as JSON.
pub fn decode_payload(bytes: &[u8]) -> PipelineResult<Vec<RawRecord>> {
    let text = std::str::from_utf8(bytes).map_err(|e| PipelineError::Decode {
        message: format!("payload is not valid utf-8: {e}"),
    })?;
    decode_str(text)
}

/// Decode an in-memory string. See [`decode_payload`].
pub fn decode_str(input: &str) -> PipelineResult<Vec<RawRecord>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    // First try parsing as a single JSON value (array or document).
    if let Ok(v) = serde_json::from_str::<Value>(input) {
        return Ok(match v {
            Value::Array(items) => items,
            other => vec![other],
        });
    }

    // Fall back to NDJSON.
    let mut values = Vec::new();
    for (i, line) in split_lines(input).enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v = serde_json::from_str::<Value>(line).map_err(|e| PipelineError::Decode {
            message: format!("invalid ndjson at line {}: {}", i + 1, e),
        })?;
        values.push(v);
    }
    Ok(values)
}

/// Split on `\n`, `\r\n` and a lone `\r`, each counting as one line break.
fn split_lines(input: &str) -> impl Iterator<Item = &str> {
    input
        .split('\n')
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
}
