//! Parsing of "object created" event documents into [`Notification`]s.
//!
//! The accepted shape is the S3 event notification layout:
//!
//! ```json
//! {"Records": [{"s3": {"bucket": {"name": "raw"}, "object": {"key": "in/a.json"}}}]}
//! ```
//!
//! Entries without an object key are ignored.

use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::types::Notification;

#[derive(Debug, Default, Deserialize)]
struct EventDocument {
    #[serde(rename = "Records", default)]
    records: Vec<EventRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct EventRecord {
    #[serde(default)]
    s3: S3Entity,
}

#[derive(Debug, Default, Deserialize)]
struct S3Entity {
    #[serde(default)]
    bucket: BucketEntity,
    #[serde(default)]
    object: ObjectEntity,
}

#[derive(Debug, Default, Deserialize)]
struct BucketEntity {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectEntity {
    key: Option<String>,
}

/// Parse an event document into notifications, in document order.
pub fn parse_event(bytes: &[u8]) -> PipelineResult<Vec<Notification>> {
    let doc: EventDocument =
        serde_json::from_slice(bytes).map_err(|e| PipelineError::InvalidEvent {
            message: e.to_string(),
        })?;

    Ok(doc
        .records
        .into_iter()
        .filter_map(|r| {
            let key = r.s3.object.key.filter(|k| !k.is_empty())?;
            Some(Notification::new(r.s3.bucket.name, key))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_in_order() {
        let doc = br#"{"Records":[
            {"s3":{"bucket":{"name":"raw"},"object":{"key":"in/a.json","size":10}}},
            {"s3":{"bucket":{"name":"raw"},"object":{"key":"in/b.json"}}}
        ]}"#;
        let out = parse_event(doc).unwrap();
        assert_eq!(
            out,
            vec![
                Notification::new("raw", "in/a.json"),
                Notification::new("raw", "in/b.json"),
            ]
        );
    }

    #[test]
    fn entries_without_key_are_ignored() {
        let doc = br#"{"Records":[{"s3":{"object":{}}},{},{"s3":{"object":{"key":"k"}}}]}"#;
        let out = parse_event(doc).unwrap();
        assert_eq!(out, vec![Notification::new("", "k")]);
    }

    #[test]
    fn missing_records_is_empty() {
        assert!(parse_event(b"{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_document_is_an_error() {
        let err = parse_event(b"not json").unwrap_err();
        assert!(err.to_string().contains("invalid notification event"));
    }
}
