//! Core data model types for the telemetry pipeline.
//!
//! Records flow through three stages:
//!
//! - [`RawRecord`]: whatever the decoder extracted from a source object
//! - [`TelemetryRecord`]: a record the validator accepted
//! - [`EnrichedRecord`]: a record with `received_at`, `metrics.temp_c` and `id` added
//!
//! Rejected records travel as [`DeadLetterEnvelope`]s instead.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An untyped candidate record decoded from input bytes. No guaranteed shape.
pub type RawRecord = Value;

/// Key holding the device identifier.
pub const DEVICE_ID_KEY: &str = "device_id";
/// Key holding the metrics sub-mapping.
pub const METRICS_KEY: &str = "metrics";
/// Key stamped with the ingestion time.
pub const RECEIVED_AT_KEY: &str = "received_at";
/// Key holding the synthetic record identifier.
pub const ID_KEY: &str = "id";
/// Raw temperature key inside `metrics`.
pub const TEMP_KEY: &str = "temp";
/// Normalized temperature key inside `metrics`.
pub const TEMP_C_KEY: &str = "temp_c";

/// A record that passed validation.
///
/// Only the validator constructs these, so the `device_id` and `metrics` keys are always present.
/// Their values are not type-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    fields: Map<String, Value>,
}

impl TelemetryRecord {
    pub(crate) fn new_unchecked(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The `device_id` value (any JSON type).
    pub fn device_id(&self) -> &Value {
        &self.fields[DEVICE_ID_KEY]
    }

    /// The `metrics` value (any JSON type).
    pub fn metrics(&self) -> &Value {
        &self.fields[METRICS_KEY]
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Convert back into an untyped record (e.g. for dead-lettering).
    pub fn into_raw(self) -> RawRecord {
        Value::Object(self.fields)
    }
}

/// A validated record after enrichment.
///
/// Serializes transparently as the underlying JSON object, which is one line of a normalized
/// batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrichedRecord {
    fields: Map<String, Value>,
}

impl EnrichedRecord {
    pub(crate) fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Synthetic identifier `"<device_id>-<8 hex chars>"`.
    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_KEY).and_then(Value::as_str)
    }

    pub fn device_id(&self) -> Option<&str> {
        self.fields.get(DEVICE_ID_KEY).and_then(Value::as_str)
    }

    /// Ingestion timestamp (RFC 3339, UTC).
    pub fn received_at(&self) -> Option<&str> {
        self.fields.get(RECEIVED_AT_KEY).and_then(Value::as_str)
    }

    /// Normalized temperature.
    pub fn temp_c(&self) -> Option<f64> {
        self.fields
            .get(METRICS_KEY)
            .and_then(|m| m.get(TEMP_C_KEY))
            .and_then(Value::as_f64)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// A rejected or unprocessable record with failure context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEnvelope {
    /// Stable reason token, e.g. `"validation_failed"`.
    pub error: String,
    /// Source object the record came from.
    pub object_key: String,
    /// The record as decoded (possibly partial).
    pub record: RawRecord,
    /// Human-readable failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DeadLetterEnvelope {
    pub fn new(error: impl Into<String>, object_key: impl Into<String>, record: RawRecord) -> Self {
        Self {
            error: error.into(),
            object_key: object_key.into(),
            record,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// An event saying one object became available in the source content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub bucket: String,
    pub key: String,
}

impl Notification {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}
