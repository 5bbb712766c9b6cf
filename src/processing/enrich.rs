//! Record enrichment: ingestion timestamp, normalized temperature and a synthetic id.

use std::fmt;
use std::sync::Arc;

use chrono::SecondsFormat;
use serde_json::Value;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::ids::{IdGenerator, UuidIdGenerator};
use crate::types::{
    EnrichedRecord, ID_KEY, METRICS_KEY, RECEIVED_AT_KEY, TEMP_C_KEY, TEMP_KEY, TelemetryRecord,
};

/// A validated record that could not be enriched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnrichmentError {
    /// `metrics.temp` is present but does not convert to a finite float.
    #[error("metrics.temp is not numeric (raw='{raw}')")]
    NonNumericTemperature { raw: String },

    /// `metrics` is not an object, so `temp` cannot be read or `temp_c` written.
    #[error("metrics is not an object (raw='{raw}')")]
    MetricsNotObject { raw: String },

    /// `device_id` is not a string, so no id can be derived from it.
    #[error("device_id is not a string (raw='{raw}')")]
    DeviceIdNotString { raw: String },
}

/// Adds `received_at`, `metrics.temp_c` and `id` to validated records.
#[derive(Clone)]
pub struct Enricher {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl fmt::Debug for Enricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enricher").finish_non_exhaustive()
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(UuidIdGenerator))
    }
}

impl Enricher {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { clock, ids }
    }

    /// Enrich one record. The input is left untouched; the output is a new record.
    ///
    /// `metrics.temp` defaults to `0` when absent. The original `metrics.temp` is kept as-is.
    pub fn enrich(&self, record: &TelemetryRecord) -> Result<EnrichedRecord, EnrichmentError> {
        let device_id = record
            .device_id()
            .as_str()
            .ok_or_else(|| EnrichmentError::DeviceIdNotString {
                raw: record.device_id().to_string(),
            })?;

        let Value::Object(metrics) = record.metrics() else {
            return Err(EnrichmentError::MetricsNotObject {
                raw: record.metrics().to_string(),
            });
        };
        let temp_c = match metrics.get(TEMP_KEY) {
            None => 0.0,
            Some(raw) => to_float(raw).ok_or_else(|| EnrichmentError::NonNumericTemperature {
                raw: raw.to_string(),
            })?,
        };
        let temp_c = serde_json::Number::from_f64(temp_c).ok_or_else(|| {
            EnrichmentError::NonNumericTemperature {
                raw: temp_c.to_string(),
            }
        })?;
        let id = format!("{device_id}-{}", self.ids.record_suffix());

        let mut metrics = metrics.clone();
        metrics.insert(TEMP_C_KEY.to_string(), Value::Number(temp_c));

        let mut fields = record.fields().clone();
        fields.insert(
            RECEIVED_AT_KEY.to_string(),
            Value::String(self.clock.now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        fields.insert(METRICS_KEY.to_string(), Value::Object(metrics));
        fields.insert(ID_KEY.to_string(), Value::String(id));

        Ok(EnrichedRecord::from_fields(fields))
    }
}

/// Numbers, booleans and numeric strings convert; anything else does not.
fn to_float(v: &Value) -> Option<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => parse_float_literal(s.trim())?,
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    f.is_finite().then_some(f)
}

/// Float literal parsing that also takes single `_` separators between digits (`"1_000.5"`).
fn parse_float_literal(s: &str) -> Option<f64> {
    if !s.contains('_') {
        return s.parse().ok();
    }
    let bytes = s.as_bytes();
    let mut digits = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        if c != '_' {
            digits.push(c);
            continue;
        }
        let before = i > 0 && bytes[i - 1].is_ascii_digit();
        let after = bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
        if !(before && after) {
            return None;
        }
    }
    digits.parse().ok()
}
