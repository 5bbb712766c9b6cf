//! Per-record transformations applied after decoding.
//!
//! - [`validate`]: a composable rule chain deciding whether a candidate is a telemetry record
//! - [`enrich`]: adds `received_at`, `metrics.temp_c` and `id` to accepted records
//!
//! ## Example: validate → enrich
//!
//! ```rust
//! use telemetry_ingest::processing::{Enricher, Validator};
//! use serde_json::json;
//!
//! let validator = Validator::default();
//! let record = validator
//!     .validate(json!({"device_id": "dev-1", "metrics": {"temp": "21.5"}}))
//!     .unwrap();
//!
//! let enriched = Enricher::default().enrich(&record).unwrap();
//! assert_eq!(enriched.temp_c(), Some(21.5));
//! assert!(enriched.id().unwrap().starts_with("dev-1-"));
//!
//! // Missing keys are rejected and the record is handed back.
//! let rejected = validator.validate(json!({"device_id": "dev-1"})).unwrap_err();
//! assert_eq!(rejected.rule, "missing key 'metrics'");
//! ```

pub mod enrich;
pub mod validate;

pub use enrich::{Enricher, EnrichmentError};
pub use validate::{NumericTemperature, RecordRule, Rejection, RequiredKey, StringField, Validator};
