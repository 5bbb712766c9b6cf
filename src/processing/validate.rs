//! Record validation as a chain of composable rules.
//!
//! The default chain is structural only: the record must be a JSON object holding `device_id`
//! and `metrics` keys. Value types are not checked unless stricter rules are added with
//! [`Validator::with_rule`].

use std::fmt;

use serde_json::{Map, Value};

use crate::types::{DEVICE_ID_KEY, METRICS_KEY, RawRecord, TEMP_KEY, TelemetryRecord};

/// A single acceptance check over a candidate record.
pub trait RecordRule: Send + Sync {
    /// Short description used in rejection details, e.g. `missing key 'metrics'`.
    fn describe(&self) -> String;

    /// Returns `true` if `record` satisfies the rule. `record` is always a JSON object.
    fn check(&self, record: &Map<String, Value>) -> bool;
}

/// Requires a key to be present (any value, including `null`).
#[derive(Debug, Clone)]
pub struct RequiredKey(pub String);

impl RequiredKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl RecordRule for RequiredKey {
    fn describe(&self) -> String {
        format!("missing key '{}'", self.0)
    }

    fn check(&self, record: &Map<String, Value>) -> bool {
        record.contains_key(&self.0)
    }
}

/// Requires a key to hold a string.
#[derive(Debug, Clone)]
pub struct StringField(pub String);

impl RecordRule for StringField {
    fn describe(&self) -> String {
        format!("key '{}' is not a string", self.0)
    }

    fn check(&self, record: &Map<String, Value>) -> bool {
        record.get(&self.0).is_some_and(Value::is_string)
    }
}

/// Requires `metrics` to be an object whose `temp`, when present, is a JSON number.
#[derive(Debug, Clone, Default)]
pub struct NumericTemperature;

impl RecordRule for NumericTemperature {
    fn describe(&self) -> String {
        "metrics.temp is not numeric".to_string()
    }

    fn check(&self, record: &Map<String, Value>) -> bool {
        match record.get(METRICS_KEY) {
            Some(Value::Object(metrics)) => metrics.get(TEMP_KEY).is_none_or(Value::is_number),
            _ => false,
        }
    }
}

/// A record the validator refused, handed back with the failing rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Description of the first failing rule.
    pub rule: String,
    /// The record, unchanged.
    pub record: RawRecord,
}

/// An ordered chain of [`RecordRule`]s; the first failing rule rejects the record.
pub struct Validator {
    rules: Vec<Box<dyn RecordRule>>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.rules.iter().map(|r| r.describe()).collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Validator {
    /// `device_id` and `metrics` must be present.
    fn default() -> Self {
        Self::empty()
            .with_rule(RequiredKey::new(DEVICE_ID_KEY))
            .with_rule(RequiredKey::new(METRICS_KEY))
    }
}

impl Validator {
    /// A validator that accepts any JSON object.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Default rules plus a string `device_id` and a numeric `metrics.temp`.
    pub fn strict() -> Self {
        Self::default()
            .with_rule(StringField(DEVICE_ID_KEY.to_string()))
            .with_rule(NumericTemperature)
    }

    /// Append a rule to the chain.
    pub fn with_rule(mut self, rule: impl RecordRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Validate a candidate record.
    ///
    /// Non-objects are always rejected, before any rule runs.
    pub fn validate(&self, record: RawRecord) -> Result<TelemetryRecord, Rejection> {
        let fields = match record {
            Value::Object(fields) => fields,
            other => {
                return Err(Rejection {
                    rule: "record is not an object".to_string(),
                    record: other,
                });
            }
        };

        if let Some(rule) = self.rules.iter().find(|r| !r.check(&fields)) {
            return Err(Rejection {
                rule: rule.describe(),
                record: Value::Object(fields),
            });
        }

        Ok(TelemetryRecord::new_unchecked(fields))
    }

    /// Boolean acceptance form of [`Self::validate`].
    pub fn is_valid(&self, record: &RawRecord) -> bool {
        match record.as_object() {
            Some(fields) => self.rules.iter().all(|r| r.check(fields)),
            None => false,
        }
    }
}
