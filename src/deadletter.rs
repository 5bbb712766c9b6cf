//! Best-effort routing of rejected records to a dead-letter channel.
//!
//! Delivery is fire-and-forget: [`BestEffortRouter::route`] logs sink failures and reports them
//! as `false`, but never returns an error. Losing a dead letter never stops the records around it
//! from being processed.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, error};

use crate::clock::Clock;
use crate::ids::IdGenerator;
use crate::storage::ObjectStore;
use crate::types::DeadLetterEnvelope;

/// Dead-letter reason for records the validator rejected.
pub const REASON_VALIDATION_FAILED: &str = "validation_failed";
/// Dead-letter reason for records that failed enrichment.
pub const REASON_ENRICHMENT_FAILED: &str = "enrichment_failed";

/// The dead-letter channel could not accept a message.
#[derive(Debug, Error)]
#[error("dead-letter delivery failed: {message}")]
pub struct DeliveryError {
    pub message: String,
}

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Message-send primitive of a dead-letter channel (e.g. a queue).
pub trait DeadLetterSink: Send + Sync {
    /// Send one UTF-8 payload (a JSON-encoded [`DeadLetterEnvelope`]).
    fn send(&self, body: &str) -> Result<(), DeliveryError>;
}

/// Wraps a [`DeadLetterSink`] and swallows its failures.
#[derive(Clone)]
pub struct BestEffortRouter {
    sink: Arc<dyn DeadLetterSink>,
}

impl fmt::Debug for BestEffortRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BestEffortRouter").finish_non_exhaustive()
    }
}

impl BestEffortRouter {
    pub fn new(sink: Arc<dyn DeadLetterSink>) -> Self {
        Self { sink }
    }

    /// Encode and send `envelope`. Returns whether the sink accepted it.
    pub fn route(&self, envelope: &DeadLetterEnvelope) -> bool {
        let body = match serde_json::to_string(envelope) {
            Ok(body) => body,
            Err(e) => {
                error!(object_key = %envelope.object_key, error = %e, "failed to encode dead letter");
                return false;
            }
        };

        match self.sink.send(&body) {
            Ok(()) => {
                debug!(object_key = %envelope.object_key, reason = %envelope.error, "routed dead letter");
                true
            }
            Err(e) => {
                error!(
                    object_key = %envelope.object_key,
                    reason = %envelope.error,
                    error = %e,
                    "failed to send dead letter"
                );
                false
            }
        }
    }
}

/// Collects messages in memory.
#[derive(Debug, Default)]
pub struct MemoryDeadLetterSink {
    messages: Mutex<Vec<String>>,
}

impl MemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far, in arrival order.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Received messages decoded back into envelopes. Undecodable messages are skipped.
    pub fn envelopes(&self) -> Vec<DeadLetterEnvelope> {
        self.messages()
            .iter()
            .filter_map(|m| serde_json::from_str(m).ok())
            .collect()
    }
}

impl DeadLetterSink for MemoryDeadLetterSink {
    fn send(&self, body: &str) -> Result<(), DeliveryError> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(body.to_string());
        Ok(())
    }
}

/// Persists each message as its own object: `dead-letter/YYYY/MM/DD/<id>.json`.
#[derive(Clone)]
pub struct StoreDeadLetterSink {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl fmt::Debug for StoreDeadLetterSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDeadLetterSink").finish_non_exhaustive()
    }
}

impl StoreDeadLetterSink {
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, clock, ids }
    }
}

impl DeadLetterSink for StoreDeadLetterSink {
    fn send(&self, body: &str) -> Result<(), DeliveryError> {
        let key = format!(
            "dead-letter/{}/{}.json",
            self.clock.now().format("%Y/%m/%d"),
            self.ids.batch_id()
        );
        self.store
            .put(&key, body.as_bytes().to_vec())
            .map_err(|e| DeliveryError::new(e.to_string()))
    }
}
