//! The ingestion engine: drives decode → validate → enrich → write for each notification.
//!
//! Each notification is handled independently. A source object that cannot be read or decoded
//! is logged and skipped; it never produces a partial batch and never stops the other
//! notifications. Notifications run in parallel on a rayon pool, throttled by
//! [`PipelineOptions::max_in_flight_objects`]; the [`IngestReport`] lists outcomes in
//! notification order and records keep their source order inside each batch.
//!
//! ```
//! use std::sync::Arc;
//!
//! use telemetry_ingest::deadletter::MemoryDeadLetterSink;
//! use telemetry_ingest::execution::{IngestionEngine, InvocationStatus, PipelineOptions};
//! use telemetry_ingest::storage::MemoryObjectStore;
//! use telemetry_ingest::types::Notification;
//!
//! # fn main() -> Result<(), telemetry_ingest::PipelineError> {
//! let source = Arc::new(MemoryObjectStore::new());
//! source.insert(
//!     "in/a.ndjson",
//!     "{\"device_id\":\"d1\",\"metrics\":{\"temp\":20}}\n{\"metrics\":{}}\n",
//! );
//! let dest = Arc::new(MemoryObjectStore::new());
//! let dlq = Arc::new(MemoryDeadLetterSink::new());
//!
//! let engine = IngestionEngine::new(source, dest.clone(), dlq.clone(), PipelineOptions::default())?;
//! let report = engine.process(&[Notification::new("raw", "in/a.ndjson")]);
//!
//! assert_eq!(report.status(), InvocationStatus::Succeeded);
//! assert_eq!(dest.len(), 1);
//! assert_eq!(dlq.envelopes()[0].error, "validation_failed");
//! # Ok(())
//! # }
//! ```

mod observer;
mod semaphore;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::deadletter::{
    BestEffortRouter, DeadLetterSink, REASON_ENRICHMENT_FAILED, REASON_VALIDATION_FAILED,
};
use crate::error::{PipelineError, PipelineResult};
use crate::ids::{IdGenerator, UuidIdGenerator};
use crate::ingestion::{decode_payload, parse_event};
use crate::processing::{Enricher, Validator};
use crate::storage::{BatchWriter, CommittedBatch, ObjectStore};
use crate::types::{DeadLetterEnvelope, Notification, RawRecord};

pub use observer::{PipelineEvent, PipelineMetrics, PipelineMetricsSnapshot, PipelineObserver};

use semaphore::InFlightLimit;

/// What to do with a validated record whose enrichment fails (e.g. non-numeric `metrics.temp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionFailurePolicy {
    /// Route the record to the dead-letter channel (reason `enrichment_failed`) and keep going.
    #[default]
    DeadLetter,
    /// Fail the whole notification: no batch is written for its object.
    AbortObject,
}

/// Configuration for the [`IngestionEngine`].
///
/// Deserializable so hosts can embed it in their own config; unset fields take defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Number of worker threads.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on source objects processed concurrently.
    pub max_in_flight_objects: usize,
    pub conversion_failure: ConversionFailurePolicy,
    /// If `true`, unreadable/undecodable objects are skipped and the run can still be
    /// [`InvocationStatus::PartiallySucceeded`]. If `false`, any skip makes the run `Failed`.
    pub skip_unreadable_objects: bool,
    /// Gzip level for batches (0-9).
    pub compression_level: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            num_threads: Some(n),
            max_in_flight_objects: n.max(1),
            conversion_failure: ConversionFailurePolicy::default(),
            skip_unreadable_objects: true,
            compression_level: 6,
        }
    }
}

/// Result of handling one notification.
#[derive(Debug)]
pub enum ObjectOutcome {
    /// A batch was committed.
    Written {
        batch: CommittedBatch,
        dead_lettered: usize,
    },
    /// No record was accepted, so nothing was written.
    NoRecords { dead_lettered: usize },
    /// The source object could not be read or decoded and was skipped.
    Skipped { error: PipelineError },
    /// The batch write failed, or enrichment failed under
    /// [`ConversionFailurePolicy::AbortObject`].
    Failed { error: PipelineError },
}

/// Outcome of one notification, paired with the notification.
#[derive(Debug)]
pub struct ObjectReport {
    pub notification: Notification,
    pub outcome: ObjectOutcome,
}

/// Overall status of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    Succeeded,
    /// Some objects were skipped; everything else went through.
    PartiallySucceeded,
    /// At least one batch could not be committed (or skips are not tolerated). The transport
    /// should retry.
    Failed,
}

/// Everything one [`IngestionEngine::process`] call did.
#[derive(Debug)]
pub struct IngestReport {
    /// One entry per notification, in input order.
    pub outcomes: Vec<ObjectReport>,
    pub metrics: PipelineMetricsSnapshot,
    status: InvocationStatus,
}

impl IngestReport {
    fn new(outcomes: Vec<ObjectReport>, metrics: PipelineMetricsSnapshot, tolerate_skips: bool) -> Self {
        let failed = outcomes
            .iter()
            .any(|o| matches!(o.outcome, ObjectOutcome::Failed { .. }));
        let skipped = outcomes
            .iter()
            .any(|o| matches!(o.outcome, ObjectOutcome::Skipped { .. }));
        let status = match (failed, skipped) {
            (true, _) => InvocationStatus::Failed,
            (false, true) if tolerate_skips => InvocationStatus::PartiallySucceeded,
            (false, true) => InvocationStatus::Failed,
            (false, false) => InvocationStatus::Succeeded,
        };
        Self {
            outcomes,
            metrics,
            status,
        }
    }

    pub fn status(&self) -> InvocationStatus {
        self.status
    }

    /// Batches committed during the run, in notification order.
    pub fn batches(&self) -> impl Iterator<Item = &CommittedBatch> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            ObjectOutcome::Written { batch, .. } => Some(batch),
            _ => None,
        })
    }

    /// Total dead letters routed (delivered or not).
    pub fn dead_lettered(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.outcome {
                ObjectOutcome::Written { dead_lettered, .. } | ObjectOutcome::NoRecords { dead_lettered } => {
                    dead_lettered
                }
                _ => 0,
            })
            .sum()
    }
}

/// Orchestrates ingestion of object-created notifications.
///
/// All collaborators are injected, so tests can substitute in-memory stores, fault-injecting
/// sinks and deterministic clocks/id generators.
pub struct IngestionEngine {
    pool: ThreadPool,
    opts: PipelineOptions,
    source: Arc<dyn ObjectStore>,
    destination: Arc<dyn ObjectStore>,
    router: BestEffortRouter,
    validator: Validator,
    enricher: Enricher,
    writer: BatchWriter,
    observer: Option<Arc<dyn PipelineObserver>>,
    runs: AtomicU64,
}

impl fmt::Debug for IngestionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionEngine")
            .field("opts", &self.opts)
            .field("validator", &self.validator)
            .field("observer_set", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl IngestionEngine {
    /// Create an engine using the system clock, UUID identifiers and the default validator.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ThreadPool`] if the worker pool cannot be built.
    pub fn new(
        source: Arc<dyn ObjectStore>,
        destination: Arc<dyn ObjectStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
        opts: PipelineOptions,
    ) -> PipelineResult<Self> {
        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("ingest-{i}"))
            .build()?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids: Arc<dyn IdGenerator> = Arc::new(UuidIdGenerator);
        let writer = BatchWriter::new(Arc::clone(&destination), Arc::clone(&clock), Arc::clone(&ids))
            .with_compression_level(opts.compression_level);

        Ok(Self {
            pool,
            opts,
            source,
            destination,
            router: BestEffortRouter::new(dead_letters),
            validator: Validator::default(),
            enricher: Enricher::new(clock, ids),
            writer,
            observer: None,
            runs: AtomicU64::new(0),
        })
    }

    /// Replace the validation rule chain.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Replace the time source and id generator used for enrichment and batch naming.
    pub fn with_clock_and_ids(mut self, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        self.writer = BatchWriter::new(Arc::clone(&self.destination), Arc::clone(&clock), Arc::clone(&ids))
            .with_compression_level(self.opts.compression_level);
        self.enricher = Enricher::new(clock, ids);
        self
    }

    /// Attach an observer for pipeline events.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.opts
    }

    /// Parse an S3-style event document and process its notifications.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidEvent`] if the document cannot be parsed. Per-object
    /// failures are reported in the [`IngestReport`], not as errors.
    pub fn handle_event(&self, event: &[u8]) -> PipelineResult<IngestReport> {
        let notifications = parse_event(event)?;
        Ok(self.process(&notifications))
    }

    /// Process a batch of notifications to completion.
    ///
    /// Safe to call from several threads at once; every call counts into its own
    /// [`PipelineMetrics`], numbered by a per-engine run id.
    pub fn process(&self, notifications: &[Notification]) -> IngestReport {
        let start = Instant::now();
        let run_id = self.runs.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let metrics = PipelineMetrics::for_run(run_id);
        self.emit(PipelineEvent::RunStarted {
            notifications: notifications.len(),
        });
        info!(run_id, notifications = notifications.len(), "ingestion run started");

        let limit = InFlightLimit::new(self.opts.max_in_flight_objects);
        let outcomes: Vec<ObjectReport> = self.pool.install(|| {
            notifications
                .par_iter()
                .map(|notification| {
                    let permit = limit.acquire();
                    if !permit.waited().is_zero() {
                        metrics.on_throttle_wait(permit.waited());
                        self.emit(PipelineEvent::ThrottleWaited {
                            duration: permit.waited(),
                        });
                    }

                    metrics.on_object_start();
                    let outcome = self.process_object(notification, &metrics);
                    metrics.on_object_end();
                    drop(permit);

                    ObjectReport {
                        notification: notification.clone(),
                        outcome,
                    }
                })
                .collect()
        });

        metrics.end_run(start.elapsed());
        let snapshot = metrics.snapshot();
        let report = IngestReport::new(outcomes, snapshot.clone(), self.opts.skip_unreadable_objects);

        info!(status = ?report.status(), metrics = %snapshot, "ingestion run finished");
        self.emit(PipelineEvent::RunFinished {
            elapsed: start.elapsed(),
            metrics: snapshot,
        });
        report
    }

    fn process_object(&self, notification: &Notification, metrics: &PipelineMetrics) -> ObjectOutcome {
        let key = notification.key.as_str();
        self.emit(PipelineEvent::ObjectStarted {
            key: key.to_string(),
        });

        let candidates = match self.fetch_candidates(key) {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(bucket = %notification.bucket, key, error = %error, "skipping source object");
                metrics.on_object_skipped();
                self.emit(PipelineEvent::ObjectSkipped {
                    key: key.to_string(),
                    error: error.to_string(),
                });
                return ObjectOutcome::Skipped { error };
            }
        };
        metrics.on_records_decoded(candidates.len());

        let mut accepted = Vec::with_capacity(candidates.len());
        let mut dead_lettered = 0usize;
        for candidate in candidates {
            let envelope = match self.validator.validate(candidate) {
                Err(rejection) => {
                    DeadLetterEnvelope::new(REASON_VALIDATION_FAILED, key, rejection.record)
                        .with_detail(rejection.rule)
                }
                Ok(record) => match self.enricher.enrich(&record) {
                    Ok(enriched) => {
                        metrics.on_record_accepted();
                        accepted.push(enriched);
                        continue;
                    }
                    Err(err) => match self.opts.conversion_failure {
                        ConversionFailurePolicy::DeadLetter => {
                            DeadLetterEnvelope::new(REASON_ENRICHMENT_FAILED, key, record.into_raw())
                                .with_detail(err.to_string())
                        }
                        ConversionFailurePolicy::AbortObject => {
                            return self.fail_object(key, err.into(), metrics);
                        }
                    },
                },
            };
            self.dead_letter(key, &envelope, metrics);
            dead_lettered += 1;
        }

        match self.writer.write(&accepted) {
            Ok(Some(batch)) => {
                metrics.on_batch_written();
                self.emit(PipelineEvent::BatchWritten {
                    source_key: key.to_string(),
                    dest_key: batch.key.clone(),
                    records: batch.record_count,
                });
                ObjectOutcome::Written {
                    batch,
                    dead_lettered,
                }
            }
            Ok(None) => {
                info!(key, dead_lettered, "no records accepted; nothing written");
                ObjectOutcome::NoRecords { dead_lettered }
            }
            Err(err) => self.fail_object(key, err, metrics),
        }
    }

    fn fetch_candidates(&self, key: &str) -> PipelineResult<Vec<RawRecord>> {
        let bytes = self
            .source
            .get(key)
            .map_err(|source| PipelineError::SourceRead {
                key: key.to_string(),
                source,
            })?;
        decode_payload(&bytes)
    }

    fn dead_letter(&self, key: &str, envelope: &DeadLetterEnvelope, metrics: &PipelineMetrics) {
        let delivered = self.router.route(envelope);
        metrics.on_dead_letter(delivered);
        self.emit(PipelineEvent::RecordDeadLettered {
            key: key.to_string(),
            reason: envelope.error.clone(),
            delivered,
        });
    }

    fn fail_object(&self, key: &str, error: PipelineError, metrics: &PipelineMetrics) -> ObjectOutcome {
        error!(key, error = %error, "failed to process source object");
        metrics.on_object_failed();
        self.emit(PipelineEvent::ObjectFailed {
            key: key.to_string(),
            error: error.to_string(),
        });
        ObjectOutcome::Failed { error }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadletter::MemoryDeadLetterSink;
    use crate::storage::MemoryObjectStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<PipelineEvent>>,
    }

    impl PipelineObserver for RecordingObserver {
        fn on_event(&self, event: &PipelineEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn single_threaded() -> PipelineOptions {
        PipelineOptions {
            num_threads: Some(1),
            max_in_flight_objects: 1,
            ..Default::default()
        }
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: PipelineOptions = serde_json::from_str(
            r#"{"max_in_flight_objects": 3, "conversion_failure": "abort_object"}"#,
        )
        .unwrap();
        assert_eq!(opts.max_in_flight_objects, 3);
        assert_eq!(opts.conversion_failure, ConversionFailurePolicy::AbortObject);
        assert!(opts.skip_unreadable_objects);
        assert_eq!(opts.compression_level, 6);
    }

    #[test]
    fn empty_notification_list_succeeds() {
        let engine = IngestionEngine::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryDeadLetterSink::new()),
            single_threaded(),
        )
        .unwrap();
        let report = engine.process(&[]);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.status(), InvocationStatus::Succeeded);
        assert_eq!(report.metrics.run_id, 1);
    }

    #[test]
    fn observer_sees_run_lifecycle() {
        let source = Arc::new(MemoryObjectStore::new());
        source.insert("a", r#"[{"device_id":"x","metrics":{}},{"device_id":"y"}]"#);
        let observer = Arc::new(RecordingObserver::default());
        let engine = IngestionEngine::new(
            source,
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryDeadLetterSink::new()),
            single_threaded(),
        )
        .unwrap()
        .with_observer(observer.clone());

        let report = engine.process(&[Notification::new("b", "a"), Notification::new("b", "missing")]);
        assert_eq!(report.status(), InvocationStatus::PartiallySucceeded);

        let events = observer.events.lock().unwrap();
        assert!(matches!(events.first(), Some(PipelineEvent::RunStarted { notifications: 2 })));
        assert!(matches!(events.last(), Some(PipelineEvent::RunFinished { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::BatchWritten { source_key, records: 1, .. } if source_key == "a"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::RecordDeadLettered { reason, delivered: true, .. } if reason == "validation_failed"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::ObjectSkipped { key, .. } if key == "missing"
        )));

        let snap = &report.metrics;
        assert_eq!(snap.objects_started, 2);
        assert_eq!(snap.objects_skipped, 1);
        assert_eq!(snap.records_decoded, 2);
        assert_eq!(snap.records_accepted, 1);
        assert_eq!(snap.records_dead_lettered, 1);
        assert_eq!(snap.batches_written, 1);
    }

    #[test]
    fn strict_skip_policy_fails_the_run() {
        let engine = IngestionEngine::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryDeadLetterSink::new()),
            PipelineOptions {
                skip_unreadable_objects: false,
                ..single_threaded()
            },
        )
        .unwrap();
        let report = engine.process(&[Notification::new("b", "missing")]);
        assert_eq!(report.status(), InvocationStatus::Failed);
        assert!(matches!(
            report.outcomes[0].outcome,
            ObjectOutcome::Skipped {
                error: PipelineError::SourceRead { .. }
            }
        ));
    }
}
