use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Events emitted by the [`super::IngestionEngine`] during a run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted { notifications: usize },
    ThrottleWaited { duration: Duration },
    ObjectStarted { key: String },
    ObjectSkipped { key: String, error: String },
    RecordDeadLettered { key: String, reason: String, delivered: bool },
    BatchWritten { source_key: String, dest_key: String, records: usize },
    ObjectFailed { key: String, error: String },
    RunFinished {
        elapsed: Duration,
        metrics: PipelineMetricsSnapshot,
    },
}

/// Observer hook for pipeline events.
///
/// Called from worker threads; implementations must tolerate concurrent calls.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Real-time counters for one ingestion run.
///
/// Each [`super::IngestionEngine::process`] call owns a fresh set, so concurrent runs on the same
/// engine never see each other's counts.
pub struct PipelineMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    objects_started: AtomicU64,
    objects_skipped: AtomicU64,
    objects_failed: AtomicU64,
    records_decoded: AtomicU64,
    records_accepted: AtomicU64,
    records_dead_lettered: AtomicU64,
    dead_letter_failures: AtomicU64,
    batches_written: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_objects: AtomicUsize,
    max_active_objects: AtomicUsize,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::for_run(0)
    }

    /// Zeroed counters tagged with `run_id`.
    pub fn for_run(run_id: u64) -> Self {
        Self {
            run_id: AtomicU64::new(run_id),
            elapsed_ns: AtomicU64::new(0),
            objects_started: AtomicU64::new(0),
            objects_skipped: AtomicU64::new(0),
            objects_failed: AtomicU64::new(0),
            records_decoded: AtomicU64::new(0),
            records_accepted: AtomicU64::new(0),
            records_dead_lettered: AtomicU64::new(0),
            dead_letter_failures: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_objects: AtomicUsize::new(0),
            max_active_objects: AtomicUsize::new(0),
        }
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(saturating_nanos(elapsed), Ordering::SeqCst);
    }

    pub fn on_object_start(&self) {
        self.objects_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_objects.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_objects.fetch_max(now, Ordering::SeqCst);
    }

    pub fn on_object_end(&self) {
        self.active_objects.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_object_skipped(&self) {
        self.objects_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_object_failed(&self) {
        self.objects_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_records_decoded(&self, n: usize) {
        self.records_decoded.fetch_add(n as u64, Ordering::SeqCst);
    }

    pub fn on_record_accepted(&self) {
        self.records_accepted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_dead_letter(&self, delivered: bool) {
        self.records_dead_lettered.fetch_add(1, Ordering::SeqCst);
        if !delivered {
            self.dead_letter_failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn on_batch_written(&self) {
        self.batches_written.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        self.throttle_wait_ns.fetch_add(saturating_nanos(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        PipelineMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed: (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns)),
            objects_started: self.objects_started.load(Ordering::SeqCst),
            objects_skipped: self.objects_skipped.load(Ordering::SeqCst),
            objects_failed: self.objects_failed.load(Ordering::SeqCst),
            records_decoded: self.records_decoded.load(Ordering::SeqCst),
            records_accepted: self.records_accepted.load(Ordering::SeqCst),
            records_dead_lettered: self.records_dead_lettered.load(Ordering::SeqCst),
            dead_letter_failures: self.dead_letter_failures.load(Ordering::SeqCst),
            batches_written: self.batches_written.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_objects: self.max_active_objects.load(Ordering::SeqCst),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

/// Immutable snapshot of [`PipelineMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub objects_started: u64,
    pub objects_skipped: u64,
    pub objects_failed: u64,
    pub records_decoded: u64,
    pub records_accepted: u64,
    pub records_dead_lettered: u64,
    pub dead_letter_failures: u64,
    pub batches_written: u64,
    pub throttle_wait: Duration,
    pub max_active_objects: usize,
}

impl fmt::Display for PipelineMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, objects={} (skipped={}, failed={}), records decoded={} accepted={} dead_lettered={} (undelivered={}), batches={}, max_active_objects={}, throttle_wait={:?}, elapsed={:?}",
            self.run_id,
            self.objects_started,
            self.objects_skipped,
            self.objects_failed,
            self.records_decoded,
            self.records_accepted,
            self.records_dead_lettered,
            self.dead_letter_failures,
            self.batches_written,
            self.max_active_objects,
            self.throttle_wait,
            self.elapsed
        )
    }
}
