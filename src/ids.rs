//! Injected identifier generation for record ids and batch file names.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of random-looking identifiers.
///
/// Suffixes only need negligible collision probability within a batch; they are not secrets.
pub trait IdGenerator: Send + Sync {
    /// Exactly 8 lowercase hex characters.
    fn record_suffix(&self) -> String;

    /// Exactly 32 lowercase hex characters.
    fn batch_id(&self) -> String;
}

/// Identifiers drawn from fresh v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn record_suffix(&self) -> String {
        let mut buf = Uuid::encode_buffer();
        let hex = Uuid::new_v4().simple().encode_lower(&mut buf);
        hex[..8].to_string()
    }

    fn batch_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic counter-based identifiers (`00000001`, `00000002`, ...).
///
/// Record suffixes and batch ids share one counter, so every value handed out is distinct.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Start counting after `start` (the first id is `start + 1`, wrapping to `0` after `u64::MAX`).
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    fn bump(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn record_suffix(&self) -> String {
        format!("{:08x}", self.bump() & 0xffff_ffff)
    }

    fn batch_id(&self) -> String {
        format!("{:032x}", self.bump())
    }
}
