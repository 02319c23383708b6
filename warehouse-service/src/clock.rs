//! Injected time source and invoice number generation.
//!
//! Every date stamp and invoice number the engine produces flows through a
//! [`Clock`], so operations are deterministic under test.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

/// Source of "now" for date stamps and invoice numbers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed-instant clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Generates invoice numbers of the form `FV-<timestamp>-<seq>`.
///
/// The timestamp makes numbers collision resistant across process restarts,
/// the process-local sequence makes them monotonic within a run, and the
/// UNIQUE column constraint is the final backstop.
#[derive(Debug)]
pub struct InvoiceNumberGenerator {
    seq: AtomicU64,
}

impl InvoiceNumberGenerator {
    pub fn new() -> Self {
        Self {
            seq: AtomicU64::new(1),
        }
    }

    pub fn next(&self, now: DateTime<Utc>) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("FV-{}-{:04}", now.format("%Y%m%d%H%M%S"), n)
    }
}

impl Default for InvoiceNumberGenerator {
    fn default() -> Self {
        Self::new()
    }
}
