use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility. Cloning shares the
/// underlying values.
#[derive(Clone, Default)]
pub struct Counters {
    pub symbols_processed: Arc<AtomicU64>,
    pub symbols_skipped: Arc<AtomicU64>,
    pub symbols_failed: Arc<AtomicU64>,

    pub intervals_no_data: Arc<AtomicU64>,
    pub signals: Arc<AtomicU64>,

    pub messages_enqueued: Arc<AtomicU64>,
    pub messages_discarded: Arc<AtomicU64>,
    pub messages_delivered: Arc<AtomicU64>,
    pub messages_undeliverable: Arc<AtomicU64>,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CountersSnapshot {
            symbols_processed: load(&self.symbols_processed),
            symbols_skipped: load(&self.symbols_skipped),
            symbols_failed: load(&self.symbols_failed),
            intervals_no_data: load(&self.intervals_no_data),
            signals: load(&self.signals),
            messages_enqueued: load(&self.messages_enqueued),
            messages_discarded: load(&self.messages_discarded),
            messages_delivered: load(&self.messages_delivered),
            messages_undeliverable: load(&self.messages_undeliverable),
        }
    }
}

/// Point-in-time copy of [`Counters`], logged at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub symbols_processed: u64,
    pub symbols_skipped: u64,
    pub symbols_failed: u64,
    pub intervals_no_data: u64,
    pub signals: u64,
    pub messages_enqueued: u64,
    pub messages_discarded: u64,
    pub messages_delivered: u64,
    pub messages_undeliverable: u64,
}
