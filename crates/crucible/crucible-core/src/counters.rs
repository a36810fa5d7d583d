use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative transfer counters shared by every role in one run.
///
/// Each role bumps its side once per successful operation. The coordinator
/// reads the totals only after joining all role threads, so `Relaxed` is
/// enough; the joins order the loads after every store.
#[derive(Debug, Default)]
pub struct TransferCounters {
    inserted: AtomicU64,
    removed: AtomicU64,
}

impl TransferCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_insert(&self) {
        self.inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remove(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inserted(&self) -> u64 {
        self.inserted.load(Ordering::Relaxed)
    }

    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }
}
