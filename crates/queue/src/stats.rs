//! Diagnostic counters shared between the dispatcher and observers

use crate::batch::FlushTrigger;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters written by the dispatcher and read from any thread
#[derive(Debug, Default)]
pub(crate) struct Counters {
    num_timeouts: AtomicU64,
    batches_emitted: AtomicU64,
    items_emitted: AtomicU64,
}

impl Counters {
    /// Account for a sealed batch. Called before the batch is handed to the
    /// consumer, so a consumer holding the batch always sees it counted.
    pub(crate) fn record(&self, trigger: FlushTrigger, len: usize) {
        if trigger == FlushTrigger::Timeout {
            self.num_timeouts.fetch_add(1, Ordering::Relaxed);
        }
        self.batches_emitted.fetch_add(1, Ordering::Relaxed);
        self.items_emitted.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn num_timeouts(&self) -> u64 {
        self.num_timeouts.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> QueueStats {
        QueueStats {
            num_timeouts: self.num_timeouts.load(Ordering::Relaxed),
            batches_emitted: self.batches_emitted.load(Ordering::Relaxed),
            items_emitted: self.items_emitted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a queue's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Batches sealed because the batch timeout elapsed
    pub num_timeouts: u64,
    /// Batches sealed for any reason
    pub batches_emitted: u64,
    /// Items delivered across all sealed batches
    pub items_emitted: u64,
}

impl QueueStats {
    /// Average number of items per sealed batch, or 0 when nothing was sealed
    pub fn mean_batch_size(&self) -> f64 {
        if self.batches_emitted == 0 {
            return 0.0;
        }
        self.items_emitted as f64 / self.batches_emitted as f64
    }
}
