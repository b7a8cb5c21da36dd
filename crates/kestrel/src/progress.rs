//
// progress.rs
//
// Pending-work reporting to the host (e.g. a status bar item). The aggregate
// count is recomputed from the three tier queue depths at every enqueue and
// dequeue boundary rather than incrementally tracked.
//

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Receives the total queued-but-unprocessed item count across all tiers.
/// Implementations must never block the scheduler.
pub trait ProgressReporter: Send + Sync {
    fn update_pending_item_count(&self, count: usize);
}

/// Reporter that drops all updates.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn update_pending_item_count(&self, _count: usize) {}
}

/// Per-tier queue depths plus the reporter they aggregate into.
pub(crate) struct PendingWork {
    depths: [AtomicUsize; 3],
    reporter: Arc<dyn ProgressReporter>,
}

impl PendingWork {
    pub(crate) fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            depths: [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)],
            reporter,
        }
    }

    /// Records one tier's current queue depth and republishes the aggregate.
    pub(crate) fn set_depth(&self, tier: usize, depth: usize) {
        self.depths[tier].store(depth, Ordering::Relaxed);
        self.reporter.update_pending_item_count(self.total());
    }

    pub(crate) fn total(&self) -> usize {
        self.depths.iter().map(|d| d.load(Ordering::Relaxed)).sum()
    }
}
