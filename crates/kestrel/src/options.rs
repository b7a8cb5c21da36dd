//
// options.rs
//
// Construction-time options for the processor.
//

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tier::TierKind;

/// Scheduler pacing and startup options. Hosts typically deserialize this
/// from editor settings.
///
/// The backoffs are the per-tier debounce windows: no work is dispatched
/// until a tier's queue has been quiescent for its backoff duration. The
/// defaults keep the active-file tier responsive while letting broader work
/// batch aggressively; configurations should preserve
/// `high < normal < low`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorOptions {
    /// Debounce window for the High (active file) tier, in milliseconds.
    pub high_backoff_ms: u64,
    /// Debounce window for the Normal (all open files) tier, in milliseconds.
    pub normal_backoff_ms: u64,
    /// Debounce window for the Low (whole workspace) tier, in milliseconds.
    pub low_backoff_ms: u64,
    /// Defer analyzer materialization and worker startup until the first
    /// enqueue instead of doing both at construction.
    pub initialize_lazily: bool,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            high_backoff_ms: 100,
            normal_backoff_ms: 1500,
            low_backoff_ms: 5000,
            initialize_lazily: false,
        }
    }
}

impl ProcessorOptions {
    pub fn backoff(&self, tier: TierKind) -> Duration {
        let ms = match tier {
            TierKind::High => self.high_backoff_ms,
            TierKind::Normal => self.normal_backoff_ms,
            TierKind::Low => self.low_backoff_ms,
        };
        Duration::from_millis(ms)
    }
}
