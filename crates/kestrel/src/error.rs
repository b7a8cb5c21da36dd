//
// error.rs
//
// Error taxonomy for analyzer execution. Two outcomes exist: cancellation
// (always swallowed at the point of catch) and fatal analyzer faults
// (reported, propagated to the item boundary, never retried). Failed member
// resolution and missing language services are fallbacks, not errors, and
// never appear here.
//

use thiserror::Error;

/// Outcome of a failed analyzer invocation.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The shutdown/cancellation token was signaled during an analyzer call
    /// or an aggregate wait. The item is abandoned and the tier loop
    /// continues; the next real edit re-enqueues the work organically.
    #[error("analysis canceled")]
    Canceled,

    /// A programming error inside an analyzer. Reported through the fatal
    /// error sink, then propagated to terminate that item's processing.
    /// Never retried: blindly re-running a deterministic analyzer bug would
    /// loop forever.
    #[error("analyzer `{analyzer}` failed")]
    Fatal {
        analyzer: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl AnalysisError {
    pub fn fatal(analyzer: &'static str, source: anyhow::Error) -> Self {
        AnalysisError::Fatal { analyzer, source }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, AnalysisError::Canceled)
    }

    /// Flattens an aggregate of errors from a fanned-out operation.
    ///
    /// An aggregate whose members are all cancellations collapses to
    /// [`AnalysisError::Canceled`]. Any non-cancellation member makes the
    /// whole aggregate fatal, carrying the first such error.
    ///
    /// The scheduler itself invokes analyzers sequentially and never builds
    /// aggregates; this exists for hosts whose analyzer implementations fan
    /// out internally (e.g. `join_all` over sub-passes) and need the same
    /// classification at the join point.
    pub fn from_aggregate(errors: Vec<AnalysisError>) -> AnalysisError {
        debug_assert!(!errors.is_empty(), "empty aggregate");
        errors
            .into_iter()
            .find(|e| !e.is_canceled())
            .unwrap_or(AnalysisError::Canceled)
    }
}

/// Fire-and-forget channel for fatal analyzer faults (crash-report style).
/// Implementations must never block or panic into the caller.
pub trait FatalErrorSink: Send + Sync {
    fn report(&self, analyzer: &str, error: &anyhow::Error);
}

/// Default sink: routes fatal faults to the log.
#[derive(Debug, Default)]
pub struct LogFatalErrorSink;

impl FatalErrorSink for LogFatalErrorSink {
    fn report(&self, analyzer: &str, error: &anyhow::Error) {
        log::error!("analyzer `{}` raised a fatal fault: {:#}", analyzer, error);
    }
}
