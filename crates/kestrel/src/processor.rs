//
// processor.rs
//
// The public face of the scheduler: fans incoming work out to the three
// priority tiers, materializes analyzers on first use, and owns shutdown.
//

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::analyzer::Analyzer;
use crate::error::{FatalErrorSink, LogFatalErrorSink};
use crate::host::WorkspaceHost;
use crate::options::ProcessorOptions;
use crate::progress::{NullProgress, PendingWork, ProgressReporter};
use crate::registry::AnalyzerRegistry;
use crate::telemetry::{metric, AnalysisTelemetry, MetricKey};
use crate::tier::{Tier, TierKind};
use crate::work::{WorkItem, WorkKey};

/// Concurrent incremental analysis scheduler.
///
/// Every enqueued item is cloned to all three tiers; each tier merges it
/// into its own queue and processes it on its own debounced cadence against
/// its own analyzer subset. Items are values, so a tier's copy is unaffected
/// by what the other tiers do with theirs.
///
/// Unless [`ProcessorOptions::initialize_lazily`] is set, construction
/// materializes the analyzer set and spawns the tier workers, so the
/// processor must be built inside a tokio runtime.
pub struct AnalysisProcessor {
    tiers: [Arc<Tier>; 3],
    registry: Arc<AnalyzerRegistry>,
    host: Arc<dyn WorkspaceHost>,
    pending: Arc<PendingWork>,
    telemetry: Arc<AnalysisTelemetry>,
    shutdown: CancellationToken,
    initialized: AtomicBool,
}

impl AnalysisProcessor {
    pub fn new(
        host: Arc<dyn WorkspaceHost>,
        registry: Arc<AnalyzerRegistry>,
        options: ProcessorOptions,
    ) -> Self {
        Self::with_sinks(
            host,
            registry,
            options,
            Arc::new(NullProgress),
            Arc::new(LogFatalErrorSink),
        )
    }

    /// Full constructor for hosts that surface progress and fatal errors
    /// through their own channels.
    pub fn with_sinks(
        host: Arc<dyn WorkspaceHost>,
        registry: Arc<AnalyzerRegistry>,
        options: ProcessorOptions,
        progress: Arc<dyn ProgressReporter>,
        fatal_sink: Arc<dyn FatalErrorSink>,
    ) -> Self {
        let pending = Arc::new(PendingWork::new(progress));
        let telemetry = Arc::new(AnalysisTelemetry::new());
        let shutdown = CancellationToken::new();

        let tiers = TierKind::ALL.map(|kind| {
            Tier::new(
                kind,
                options.backoff(kind),
                host.clone(),
                pending.clone(),
                telemetry.clone(),
                fatal_sink.clone(),
                shutdown.child_token(),
            )
        });

        let processor = Self {
            tiers,
            registry,
            host,
            pending,
            telemetry,
            shutdown,
            initialized: AtomicBool::new(false),
        };
        if !options.initialize_lazily {
            processor.ensure_initialized();
        }
        processor
    }

    /// Queues analysis work. The item fans out to all three tiers; tiers
    /// with no applicable analyzer drain it as a no-op. Enqueues after
    /// shutdown are silently dropped.
    pub fn enqueue(&self, item: WorkItem) {
        if self.shutdown.is_cancelled() {
            log::trace!("processor: dropping enqueue after shutdown");
            return;
        }
        self.ensure_initialized();
        self.telemetry.increment(MetricKey::Name(metric::ENQUEUES));
        for tier in &self.tiers {
            tier.enqueue(item.clone());
        }
    }

    /// Appends an analyzer to the live set outside the provider path. It
    /// joins the Normal and Low tiers, plus High when flagged; items already
    /// queued see it on their next dispatch.
    pub fn add_analyzer(&self, analyzer: Arc<dyn Analyzer>, high_priority_for_active_file: bool) {
        for tier in &self.tiers {
            if tier.kind() == TierKind::High && !high_priority_for_active_file {
                continue;
            }
            tier.add_analyzer(analyzer.clone());
        }
    }

    /// Total queued-but-unprocessed items across all tiers.
    pub fn pending_item_count(&self) -> usize {
        self.pending.total()
    }

    pub fn telemetry(&self) -> &AnalysisTelemetry {
        &self.telemetry
    }

    /// Stops accepting work, cancels in-flight analysis, and resolves once
    /// every tier worker has exited. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        for tier in &self.tiers {
            tier.shutdown().await;
        }
        self.telemetry.log_summary();
    }

    /// Completion waiting for tests and host teardown paths.
    pub fn test_accessor(&self) -> TestAccessor<'_> {
        TestAccessor { processor: self }
    }

    fn ensure_initialized(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let kind = self.host.workspace_kind();
        let services = self.host.services_id();
        for tier in &self.tiers {
            let analyzers = self.registry.ordered_analyzers(
                kind,
                services,
                tier.kind() == TierKind::High,
            );
            for analyzer in analyzers {
                tier.add_analyzer(analyzer);
            }
            tier.ensure_started();
        }
        log::info!("analysis processor initialized for {:?}/{:?}", kind, services);
    }
}

/// Borrowed view exposing completion waits. Production callers drive the
/// processor through enqueue alone; draining to quiescence is a test and
/// teardown concern.
pub struct TestAccessor<'a> {
    processor: &'a AnalysisProcessor,
}

impl TestAccessor<'_> {
    /// Resolves once every tier is idle: nothing queued, nothing in flight.
    pub async fn wait_until_completion(&self) {
        for tier in &self.processor.tiers {
            tier.wait_until_idle().await;
        }
    }

    /// Resolves once none of the given keys is queued or in flight in any
    /// tier. Unlike [`Self::wait_until_completion`], work for other keys may
    /// still be pending when this returns.
    pub async fn wait_until_completion_for(&self, keys: &[WorkKey]) {
        for tier in &self.processor.tiers {
            tier.wait_until_processed(keys).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{DocumentSnapshot, ServicesId, WorkspaceKind};
    use crate::work::{DocumentId, InvocationReasons, ProjectId};

    struct EmptyHost;

    impl WorkspaceHost for EmptyHost {
        fn workspace_kind(&self) -> WorkspaceKind {
            WorkspaceKind::Host
        }

        fn services_id(&self) -> ServicesId {
            ServicesId(0)
        }

        fn document(&self, _id: DocumentId) -> Option<Arc<dyn DocumentSnapshot>> {
            None
        }
    }

    fn slow_options() -> ProcessorOptions {
        // Backoffs long enough that nothing drains during the test body.
        ProcessorOptions {
            high_backoff_ms: 60_000,
            normal_backoff_ms: 60_000,
            low_backoff_ms: 60_000,
            initialize_lazily: false,
        }
    }

    #[tokio::test]
    async fn test_enqueue_fans_out_to_every_tier() {
        let processor = AnalysisProcessor::new(
            Arc::new(EmptyHost),
            Arc::new(AnalyzerRegistry::new(vec![])),
            slow_options(),
        );

        processor.enqueue(WorkItem::for_document(
            DocumentId::new(ProjectId(1), 1),
            InvocationReasons::SYNTAX_CHANGED,
        ));

        assert_eq!(processor.pending_item_count(), 3);
        processor.shutdown().await;
    }

    #[tokio::test]
    async fn test_merged_enqueues_count_once_per_tier() {
        let processor = AnalysisProcessor::new(
            Arc::new(EmptyHost),
            Arc::new(AnalyzerRegistry::new(vec![])),
            slow_options(),
        );

        let id = DocumentId::new(ProjectId(1), 1);
        processor.enqueue(WorkItem::for_document(id, InvocationReasons::SYNTAX_CHANGED));
        processor.enqueue(WorkItem::for_document(id, InvocationReasons::SEMANTIC_CHANGED));

        assert_eq!(processor.pending_item_count(), 3);
        assert_eq!(
            processor.telemetry().counter(MetricKey::Name(metric::ENQUEUES)),
            2
        );
        processor.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_dropped() {
        let processor = AnalysisProcessor::new(
            Arc::new(EmptyHost),
            Arc::new(AnalyzerRegistry::new(vec![])),
            slow_options(),
        );
        processor.shutdown().await;
        processor.shutdown().await; // idempotent

        processor.enqueue(WorkItem::for_document(
            DocumentId::new(ProjectId(1), 1),
            InvocationReasons::SYNTAX_CHANGED,
        ));
        assert_eq!(processor.pending_item_count(), 0);
    }

    #[tokio::test]
    async fn test_lazy_initialization_defers_until_first_enqueue() {
        let mut options = slow_options();
        options.initialize_lazily = true;
        let processor = AnalysisProcessor::new(
            Arc::new(EmptyHost),
            Arc::new(AnalyzerRegistry::new(vec![])),
            options,
        );
        assert!(!processor.initialized.load(Ordering::SeqCst));

        processor.enqueue(WorkItem::for_project(
            ProjectId(1),
            InvocationReasons::PROJECT_CONFIG_CHANGED,
        ));
        assert!(processor.initialized.load(Ordering::SeqCst));
        processor.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_until_completion_with_no_work() {
        let processor = AnalysisProcessor::new(
            Arc::new(EmptyHost),
            Arc::new(AnalyzerRegistry::new(vec![])),
            slow_options(),
        );
        processor.test_accessor().wait_until_completion().await;
        processor.shutdown().await;
    }
}
