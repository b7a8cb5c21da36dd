//! One priority tier's background processing loop.
//!
//! Each tier owns its own queue copy, its own analyzer list, and its own
//! worker task. The loop cycles Idle → Waiting(debounce) → Draining → Idle:
//! it sleeps until work arrives, then waits for the queue to go quiescent
//! for the tier's backoff duration (every new enqueue restarts the window,
//! so rapid typing coalesces into one flush), then drains FIFO with no
//! further debounce between items. A failure processing one item never
//! stops the loop.
//!
//! Tiers never block each other: a slow Low-tier analyzer cannot delay
//! High-tier responsiveness, and no ordering holds across tiers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::analyzer::Analyzer;
use crate::error::{AnalysisError, FatalErrorSink};
use crate::host::{ProjectCacheScope, WorkspaceHost};
use crate::progress::PendingWork;
use crate::queue::WorkQueue;
use crate::runner;
use crate::telemetry::{metric, AnalysisTelemetry, MetricKey};
use crate::work::{ProjectId, WorkItem, WorkKey};

/// The three priority tiers. Every work item fans out to all three; each
/// tier decides independently (via its analyzer set) what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// Active-file work. Only analyzers flagged high-priority-for-active-file.
    High,
    /// All open files.
    Normal,
    /// Whole-workspace background work.
    Low,
}

impl TierKind {
    pub const ALL: [TierKind; 3] = [TierKind::High, TierKind::Normal, TierKind::Low];

    pub(crate) fn index(self) -> usize {
        match self {
            TierKind::High => 0,
            TierKind::Normal => 1,
            TierKind::Low => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TierKind::High => "high",
            TierKind::Normal => "normal",
            TierKind::Low => "low",
        }
    }
}

pub(crate) struct Tier {
    kind: TierKind,
    backoff: Duration,
    queue: Mutex<WorkQueue>,
    /// Live analyzer set in registration order; append-only, deduplicated.
    analyzers: Mutex<Vec<Arc<dyn Analyzer>>>,
    /// Wakes the worker on enqueue; a pending permit restarts the debounce
    /// window while Waiting.
    wake: Notify,
    /// Bumped on every queue or in-flight transition so completion waiters
    /// can re-check their condition without polling.
    epoch: watch::Sender<u64>,
    in_flight: Mutex<Option<WorkKey>>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    host: Arc<dyn WorkspaceHost>,
    pending: Arc<PendingWork>,
    telemetry: Arc<AnalysisTelemetry>,
    fatal_sink: Arc<dyn FatalErrorSink>,
}

impl Tier {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        kind: TierKind,
        backoff: Duration,
        host: Arc<dyn WorkspaceHost>,
        pending: Arc<PendingWork>,
        telemetry: Arc<AnalysisTelemetry>,
        fatal_sink: Arc<dyn FatalErrorSink>,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let (epoch, _) = watch::channel(0);
        Arc::new(Self {
            kind,
            backoff,
            queue: Mutex::new(WorkQueue::new()),
            analyzers: Mutex::new(Vec::new()),
            wake: Notify::new(),
            epoch,
            in_flight: Mutex::new(None),
            shutdown,
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
            host,
            pending,
            telemetry,
            fatal_sink,
        })
    }

    pub(crate) fn kind(&self) -> TierKind {
        self.kind
    }

    /// Spawns the worker task. Idempotent; must run inside a tokio runtime.
    pub(crate) fn ensure_started(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let tier = Arc::clone(self);
        *self.worker.lock().unwrap() = Some(tokio::spawn(tier.run()));
    }

    /// Adds or merges an item into this tier's queue and pokes the worker.
    /// Enqueues after shutdown are dropped.
    pub(crate) fn enqueue(&self, item: WorkItem) {
        if self.shutdown.is_cancelled() {
            log::trace!("{} tier: dropping enqueue after shutdown", self.kind.label());
            return;
        }
        let (inserted, depth) = {
            let mut queue = self.queue.lock().unwrap();
            let inserted = queue.enqueue(item);
            (inserted, queue.len())
        };
        if !inserted {
            self.telemetry
                .increment(MetricKey::Tagged(metric::QUEUE_MERGES, self.kind.index() as u64));
        }
        self.pending.set_depth(self.kind.index(), depth);
        self.bump_epoch();
        self.wake.notify_one();
    }

    /// Appends an analyzer to the live set (deduplicated by identity).
    pub(crate) fn add_analyzer(&self, analyzer: Arc<dyn Analyzer>) {
        let mut analyzers = self.analyzers.lock().unwrap();
        if !analyzers.iter().any(|a| Arc::ptr_eq(a, &analyzer)) {
            analyzers.push(analyzer);
        }
    }

    #[cfg(test)]
    pub(crate) fn queue_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Cancels the loop and resolves once the worker task has actually
    /// exited, not merely been asked to.
    pub(crate) async fn shutdown(&self) {
        self.shutdown.cancel();
        self.wake.notify_one();
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    log::warn!("{} tier worker panicked: {}", self.kind.label(), err);
                }
            }
        }
        self.bump_epoch();
    }

    /// Resolves once this tier has no queued and no in-flight work.
    pub(crate) async fn wait_until_idle(&self) {
        let mut rx = self.epoch.subscribe();
        loop {
            if self.is_idle() || self.shutdown.is_cancelled() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Resolves once none of the given keys is queued or in flight here.
    pub(crate) async fn wait_until_processed(&self, keys: &[WorkKey]) {
        let mut rx = self.epoch.subscribe();
        loop {
            if self.keys_done(keys) || self.shutdown.is_cancelled() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.queue.lock().unwrap().is_empty() && self.in_flight.lock().unwrap().is_none()
    }

    fn keys_done(&self, keys: &[WorkKey]) -> bool {
        let queue = self.queue.lock().unwrap();
        let in_flight = self.in_flight.lock().unwrap();
        keys.iter()
            .all(|key| !queue.contains(key) && in_flight.as_ref() != Some(key))
    }

    fn bump_epoch(&self) {
        self.epoch.send_modify(|e| *e += 1);
    }

    async fn run(self: Arc<Self>) {
        log::info!("{} tier worker started", self.kind.label());
        'outer: loop {
            // Idle: sleep until work arrives. Stale wake permits from
            // enqueues observed during a drain pass fall out here because
            // the queue is re-checked after every wakeup.
            while self.queue.lock().unwrap().is_empty() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break 'outer,
                    _ = self.wake.notified() => {}
                }
            }

            // Waiting: hold off until the queue has been quiescent for the
            // backoff duration. Every enqueue restarts the window.
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break 'outer,
                    _ = self.wake.notified() => continue,
                    _ = tokio::time::sleep(self.backoff) => break,
                }
            }

            self.drain().await;
        }
        log::info!("{} tier worker stopped", self.kind.label());
        self.bump_epoch();
    }

    /// Pops and processes items FIFO until the queue is empty. One project's
    /// cache handle is held at a time and swapped when the item's project
    /// changes; it is released when the pass ends, failure included.
    async fn drain(&self) {
        let mut project_cache: Option<(ProjectId, Box<dyn ProjectCacheScope>)> = None;

        while !self.shutdown.is_cancelled() {
            // The pop and the in-flight handoff happen under both locks
            // (same order as `keys_done`) so a completion waiter can never
            // observe the key as neither queued nor in flight while it is
            // still unprocessed.
            let (item, depth) = {
                let mut queue = self.queue.lock().unwrap();
                let mut in_flight = self.in_flight.lock().unwrap();
                let item = queue.pop_front();
                if let Some(item) = &item {
                    *in_flight = Some(item.key);
                }
                (item, queue.len())
            };
            let Some(item) = item else {
                break;
            };
            self.pending.set_depth(self.kind.index(), depth);
            self.bump_epoch();

            let project = item.key.project();
            if project_cache.as_ref().map(|(p, _)| *p) != Some(project) {
                project_cache = self
                    .host
                    .open_project_cache(project)
                    .map(|scope| (project, scope));
            }

            let started = Instant::now();
            let result = self.process_item(&item).await;
            let tag = self.kind.index() as u64;
            self.telemetry
                .record_duration(MetricKey::Tagged(metric::ITEM_DURATION_MS, tag), started.elapsed());
            self.telemetry
                .increment(MetricKey::Tagged(metric::ITEMS_PROCESSED, tag));

            match result {
                Ok(()) => {}
                Err(AnalysisError::Canceled) => {
                    log::trace!(
                        "{} tier: work for {:?} canceled",
                        self.kind.label(),
                        item.key
                    );
                    self.telemetry
                        .increment(MetricKey::Tagged(metric::ITEMS_CANCELED, tag));
                }
                Err(error @ AnalysisError::Fatal { .. }) => {
                    // Already reported through the fatal sink at the point
                    // of failure; the loop moves on to the next item.
                    log::error!(
                        "{} tier: work for {:?} failed: {:#}",
                        self.kind.label(),
                        item.key,
                        anyhow::Error::from(error)
                    );
                    self.telemetry
                        .increment(MetricKey::Tagged(metric::ITEM_FAILURES, tag));
                }
            }

            *self.in_flight.lock().unwrap() = None;
            self.bump_epoch();
        }

        // Released unconditionally when the batch completes.
        drop(project_cache);
    }

    async fn process_item(&self, item: &WorkItem) -> Result<(), AnalysisError> {
        let analyzers = self.applicable_analyzers(item);
        if analyzers.is_empty() {
            return Ok(());
        }

        match item.key {
            WorkKey::Document(id) => {
                let Some(document) = self.host.document(id) else {
                    log::trace!(
                        "{} tier: document {:?} no longer in workspace, skipping",
                        self.kind.label(),
                        id
                    );
                    return Ok(());
                };
                runner::process_document_analyzers(
                    document,
                    &analyzers,
                    item,
                    &self.shutdown,
                    self.fatal_sink.as_ref(),
                )
                .await
            }
            WorkKey::Project(id) => {
                runner::process_project_analyzers(
                    id,
                    &analyzers,
                    item,
                    &self.shutdown,
                    self.fatal_sink.as_ref(),
                )
                .await
            }
        }
    }

    /// The item's analyzer filter applied against this tier's analyzer set;
    /// an unrestricted item runs against the full set.
    fn applicable_analyzers(&self, item: &WorkItem) -> Vec<Arc<dyn Analyzer>> {
        let analyzers = self.analyzers.lock().unwrap();
        match &item.filter {
            Some(filter) => analyzers
                .iter()
                .filter(|a| filter.contains(a))
                .cloned()
                .collect(),
            None => analyzers.clone(),
        }
    }
}
