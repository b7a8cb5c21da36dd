//
// registry.rs
//
// Materializes and orders the active analyzer set. Providers are supplied
// at construction (explicit registration, no runtime discovery); the built
// ordering is cached per (workspace kind, service set) pair and never
// invalidated within a session.
//

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::analyzer::{Analyzer, AnalyzerProvider};
use crate::host::{ServicesId, WorkspaceKind};

/// One materialized analyzer together with its scheduling flag.
#[derive(Clone)]
pub struct AnalyzerEntry {
    pub analyzer: Arc<dyn Analyzer>,
    pub high_priority_for_active_file: bool,
}

/// Lazily built, append-only analyzer orderings.
pub struct AnalyzerRegistry {
    providers: Vec<Arc<dyn AnalyzerProvider>>,
    cache: Mutex<HashMap<(WorkspaceKind, ServicesId), Arc<[AnalyzerEntry]>>>,
}

impl AnalyzerRegistry {
    pub fn new(providers: Vec<Arc<dyn AnalyzerProvider>>) -> Self {
        Self {
            providers,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The ordered analyzers for a workspace kind and service set, filtered
    /// to the high-priority-for-active-file subset when requested. Order is
    /// registration order and identical across calls for the same key.
    pub fn ordered_analyzers(
        &self,
        kind: WorkspaceKind,
        services: ServicesId,
        only_high_priority: bool,
    ) -> Vec<Arc<dyn Analyzer>> {
        self.entries(kind, services)
            .iter()
            .filter(|entry| !only_high_priority || entry.high_priority_for_active_file)
            .map(|entry| entry.analyzer.clone())
            .collect()
    }

    fn entries(&self, kind: WorkspaceKind, services: ServicesId) -> Arc<[AnalyzerEntry]> {
        // Holding the lock across the build is acceptable: this runs at most
        // a handful of times per process, and it guarantees each provider
        // constructs exactly once per key even under contention.
        let mut cache = self.cache.lock().unwrap();
        cache
            .entry((kind, services))
            .or_insert_with(|| {
                let entries: Vec<AnalyzerEntry> = self
                    .providers
                    .iter()
                    .filter_map(|provider| {
                        provider.create(services).map(|analyzer| AnalyzerEntry {
                            analyzer,
                            high_priority_for_active_file: provider
                                .high_priority_for_active_file(),
                        })
                    })
                    .collect();
                log::info!(
                    "materialized {} analyzers for {:?}/{:?}",
                    entries.len(),
                    kind,
                    services
                );
                entries.into()
            })
            .clone()
    }
}
