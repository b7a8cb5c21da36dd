//! Priority-tiered incremental background analysis scheduler for
//! language-service hosts.
//!
//! Hosts hand the processor small value-typed work items describing what
//! changed (a document edit, a project configuration change, an active
//! document switch); the processor coalesces duplicate work per key, fans
//! every item out to three independently debounced priority tiers, and runs
//! the registered analyzers against host-supplied document snapshots in a
//! fixed category order. Analysis failures are reported and swallowed; the
//! scheduler itself never stops on analyzer errors.
//!
//! The host integrates by implementing [`WorkspaceHost`] (snapshot access)
//! and [`Analyzer`] (the analysis passes), then driving
//! [`AnalysisProcessor::enqueue`] from its change notifications.

pub mod analyzer;
pub mod error;
pub mod host;
pub mod options;
pub mod processor;
pub mod progress;
pub mod registry;
pub mod telemetry;
pub mod tier;
pub mod work;

mod queue;
mod runner;

pub use analyzer::{Analyzer, AnalyzerFilter, AnalyzerProvider};
pub use error::{AnalysisError, FatalErrorSink, LogFatalErrorSink};
pub use host::{
    DocumentSnapshot, ProjectCacheScope, ServicesId, SyntaxFacts, SyntaxNode, WorkspaceHost,
    WorkspaceKind,
};
pub use options::ProcessorOptions;
pub use processor::{AnalysisProcessor, TestAccessor};
pub use progress::{NullProgress, ProgressReporter};
pub use registry::{AnalyzerEntry, AnalyzerRegistry};
pub use telemetry::{AnalysisTelemetry, MetricKey};
pub use tier::TierKind;
pub use work::{DocumentId, InvocationReasons, MemberPath, ProjectId, WorkItem, WorkKey};
