//
// analyzer.rs
//
// The analyzer capability interface. Analyzers are external, pluggable
// inspections of documents and projects; their internals (what diagnostics
// they compute, how) are entirely the host's business. This module defines
// the invocation contract plus the provider and filter types around it.
//

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AnalysisError;
use crate::host::{DocumentSnapshot, ServicesId, SyntaxNode};
use crate::work::{InvocationReasons, ProjectId};

/// A pluggable background analyzer.
///
/// Every callback receives the shutdown cancellation token; a canceled call
/// must surface as [`AnalysisError::Canceled`], never as a fatal fault.
/// Any other error is treated as a programming error in the analyzer.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Stable name, used for logging and fatal-fault reporting.
    fn name(&self) -> &'static str;

    /// Syntax-only analysis of one document.
    async fn analyze_syntax(
        &self,
        document: Arc<dyn DocumentSnapshot>,
        reasons: InvocationReasons,
        token: CancellationToken,
    ) -> Result<(), AnalysisError>;

    /// Semantic analysis of one document. When `member` is `Some`, analysis
    /// is scoped to exactly that method-level member; `None` means the whole
    /// document.
    async fn analyze_document(
        &self,
        document: Arc<dyn DocumentSnapshot>,
        member: Option<Arc<dyn SyntaxNode>>,
        reasons: InvocationReasons,
        token: CancellationToken,
    ) -> Result<(), AnalysisError>;

    /// Project-level analysis for project-keyed work items. Most analyzers
    /// only care about documents.
    async fn analyze_project(
        &self,
        _project: ProjectId,
        _reasons: InvocationReasons,
        _token: CancellationToken,
    ) -> Result<(), AnalysisError> {
        Ok(())
    }

    /// True when the analyzer reacts to the active document switching.
    /// Switching is cheap by contract and must not trigger reanalysis.
    fn handles_active_document_switch(&self) -> bool {
        false
    }

    /// Called instead of the analysis callbacks when the only trigger is an
    /// active-document switch and [`handles_active_document_switch`] is true.
    ///
    /// [`handles_active_document_switch`]: Analyzer::handles_active_document_switch
    async fn active_document_switched(
        &self,
        _document: Arc<dyn DocumentSnapshot>,
        _token: CancellationToken,
    ) -> Result<(), AnalysisError> {
        Ok(())
    }
}

/// Constructs analyzer instances for a service set. Providers may decline
/// (return `None`); declined providers are optional capabilities, silently
/// excluded from the ordering.
pub trait AnalyzerProvider: Send + Sync {
    fn create(&self, services: ServicesId) -> Option<Arc<dyn Analyzer>>;

    /// True when the produced analyzer should also run on the High tier,
    /// which is reserved for active-file work.
    fn high_priority_for_active_file(&self) -> bool {
        false
    }
}

/// A restriction of a work item to a subset of analyzers, compared by
/// instance identity.
#[derive(Clone, Default)]
pub struct AnalyzerFilter {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerFilter {
    pub fn new(analyzers: Vec<Arc<dyn Analyzer>>) -> Self {
        Self { analyzers }
    }

    pub fn contains(&self, analyzer: &Arc<dyn Analyzer>) -> bool {
        self.analyzers.iter().any(|a| Arc::ptr_eq(a, analyzer))
    }

    /// Intersection of two restricted filters.
    pub fn intersect(&self, other: &AnalyzerFilter) -> AnalyzerFilter {
        AnalyzerFilter {
            analyzers: self
                .analyzers
                .iter()
                .filter(|a| other.contains(a))
                .cloned()
                .collect(),
        }
    }

    pub fn analyzers(&self) -> &[Arc<dyn Analyzer>] {
        &self.analyzers
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}

impl fmt::Debug for AnalyzerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.analyzers.iter().map(|a| a.name()))
            .finish()
    }
}
