//! Analyzer runner: executes the applicable analyzer callbacks for one work
//! item against one snapshot, in a fixed category order.
//!
//! # Category order
//! 1. Active-document-switch short-circuit (switching is cheap and must not
//!    trigger reanalysis)
//! 2. Syntax analysis when forced or syntax changed
//! 3. Non-source documents stop after syntax
//! 4. Whole-document semantic analysis when forced or semantics changed
//! 5. Otherwise body-level analysis scoped to the active member, falling
//!    back to whole-document analysis whenever anything is ambiguous
//!
//! Cancellation is checked before each analyzer invocation, never
//! preemptively mid-call. A fatal analyzer fault is reported through the
//! sink and then propagated to terminate the item (the tier loop survives).

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::analyzer::Analyzer;
use crate::error::{AnalysisError, FatalErrorSink};
use crate::host::{DocumentSnapshot, SyntaxNode};
use crate::work::{InvocationReasons, ProjectId, WorkItem};

pub(crate) async fn process_document_analyzers(
    document: Arc<dyn DocumentSnapshot>,
    analyzers: &[Arc<dyn Analyzer>],
    item: &WorkItem,
    token: &CancellationToken,
    sink: &dyn FatalErrorSink,
) -> Result<(), AnalysisError> {
    if item
        .reasons
        .contains(InvocationReasons::ACTIVE_DOCUMENT_SWITCHED)
        && analyzers.iter().any(|a| a.handles_active_document_switch())
    {
        for analyzer in analyzers.iter().filter(|a| a.handles_active_document_switch()) {
            check_canceled(token)?;
            guard(
                analyzer,
                sink,
                analyzer.active_document_switched(document.clone(), token.clone()),
            )
            .await?;
        }
        return Ok(());
    }

    if item.must_refresh || item.reasons.intersects(InvocationReasons::SYNTAX_CHANGED) {
        for analyzer in analyzers {
            check_canceled(token)?;
            guard(
                analyzer,
                sink,
                analyzer.analyze_syntax(document.clone(), item.reasons, token.clone()),
            )
            .await?;
        }
    }

    if !document.is_source() {
        // Semantic analysis is undefined for non-source documents.
        return Ok(());
    }

    if item.must_refresh || item.reasons.intersects(InvocationReasons::SEMANTIC_CHANGED) {
        run_document_analysis(&document, analyzers, item, None, token, sink).await
    } else {
        run_body_analyzers(&document, analyzers, item, token, sink).await
    }
}

/// Project-keyed work items run the analyzers' project callback. The
/// category ordering above does not apply; project analysis is a single
/// category.
pub(crate) async fn process_project_analyzers(
    project: ProjectId,
    analyzers: &[Arc<dyn Analyzer>],
    item: &WorkItem,
    token: &CancellationToken,
    sink: &dyn FatalErrorSink,
) -> Result<(), AnalysisError> {
    for analyzer in analyzers {
        check_canceled(token)?;
        guard(
            analyzer,
            sink,
            analyzer.analyze_project(project, item.reasons, token.clone()),
        )
        .await?;
    }
    Ok(())
}

/// Semantic analysis scoped to the item's active member when that is
/// unambiguously possible, whole-document otherwise.
///
/// Fallback triggers (all conservative, none of them errors): the language
/// has no syntax-facts capability, the document has no syntax, the item has
/// no recorded member, the path fails to resolve against the current tree,
/// or the resolved node is not a method-level member (the edit landed
/// outside any body but may still shift reported positions).
async fn run_body_analyzers(
    document: &Arc<dyn DocumentSnapshot>,
    analyzers: &[Arc<dyn Analyzer>],
    item: &WorkItem,
    token: &CancellationToken,
    sink: &dyn FatalErrorSink,
) -> Result<(), AnalysisError> {
    match resolve_active_member(document, item) {
        Some(member) => {
            run_document_analysis(document, analyzers, item, Some(member), token, sink).await
        }
        None => {
            log::trace!(
                "member-scoped analysis unavailable for {:?}, analyzing whole document",
                document.id()
            );
            run_document_analysis(document, analyzers, item, None, token, sink).await
        }
    }
}

fn resolve_active_member(
    document: &Arc<dyn DocumentSnapshot>,
    item: &WorkItem,
) -> Option<Arc<dyn SyntaxNode>> {
    let facts = document.syntax_facts()?;
    document.syntax_root()?;
    let path = item.active_member.as_ref()?;
    let node = document.resolve_member(path)?;
    facts.is_method_level_member(node.as_ref()).then_some(node)
}

async fn run_document_analysis(
    document: &Arc<dyn DocumentSnapshot>,
    analyzers: &[Arc<dyn Analyzer>],
    item: &WorkItem,
    member: Option<Arc<dyn SyntaxNode>>,
    token: &CancellationToken,
    sink: &dyn FatalErrorSink,
) -> Result<(), AnalysisError> {
    for analyzer in analyzers {
        check_canceled(token)?;
        guard(
            analyzer,
            sink,
            analyzer.analyze_document(document.clone(), member.clone(), item.reasons, token.clone()),
        )
        .await?;
    }
    Ok(())
}

fn check_canceled(token: &CancellationToken) -> Result<(), AnalysisError> {
    if token.is_cancelled() {
        Err(AnalysisError::Canceled)
    } else {
        Ok(())
    }
}

/// Runs one analyzer callback and applies the failure policy: cancellations
/// pass through untouched, anything else is reported to the fatal sink and
/// re-raised with the analyzer's name attached.
async fn guard<F>(
    analyzer: &Arc<dyn Analyzer>,
    sink: &dyn FatalErrorSink,
    call: F,
) -> Result<(), AnalysisError>
where
    F: Future<Output = Result<(), AnalysisError>>,
{
    match call.await {
        Ok(()) => Ok(()),
        Err(AnalysisError::Canceled) => Err(AnalysisError::Canceled),
        Err(AnalysisError::Fatal { source, .. }) => {
            sink.report(analyzer.name(), &source);
            Err(AnalysisError::Fatal {
                analyzer: analyzer.name(),
                source,
            })
        }
    }
}
