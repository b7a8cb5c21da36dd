//
// host.rs
//
// Contracts the scheduler consumes from its host: workspace snapshots,
// opaque syntax nodes, language capabilities, and the project-scope cache.
// The scheduler never inspects document contents; everything concrete lives
// behind these traits.
//

use std::any::Any;
use std::sync::Arc;

use crate::work::{DocumentId, MemberPath, ProjectId};

/// The kind of workspace the host is running in. Part of the analyzer
/// registry cache key because hosts materialize different analyzer sets for
/// different workspace kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkspaceKind {
    /// A full host workspace (the normal case).
    Host,
    /// An interactive/REPL-style workspace.
    Interactive,
    /// Loose files without project context.
    Miscellaneous,
}

/// Identity of the host's language-service set. Two hosts (or two sessions
/// of one host) with different service sets produce different analyzer
/// orderings, so this participates in the registry cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServicesId(pub u64);

/// An opaque syntax node owned by the host's immutable syntax tree.
///
/// `as_any` exists so host-side capabilities (e.g. [`SyntaxFacts`]) can
/// recover their concrete node type.
pub trait SyntaxNode: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Language-specific structural knowledge.
pub trait SyntaxFacts: Send + Sync {
    /// True when the node is a method-level member: a body that can be
    /// re-analyzed in isolation from the rest of its document.
    fn is_method_level_member(&self, node: &dyn SyntaxNode) -> bool;
}

/// An immutable snapshot of one document.
pub trait DocumentSnapshot: Send + Sync {
    fn id(&self) -> DocumentId;

    /// False for non-source text documents. Semantic analysis is undefined
    /// for those; processing stops after syntax analysis.
    fn is_source(&self) -> bool;

    /// The current syntax root, if the document has syntax at all.
    fn syntax_root(&self) -> Option<Arc<dyn SyntaxNode>>;

    /// Resolves a stable structural path against the current root. `None`
    /// when the path no longer resolves (the tree changed shape).
    fn resolve_member(&self, path: &MemberPath) -> Option<Arc<dyn SyntaxNode>>;

    /// The language's syntax-facts capability, if it has one.
    fn syntax_facts(&self) -> Option<Arc<dyn SyntaxFacts>>;
}

/// Handle to a project's warmed-up analysis state. Dropping the handle
/// releases the cache; the scheduler guarantees the drop happens when the
/// batch that opened it completes, including on failure.
pub trait ProjectCacheScope: Send {}

/// The workspace the scheduler pulls snapshots from.
pub trait WorkspaceHost: Send + Sync {
    fn workspace_kind(&self) -> WorkspaceKind;

    fn services_id(&self) -> ServicesId;

    /// Current snapshot for a document. `None` when the document has been
    /// removed since the work item was enqueued; the item is then skipped.
    fn document(&self, id: DocumentId) -> Option<Arc<dyn DocumentSnapshot>>;

    /// Opens the project-scope cache for a run of work items in one project.
    /// Hosts without project-level caching return `None`.
    fn open_project_cache(&self, _project: ProjectId) -> Option<Box<dyn ProjectCacheScope>> {
        None
    }
}
