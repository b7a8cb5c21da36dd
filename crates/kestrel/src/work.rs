//
// work.rs
//
// Work items: the coalesced unit of pending analysis for one document or
// project, plus the identity and reason types they are built from.
//

use bitflags::bitflags;

use crate::analyzer::AnalyzerFilter;

/// Stable identity of a project within the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub u64);

/// Stable identity of a document. A document always belongs to exactly one
/// project, so the identity carries its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId {
    pub project: ProjectId,
    pub document: u64,
}

impl DocumentId {
    pub fn new(project: ProjectId, document: u64) -> Self {
        Self { project, document }
    }
}

/// What a work item is scoped to: exactly one document or one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKey {
    Document(DocumentId),
    Project(ProjectId),
}

impl WorkKey {
    /// The project this work belongs to (its own project for project keys).
    pub fn project(&self) -> ProjectId {
        match self {
            WorkKey::Document(id) => id.project,
            WorkKey::Project(id) => *id,
        }
    }
}

/// Stable structural path to a syntax node: child indices walked from the
/// syntax root. Paths are recorded against one snapshot and resolved later
/// against a possibly newer (but structurally compatible) snapshot, so they
/// must not hold live node references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MemberPath(Vec<u32>);

impl MemberPath {
    pub fn new(steps: Vec<u32>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[u32] {
        &self.0
    }
}

bitflags! {
    /// Why analysis was requested. Multiple edits observed before processing
    /// union their reasons, so this is a set rather than a single value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InvocationReasons: u16 {
        const DOCUMENT_ADDED = 1 << 0;
        const DOCUMENT_REMOVED = 1 << 1;
        const DOCUMENT_OPENED = 1 << 2;
        const DOCUMENT_CLOSED = 1 << 3;
        const SYNTAX_CHANGED = 1 << 4;
        const SEMANTIC_CHANGED = 1 << 5;
        const ACTIVE_DOCUMENT_SWITCHED = 1 << 6;
        const PROJECT_CONFIG_CHANGED = 1 << 7;
    }
}

/// A pending unit of analysis work.
///
/// Work items are plain values: they carry no references back into the
/// scheduler, and each tier queues its own copy. Two items with the same
/// [`WorkKey`] never coexist in one queue; they are merged at enqueue time
/// via [`WorkItem::merge`].
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub key: WorkKey,
    pub reasons: InvocationReasons,
    /// Classification hint; does not affect fan-out.
    pub low_priority: bool,
    /// Scope semantic reanalysis to one method-level member.
    /// `None` means whole document.
    pub active_member: Option<MemberPath>,
    /// Force full reanalysis regardless of reasons.
    pub must_refresh: bool,
    /// Restrict this item to a subset of analyzers. `None` means all
    /// applicable analyzers.
    pub filter: Option<AnalyzerFilter>,
}

impl WorkItem {
    pub fn for_document(id: DocumentId, reasons: InvocationReasons) -> Self {
        Self {
            key: WorkKey::Document(id),
            reasons,
            low_priority: false,
            active_member: None,
            must_refresh: false,
            filter: None,
        }
    }

    pub fn for_project(id: ProjectId, reasons: InvocationReasons) -> Self {
        Self {
            key: WorkKey::Project(id),
            reasons,
            low_priority: false,
            active_member: None,
            must_refresh: false,
            filter: None,
        }
    }

    pub fn with_active_member(mut self, member: MemberPath) -> Self {
        self.active_member = Some(member);
        self
    }

    pub fn with_must_refresh(mut self, must_refresh: bool) -> Self {
        self.must_refresh = must_refresh;
        self
    }

    pub fn with_low_priority(mut self, low_priority: bool) -> Self {
        self.low_priority = low_priority;
        self
    }

    pub fn with_filter(mut self, filter: AnalyzerFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Merges a newer item for the same key into this one.
    ///
    /// - reasons are unioned
    /// - `must_refresh` is ORed
    /// - the active member survives only when both sides agree; conflicting
    ///   member paths force whole-document reanalysis (conservative, not a
    ///   bug: two different method bodies were edited before processing)
    /// - filters intersect when both sides are restricted; if either side is
    ///   unrestricted the merged item is unrestricted
    /// - `low_priority` survives only when both sides are low priority
    pub fn merge(self, newer: WorkItem) -> WorkItem {
        debug_assert_eq!(self.key, newer.key, "merge requires identical keys");

        let active_member = if self.active_member == newer.active_member {
            newer.active_member
        } else {
            None
        };

        let filter = match (self.filter, newer.filter) {
            (Some(a), Some(b)) => Some(a.intersect(&b)),
            _ => None,
        };

        WorkItem {
            key: self.key,
            reasons: self.reasons | newer.reasons,
            low_priority: self.low_priority && newer.low_priority,
            active_member,
            must_refresh: self.must_refresh || newer.must_refresh,
            filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(n: u64) -> DocumentId {
        DocumentId::new(ProjectId(1), n)
    }

    #[test]
    fn test_merge_unions_reasons() {
        let a = WorkItem::for_document(doc(1), InvocationReasons::SYNTAX_CHANGED);
        let b = WorkItem::for_document(doc(1), InvocationReasons::SEMANTIC_CHANGED);
        let merged = a.merge(b);
        assert_eq!(
            merged.reasons,
            InvocationReasons::SYNTAX_CHANGED | InvocationReasons::SEMANTIC_CHANGED
        );
    }

    #[test]
    fn test_merge_ors_must_refresh() {
        let a = WorkItem::for_document(doc(1), InvocationReasons::DOCUMENT_ADDED)
            .with_must_refresh(true);
        let b = WorkItem::for_document(doc(1), InvocationReasons::SYNTAX_CHANGED);
        assert!(a.merge(b).must_refresh);

        let a = WorkItem::for_document(doc(1), InvocationReasons::DOCUMENT_ADDED);
        let b = WorkItem::for_document(doc(1), InvocationReasons::SYNTAX_CHANGED)
            .with_must_refresh(true);
        assert!(a.merge(b).must_refresh);
    }

    #[test]
    fn test_merge_keeps_matching_active_member() {
        let member = MemberPath::new(vec![0, 3, 1]);
        let a = WorkItem::for_document(doc(1), InvocationReasons::SEMANTIC_CHANGED)
            .with_active_member(member.clone());
        let b = WorkItem::for_document(doc(1), InvocationReasons::SEMANTIC_CHANGED)
            .with_active_member(member.clone());
        assert_eq!(a.merge(b).active_member, Some(member));
    }

    #[test]
    fn test_merge_conflicting_active_members_force_whole_document() {
        let a = WorkItem::for_document(doc(1), InvocationReasons::SEMANTIC_CHANGED)
            .with_active_member(MemberPath::new(vec![0, 3, 1]));
        let b = WorkItem::for_document(doc(1), InvocationReasons::SEMANTIC_CHANGED)
            .with_active_member(MemberPath::new(vec![0, 5, 2]));
        assert_eq!(a.merge(b).active_member, None);
    }

    #[test]
    fn test_merge_some_and_none_active_member_forces_whole_document() {
        let a = WorkItem::for_document(doc(1), InvocationReasons::SEMANTIC_CHANGED)
            .with_active_member(MemberPath::new(vec![2]));
        let b = WorkItem::for_document(doc(1), InvocationReasons::SEMANTIC_CHANGED);
        assert_eq!(a.merge(b).active_member, None);
    }

    #[test]
    fn test_merge_unrestricted_filter_wins() {
        use crate::analyzer::AnalyzerFilter;
        let a = WorkItem::for_document(doc(1), InvocationReasons::SYNTAX_CHANGED)
            .with_filter(AnalyzerFilter::new(vec![]));
        let b = WorkItem::for_document(doc(1), InvocationReasons::SYNTAX_CHANGED);
        assert!(a.merge(b).filter.is_none());
    }

    #[test]
    fn test_merge_low_priority_requires_both() {
        let a = WorkItem::for_document(doc(1), InvocationReasons::SYNTAX_CHANGED)
            .with_low_priority(true);
        let b = WorkItem::for_document(doc(1), InvocationReasons::SYNTAX_CHANGED);
        assert!(!a.clone().merge(b).low_priority);

        let c = WorkItem::for_document(doc(1), InvocationReasons::SYNTAX_CHANGED)
            .with_low_priority(true);
        assert!(a.merge(c).low_priority);
    }

    #[test]
    fn test_key_project() {
        assert_eq!(WorkKey::Document(doc(7)).project(), ProjectId(1));
        assert_eq!(WorkKey::Project(ProjectId(9)).project(), ProjectId(9));
    }
}
