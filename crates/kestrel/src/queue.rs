//
// queue.rs
//
// Ordered, deduplicating merge queue for one tier.
//

use indexmap::IndexMap;

use crate::work::{WorkItem, WorkKey};

/// One tier's pending work, FIFO by first insertion.
///
/// At most one live entry exists per [`WorkKey`]. Enqueuing a key that is
/// already queued merges the new item into the existing entry and keeps the
/// entry's original queue slot; it does not move the entry to the back.
/// That way a document that keeps being edited keeps its place in line
/// instead of perpetually starving itself behind newer keys.
#[derive(Debug, Default)]
pub struct WorkQueue {
    entries: IndexMap<WorkKey, WorkItem>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or merges an item. Returns true when the key was newly inserted,
    /// false when it merged into an existing entry.
    pub fn enqueue(&mut self, item: WorkItem) -> bool {
        match self.entries.get_mut(&item.key) {
            Some(existing) => {
                let merged = existing.clone().merge(item);
                *existing = merged;
                false
            }
            None => {
                self.entries.insert(item.key, item);
                true
            }
        }
    }

    /// Removes and returns the oldest entry.
    pub fn pop_front(&mut self) -> Option<WorkItem> {
        self.entries.shift_remove_index(0).map(|(_, item)| item)
    }

    pub fn contains(&self, key: &WorkKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::{DocumentId, InvocationReasons, ProjectId};

    fn doc_item(n: u64, reasons: InvocationReasons) -> WorkItem {
        WorkItem::for_document(DocumentId::new(ProjectId(1), n), reasons)
    }

    #[test]
    fn test_enqueue_dedups_per_key() {
        let mut queue = WorkQueue::new();
        assert!(queue.enqueue(doc_item(1, InvocationReasons::SYNTAX_CHANGED)));
        assert!(!queue.enqueue(doc_item(1, InvocationReasons::SEMANTIC_CHANGED)));
        assert_eq!(queue.len(), 1);

        let merged = queue.pop_front().unwrap();
        assert_eq!(
            merged.reasons,
            InvocationReasons::SYNTAX_CHANGED | InvocationReasons::SEMANTIC_CHANGED
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_front_is_fifo() {
        let mut queue = WorkQueue::new();
        queue.enqueue(doc_item(1, InvocationReasons::SYNTAX_CHANGED));
        queue.enqueue(doc_item(2, InvocationReasons::SYNTAX_CHANGED));
        queue.enqueue(doc_item(3, InvocationReasons::SYNTAX_CHANGED));

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_front())
            .map(|item| item.key)
            .collect();
        assert_eq!(
            order,
            vec![
                doc_item(1, InvocationReasons::empty()).key,
                doc_item(2, InvocationReasons::empty()).key,
                doc_item(3, InvocationReasons::empty()).key,
            ]
        );
    }

    #[test]
    fn queue_merge_keeps_original_slot() {
        // The tie-break: merging an already-queued key must not move the
        // entry to the back of the queue.
        let mut queue = WorkQueue::new();
        queue.enqueue(doc_item(1, InvocationReasons::SYNTAX_CHANGED));
        queue.enqueue(doc_item(2, InvocationReasons::SYNTAX_CHANGED));
        queue.enqueue(doc_item(1, InvocationReasons::SEMANTIC_CHANGED));

        let first = queue.pop_front().unwrap();
        assert_eq!(first.key, doc_item(1, InvocationReasons::empty()).key);
        assert_eq!(
            first.reasons,
            InvocationReasons::SYNTAX_CHANGED | InvocationReasons::SEMANTIC_CHANGED
        );

        let second = queue.pop_front().unwrap();
        assert_eq!(second.key, doc_item(2, InvocationReasons::empty()).key);
    }

    #[test]
    fn test_contains() {
        let mut queue = WorkQueue::new();
        let item = doc_item(1, InvocationReasons::SYNTAX_CHANGED);
        let key = item.key;
        queue.enqueue(item);
        assert!(queue.contains(&key));
        queue.pop_front();
        assert!(!queue.contains(&key));
    }
}
