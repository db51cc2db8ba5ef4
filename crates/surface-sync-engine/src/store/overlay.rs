use std::collections::{HashMap, HashSet};

use crate::model::{Annotation, LogicalNode, NodeId, Schema};
use crate::store::NodeStore;

/// Prior values of everything one operation touched.
///
/// Restoring a journal puts every recorded node back exactly as it was
/// (`None` deletes nodes the operation created).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Journal {
    pub nodes: Vec<(NodeId, Option<LogicalNode>)>,
    pub annotations: Option<Vec<Annotation>>,
    seen: HashSet<NodeId>,
}

impl Journal {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.annotations.is_none()
    }
}

/// Pending writes of a transaction, detached from the base store borrow.
#[derive(Debug, Default)]
pub struct OverlayChanges {
    nodes: HashMap<NodeId, Option<LogicalNode>>,
    annotations: Option<Vec<Annotation>>,
}

impl OverlayChanges {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.annotations.is_none()
    }

    /// Writes the buffered changes through to `store`.
    pub fn apply_to<S: NodeStore + ?Sized>(self, store: &mut S) {
        for (id, node) in self.nodes {
            match node {
                Some(node) => store.put_node(node),
                None => {
                    store.delete_node(&id);
                }
            }
        }
        if let Some(annotations) = self.annotations {
            store.set_annotations(annotations);
        }
    }
}

/// Copy-on-write view over a base store.
///
/// Reads fall through to the base; writes stay in the overlay until
/// [`Overlay::into_changes`] hands them to the committer. Dropping the
/// overlay is the rollback.
pub struct Overlay<'a, S: NodeStore + ?Sized> {
    base: &'a S,
    changes: HashMap<NodeId, Option<LogicalNode>>,
    annotations: Option<Vec<Annotation>>,
    journal: Option<Journal>,
}

impl<'a, S: NodeStore + ?Sized> Overlay<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self {
            base,
            changes: HashMap::new(),
            annotations: None,
            journal: None,
        }
    }

    /// Starts recording prior values for an inverse.
    pub fn begin_journal(&mut self) {
        self.journal = Some(Journal::default());
    }

    pub fn take_journal(&mut self) -> Journal {
        self.journal.take().unwrap_or_default()
    }

    pub fn into_changes(self) -> OverlayChanges {
        OverlayChanges {
            nodes: self.changes,
            annotations: self.annotations,
        }
    }

    fn record_node(&mut self, id: &NodeId) {
        let already_seen = match &self.journal {
            Some(journal) => journal.seen.contains(id),
            None => return,
        };
        if already_seen {
            return;
        }
        let prior = self.get_node(id).cloned();
        if let Some(journal) = self.journal.as_mut() {
            journal.seen.insert(id.clone());
            journal.nodes.push((id.clone(), prior));
        }
    }

    fn record_annotations(&mut self) {
        let prior = self.annotations().to_vec();
        if let Some(journal) = self.journal.as_mut()
            && journal.annotations.is_none()
        {
            journal.annotations = Some(prior);
        }
    }
}

impl<S: NodeStore + ?Sized> NodeStore for Overlay<'_, S> {
    fn root(&self) -> &NodeId {
        self.base.root()
    }

    fn schema(&self) -> &Schema {
        self.base.schema()
    }

    fn get_node(&self, id: &NodeId) -> Option<&LogicalNode> {
        match self.changes.get(id) {
            Some(changed) => changed.as_ref(),
            None => self.base.get_node(id),
        }
    }

    fn put_node(&mut self, node: LogicalNode) {
        self.record_node(&node.id);
        self.changes.insert(node.id.clone(), Some(node));
    }

    fn delete_node(&mut self, id: &NodeId) -> Option<LogicalNode> {
        self.record_node(id);
        let prior = self.get_node(id).cloned();
        self.changes.insert(id.clone(), None);
        prior
    }

    fn annotations(&self) -> &[Annotation] {
        match &self.annotations {
            Some(annotations) => annotations,
            None => self.base.annotations(),
        }
    }

    fn set_annotations(&mut self, annotations: Vec<Annotation>) {
        self.record_annotations();
        self.annotations = Some(annotations);
    }
}
