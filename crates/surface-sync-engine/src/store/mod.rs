//! Tree store seam.
//!
//! The production tree store lives outside this crate; the engine talks to it
//! through [`NodeStore`]. [`MemoryStore`] is the in-process implementation
//! used by tests and benches, and [`Overlay`] buffers a transaction's writes
//! on top of any store until commit.

pub mod memory;
pub mod overlay;

pub use memory::MemoryStore;
pub use overlay::{Journal, Overlay, OverlayChanges};

use crate::error::{EngineError, Result};
use crate::model::{Annotation, LogicalNode, NodeGroup, NodeId, Schema};

/// Node-level CRUD plus schema lookups.
///
/// All calls are synchronous and single-node consistent. A missing node is a
/// hard error for callers; use [`NodeStore::node`] rather than skipping.
pub trait NodeStore {
    fn root(&self) -> &NodeId;
    fn schema(&self) -> &Schema;
    fn get_node(&self, id: &NodeId) -> Option<&LogicalNode>;
    fn put_node(&mut self, node: LogicalNode);
    fn delete_node(&mut self, id: &NodeId) -> Option<LogicalNode>;
    fn annotations(&self) -> &[Annotation];
    fn set_annotations(&mut self, annotations: Vec<Annotation>);

    fn node(&self, id: &NodeId) -> Result<&LogicalNode> {
        self.get_node(id)
            .ok_or_else(|| EngineError::NodeNotFound(id.clone()))
    }

    /// Like [`NodeStore::node`], but also requires the node to carry text.
    fn text_node(&self, id: &NodeId) -> Result<&LogicalNode> {
        let node = self.node(id)?;
        if node.is_text() {
            Ok(node)
        } else {
            Err(EngineError::NotTextNode(id.clone()))
        }
    }

    fn group_of(&self, id: &NodeId) -> Result<NodeGroup> {
        let node = self.node(id)?;
        self.schema().group_of(&node.node_type)
    }

    fn is_block_group(&self, id: &NodeId) -> bool {
        self.group_of(id).is_ok_and(NodeGroup::is_block_group)
    }

    fn is_text_node(&self, id: &NodeId) -> bool {
        self.get_node(id).is_some_and(LogicalNode::is_text)
    }

    fn parent(&self, id: &NodeId) -> Option<&NodeId> {
        self.get_node(id).and_then(|node| node.parent.as_ref())
    }

    /// Nearest ancestor (inclusive) whose group is `Block`.
    fn block_of(&self, id: &NodeId) -> Result<NodeId> {
        let mut current = self.node(id)?;
        loop {
            if self.schema().group_of(&current.node_type)? == NodeGroup::Block {
                return Ok(current.id.clone());
            }
            match &current.parent {
                Some(parent) => current = self.node(parent)?,
                None => {
                    return Err(EngineError::InvalidRange(format!(
                        "node {id} is not inside a block"
                    )));
                }
            }
        }
    }

    fn first_text_descendant(&self, id: &NodeId) -> Option<NodeId> {
        let node = self.get_node(id)?;
        if node.is_text() {
            return Some(node.id.clone());
        }
        node.children
            .iter()
            .find_map(|child| self.first_text_descendant(child))
    }

    fn last_text_descendant(&self, id: &NodeId) -> Option<NodeId> {
        let node = self.get_node(id)?;
        if node.is_text() {
            return Some(node.id.clone());
        }
        node.children
            .iter()
            .rev()
            .find_map(|child| self.last_text_descendant(child))
    }

    /// Every text-bearing node in document order.
    fn text_nodes_in_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root().clone()];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get_node(&id) else {
                continue;
            };
            if node.is_text() {
                out.push(node.id.clone());
            }
            stack.extend(node.children.iter().rev().cloned());
        }
        out
    }

    /// Text nodes from `start` to `end` inclusive, in document order.
    fn text_nodes_between(&self, start: &NodeId, end: &NodeId) -> Result<Vec<NodeId>> {
        self.text_node(start)?;
        self.text_node(end)?;
        let order = self.text_nodes_in_order();
        let position = |id: &NodeId| order.iter().position(|candidate| candidate == id);
        match (position(start), position(end)) {
            (Some(from), Some(to)) if from <= to => Ok(order[from..=to].to_vec()),
            (Some(_), Some(_)) => Err(EngineError::InvalidRange(format!(
                "{end} precedes {start} in document order"
            ))),
            _ => Err(EngineError::InvalidRange(format!(
                "{start} or {end} is detached from the document"
            ))),
        }
    }

    fn previous_text_node(&self, id: &NodeId) -> Option<NodeId> {
        let order = self.text_nodes_in_order();
        let index = order.iter().position(|candidate| candidate == id)?;
        index.checked_sub(1).map(|prev| order[prev].clone())
    }

    fn next_text_node(&self, id: &NodeId) -> Option<NodeId> {
        let order = self.text_nodes_in_order();
        let index = order.iter().position(|candidate| candidate == id)?;
        order.get(index + 1).cloned()
    }
}
