use serde::{Deserialize, Serialize};

use crate::model::NodeId;

/// A caret position inside one node's text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub node_id: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node_id: impl Into<NodeId>, offset: usize) -> Self {
        Self {
            node_id: node_id.into(),
            offset,
        }
    }
}

/// An addressable span, possibly crossing two logical nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRange {
    pub start_node: NodeId,
    pub start_offset: usize,
    pub end_node: NodeId,
    pub end_offset: usize,
}

impl ContentRange {
    pub fn new(
        start_node: impl Into<NodeId>,
        start_offset: usize,
        end_node: impl Into<NodeId>,
        end_offset: usize,
    ) -> Self {
        Self {
            start_node: start_node.into(),
            start_offset,
            end_node: end_node.into(),
            end_offset,
        }
    }

    /// A range inside a single node.
    pub fn within(node: impl Into<NodeId>, start: usize, end: usize) -> Self {
        let node = node.into();
        Self::new(node.clone(), start, node, end)
    }

    pub fn collapsed(at: &Position) -> Self {
        Self::within(at.node_id.clone(), at.offset, at.offset)
    }

    pub fn is_single_node(&self) -> bool {
        self.start_node == self.end_node
    }

    pub fn is_collapsed(&self) -> bool {
        self.is_single_node() && self.start_offset == self.end_offset
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_node.clone(), self.start_offset)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_node.clone(), self.end_offset)
    }

    /// True when both endpoints sit in the given pair of nodes.
    pub fn spans_nodes(&self, start: &NodeId, end: &NodeId) -> bool {
        &self.start_node == start && &self.end_node == end
    }
}
