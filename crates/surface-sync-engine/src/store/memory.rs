use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::model::{Annotation, LogicalNode, NodeId, Schema};
use crate::store::NodeStore;

/// In-memory tree store keyed by node id.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStore {
    root: NodeId,
    nodes: HashMap<NodeId, LogicalNode>,
    annotations: Vec<Annotation>,
    schema: Schema,
}

impl MemoryStore {
    /// An empty document whose root node has id `doc`.
    pub fn new() -> Self {
        Self::with_schema(Schema::default())
    }

    pub fn with_schema(schema: Schema) -> Self {
        let root = NodeId::from("doc");
        let mut nodes = HashMap::new();
        nodes.insert(root.clone(), LogicalNode::container(root.clone(), "document"));
        Self {
            root,
            nodes,
            annotations: Vec::new(),
            schema,
        }
    }

    /// Appends `node` as the last child of `parent` and returns its id.
    pub fn append(&mut self, parent: &NodeId, mut node: LogicalNode) -> Result<NodeId> {
        self.schema.group_of(&node.node_type)?;
        let id = node.id.clone();
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| EngineError::NodeNotFound(parent.clone()))?;
        parent_node.children.push(id.clone());
        node.parent = Some(parent.clone());
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Appends a block of `block_type` under the root holding one text node.
    pub fn append_paragraph(
        &mut self,
        block_id: impl Into<NodeId>,
        block_type: &str,
        text: LogicalNode,
    ) -> Result<NodeId> {
        let root = self.root.clone();
        let block = self.append(&root, LogicalNode::container(block_id, block_type))?;
        self.append(&block, text)
    }

    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Text of a node, or `None` for missing and structural nodes.
    pub fn text_of(&self, id: &str) -> Option<&str> {
        self.nodes.get(&NodeId::from(id))?.text.as_deref()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for MemoryStore {
    fn root(&self) -> &NodeId {
        &self.root
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn get_node(&self, id: &NodeId) -> Option<&LogicalNode> {
        self.nodes.get(id)
    }

    fn put_node(&mut self, node: LogicalNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    fn delete_node(&mut self, id: &NodeId) -> Option<LogicalNode> {
        self.nodes.remove(id)
    }

    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn set_annotations(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
    }
}
