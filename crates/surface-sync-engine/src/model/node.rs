use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::MarkRange;

/// Identifier of a logical node in the document model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id for nodes created by the engine itself.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Schema group of a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeGroup {
    /// The document root.
    Document,
    /// Paragraphs, headings, list items and other block containers.
    Block,
    /// Inline containers that hold text nodes.
    Inline,
    /// Leaf nodes carrying text.
    Text,
}

impl NodeGroup {
    /// Block-group nodes own structure rather than characters.
    pub fn is_block_group(self) -> bool {
        matches!(self, NodeGroup::Document | NodeGroup::Block)
    }
}

/// Node type registry consulted for `group` lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    types: HashMap<String, NodeGroup>,
}

impl Schema {
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    pub fn register(&mut self, node_type: impl Into<String>, group: NodeGroup) -> &mut Self {
        self.types.insert(node_type.into(), group);
        self
    }

    pub fn group_of(&self, node_type: &str) -> Result<NodeGroup> {
        self.types
            .get(node_type)
            .copied()
            .ok_or_else(|| EngineError::UnknownNodeType(node_type.to_string()))
    }
}

impl Default for Schema {
    fn default() -> Self {
        let mut schema = Self::empty();
        schema
            .register("document", NodeGroup::Document)
            .register("paragraph", NodeGroup::Block)
            .register("heading", NodeGroup::Block)
            .register("list_item", NodeGroup::Block)
            .register("blockquote", NodeGroup::Block)
            .register("code_block", NodeGroup::Block)
            .register("link", NodeGroup::Inline)
            .register("text", NodeGroup::Text);
        schema
    }
}

/// An addressable unit of the document model.
///
/// Structure (`parent`, `children`) is owned by the store; `text` is `Some`
/// only for text-bearing nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<MarkRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
}

impl LogicalNode {
    /// A text-bearing node of type `text`.
    pub fn text(id: impl Into<NodeId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: "text".to_string(),
            text: Some(text.into()),
            marks: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// A structural node without text.
    pub fn container(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            text: None,
            marks: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_marks(mut self, marks: Vec<MarkRange>) -> Self {
        self.marks = marks;
        self
    }

    pub fn is_text(&self) -> bool {
        self.text.is_some()
    }

    /// Text length in bytes; zero for structural nodes.
    pub fn text_len(&self) -> usize {
        self.text.as_deref().map_or(0, str::len)
    }

    /// The node's text, or `NotTextNode` for structural nodes.
    pub fn text_str(&self) -> Result<&str> {
        self.text
            .as_deref()
            .ok_or_else(|| EngineError::NotTextNode(self.id.clone()))
    }

    /// Checks that `offset` is inside the text and on a char boundary.
    pub fn check_offset(&self, offset: usize) -> Result<()> {
        let text = self.text_str()?;
        if offset > text.len() {
            return Err(EngineError::OffsetOutOfBounds {
                node: self.id.clone(),
                offset,
                len: text.len(),
            });
        }
        if !text.is_char_boundary(offset) {
            return Err(EngineError::NotCharBoundary {
                node: self.id.clone(),
                offset,
            });
        }
        Ok(())
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}
