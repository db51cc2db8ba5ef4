use crate::model::NodeId;

/// Errors raised by store access and model operations.
///
/// A missing node or an out-of-range offset is always a hard error; callers
/// abort the running transaction instead of skipping the node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("Node {0} does not carry text")]
    NotTextNode(NodeId),
    #[error("Offset {offset} out of bounds for node {node} (length {len})")]
    OffsetOutOfBounds {
        node: NodeId,
        offset: usize,
        len: usize,
    },
    #[error("Offset {offset} in node {node} is not on a character boundary")]
    NotCharBoundary { node: NodeId, offset: usize },
    #[error("Invalid range: {0}")]
    InvalidRange(String),
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),
    #[error("Another transaction is already running")]
    Busy,
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
