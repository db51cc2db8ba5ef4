use serde::{Deserialize, Serialize};

use crate::model::{ContentRange, NodeId, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Selection expressed in model coordinates.
///
/// `anchor` is where the selection started, `focus` where it ends; for a
/// backward selection the focus precedes the anchor in document order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSelection {
    pub anchor: Position,
    pub focus: Position,
    pub direction: Direction,
}

impl ModelSelection {
    pub fn caret(node_id: impl Into<NodeId>, offset: usize) -> Self {
        let at = Position::new(node_id, offset);
        Self {
            anchor: at.clone(),
            focus: at,
            direction: Direction::Forward,
        }
    }

    /// A forward selection covering `range`.
    pub fn from_range(range: &ContentRange) -> Self {
        Self {
            anchor: range.start(),
            focus: range.end(),
            direction: Direction::Forward,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Start and end in document order.
    pub fn range(&self) -> ContentRange {
        let (start, end) = match self.direction {
            Direction::Forward => (&self.anchor, &self.focus),
            Direction::Backward => (&self.focus, &self.anchor),
        };
        ContentRange::new(
            start.node_id.clone(),
            start.offset,
            end.node_id.clone(),
            end.offset,
        )
    }

    /// The node that holds the caret (the focus end).
    pub fn focus_node(&self) -> &NodeId {
        &self.focus.node_id
    }
}
