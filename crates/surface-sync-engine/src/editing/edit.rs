use serde::{Deserialize, Serialize};
use xi_rope::delta::{Builder, Transformer};
use xi_rope::{Delta, Rope, RopeInfo};

use crate::editing::diff::TextChange;
use crate::error::{EngineError, Result};
use crate::model::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditType {
    Insert,
    Delete,
    Replace,
}

impl EditType {
    fn from_lengths(inserted: usize, deleted: usize) -> Self {
        match (inserted, deleted) {
            (_, 0) => EditType::Insert,
            (0, _) => EditType::Delete,
            _ => EditType::Replace,
        }
    }
}

/// A single splice of one node's text.
///
/// `new_text == old_text[..edit_position] + inserted_text + old_text[edit_position + deleted_length..]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub node_id: NodeId,
    pub old_text: String,
    pub new_text: String,
    pub edit_position: usize,
    pub edit_type: EditType,
    pub inserted_length: usize,
    pub deleted_length: usize,
    pub inserted_text: String,
}

impl TextEdit {
    /// Splices `old_text`, rejecting positions off a char boundary.
    pub fn new(
        node_id: impl Into<NodeId>,
        old_text: &str,
        position: usize,
        deleted: usize,
        inserted: &str,
    ) -> Result<Self> {
        let node_id = node_id.into();
        let end = position.checked_add(deleted).unwrap_or(usize::MAX);
        for offset in [position, end] {
            if offset > old_text.len() {
                return Err(EngineError::OffsetOutOfBounds {
                    node: node_id,
                    offset,
                    len: old_text.len(),
                });
            }
            if !old_text.is_char_boundary(offset) {
                return Err(EngineError::NotCharBoundary { node: node_id, offset });
            }
        }

        let delta = splice_delta(old_text.len(), position, end, inserted);
        let new_text = delta.apply(&Rope::from(old_text)).to_string();

        Ok(Self {
            node_id,
            old_text: old_text.to_string(),
            new_text,
            edit_position: position,
            edit_type: EditType::from_lengths(inserted.len(), deleted),
            inserted_length: inserted.len(),
            deleted_length: deleted,
            inserted_text: inserted.to_string(),
        })
    }

    pub fn from_change(
        node_id: impl Into<NodeId>,
        old_text: &str,
        change: &TextChange,
    ) -> Result<Self> {
        Self::new(node_id, old_text, change.start, change.deleted_len(), &change.text)
    }

    pub fn is_noop(&self) -> bool {
        self.inserted_length == 0 && self.deleted_length == 0
    }

    pub fn delta(&self) -> Delta<RopeInfo> {
        splice_delta(
            self.old_text.len(),
            self.edit_position,
            self.edit_position + self.deleted_length,
            &self.inserted_text,
        )
    }

    /// Moves an offset in the old text to the matching offset in the new one.
    ///
    /// `after` places offsets at the edit point after the inserted text.
    pub fn transform_offset(&self, offset: usize, after: bool) -> usize {
        let delta = self.delta();
        let mut transformer = Transformer::new(&delta);
        transformer.transform(offset.min(self.old_text.len()), after)
    }
}

fn splice_delta(base_len: usize, start: usize, end: usize, inserted: &str) -> Delta<RopeInfo> {
    let mut builder = Builder::new(base_len);
    if start != end || !inserted.is_empty() {
        builder.replace(start..end, Rope::from(inserted));
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_builds_new_text() {
        let edit = TextEdit::new("t1", "Hello World", 6, 0, "New ").unwrap();
        assert_eq!(edit.new_text, "Hello New World");
        assert_eq!(edit.edit_type, EditType::Insert);
        assert_eq!((edit.inserted_length, edit.deleted_length), (4, 0));
    }

    #[test]
    fn replace_and_delete_types() {
        assert_eq!(TextEdit::new("t1", "abc", 1, 1, "x").unwrap().edit_type, EditType::Replace);
        let delete = TextEdit::new("t1", "abc", 0, 2, "").unwrap();
        assert_eq!(delete.edit_type, EditType::Delete);
        assert_eq!(delete.new_text, "c");
    }

    #[test]
    fn out_of_bounds_and_mid_char_offsets_are_errors() {
        assert!(matches!(
            TextEdit::new("t1", "abc", 2, 5, ""),
            Err(EngineError::OffsetOutOfBounds { offset: 7, .. })
        ));
        assert!(matches!(
            TextEdit::new("t1", "é", 1, 0, "x"),
            Err(EngineError::NotCharBoundary { offset: 1, .. })
        ));
    }

    #[test]
    fn offsets_transform_through_the_edit() {
        let edit = TextEdit::new("t1", "Hello World", 6, 0, "New ").unwrap();
        assert_eq!(edit.transform_offset(3, false), 3);
        assert_eq!(edit.transform_offset(6, true), 10);
        assert_eq!(edit.transform_offset(6, false), 6);
        assert_eq!(edit.transform_offset(11, false), 15);
    }

    #[test]
    fn noop_edit_leaves_text_alone() {
        let edit = TextEdit::new("t1", "same", 2, 0, "").unwrap();
        assert!(edit.is_noop());
        assert_eq!(edit.new_text, "same");
    }
}
