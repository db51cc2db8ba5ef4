//! Single-region text diff biased by the caret.
//!
//! Surface edits are observed after the fact as two full snapshots of one
//! logical region. The common prefix and suffix are stripped over extended
//! grapheme clusters, which leaves exactly one edit region. When that region
//! is a pure insertion or deletion of repeated text it can slide, and the
//! caret decides which of the equivalent positions the user actually edited.

use serde::{Deserialize, Serialize};
use surface_sync_config::DiffConfig;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Insert,
    Delete,
    Replace,
}

/// One recovered edit: `old[start..end]` was replaced by `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub confidence: f32,
}

impl TextChange {
    /// Applies the change to the text it was computed against.
    pub fn apply(&self, old: &str) -> String {
        let mut out = String::with_capacity(old.len() - (self.end - self.start) + self.text.len());
        out.push_str(&old[..self.start]);
        out.push_str(&self.text);
        out.push_str(&old[self.end..]);
        out
    }

    pub fn deleted_len(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Treat canonically equivalent strings as unchanged.
    pub normalize_unicode: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
        }
    }
}

impl From<&DiffConfig> for DiffOptions {
    fn from(config: &DiffConfig) -> Self {
        Self {
            normalize_unicode: config.normalize_unicode,
        }
    }
}

/// Diffs with default options. See [`diff_with`].
pub fn diff(old: &str, new: &str, selection_offset: usize, selection_length: usize) -> Vec<TextChange> {
    diff_with(old, new, selection_offset, selection_length, &DiffOptions::default())
}

/// Returns at most one change turning `old` into `new`.
///
/// `selection_offset`/`selection_length` describe the selection in `old`
/// before the edit. Offsets in the result are byte offsets into `old` and
/// always fall on grapheme boundaries.
pub fn diff_with(
    old: &str,
    new: &str,
    selection_offset: usize,
    selection_length: usize,
    options: &DiffOptions,
) -> Vec<TextChange> {
    if old == new {
        return Vec::new();
    }
    if options.normalize_unicode && old.nfc().eq(new.nfc()) {
        return Vec::new();
    }

    let old_g: Vec<(usize, &str)> = old.grapheme_indices(true).collect();
    let new_g: Vec<(usize, &str)> = new.grapheme_indices(true).collect();

    let prefix = old_g
        .iter()
        .zip(new_g.iter())
        .take_while(|(a, b)| a.1 == b.1)
        .count();
    let max_suffix = old_g.len().min(new_g.len()) - prefix;
    let suffix = old_g
        .iter()
        .rev()
        .zip(new_g.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a.1 == b.1)
        .count();

    let byte_at = |graphemes: &[(usize, &str)], index: usize, len: usize| {
        graphemes.get(index).map_or(len, |(offset, _)| *offset)
    };
    let start = byte_at(&old_g, prefix, old.len());
    let old_end = byte_at(&old_g, old_g.len() - suffix, old.len());
    let new_end = byte_at(&new_g, new_g.len() - suffix, new.len());

    let deleted = &old_g[prefix..old_g.len() - suffix];
    let inserted = &new_g[prefix..new_g.len() - suffix];

    if !deleted.is_empty() && !inserted.is_empty() {
        return vec![TextChange {
            change_type: ChangeType::Replace,
            start,
            end: old_end,
            text: new[start..new_end].to_string(),
            confidence: 1.0,
        }];
    }

    let (edit, change_type) = if inserted.is_empty() {
        (deleted, ChangeType::Delete)
    } else {
        (inserted, ChangeType::Insert)
    };
    let edit_len: usize = edit.iter().map(|(_, g)| g.len()).sum();

    // Every start the edit can slide to, rightmost (the maximal prefix) first.
    let mut candidates = vec![start];
    let mut window: std::collections::VecDeque<&str> = edit.iter().map(|(_, g)| *g).collect();
    let mut cursor = prefix;
    while cursor > 0 {
        let (offset, preceding) = old_g[cursor - 1];
        if window.back() != Some(&preceding) {
            break;
        }
        window.pop_back();
        window.push_front(preceding);
        candidates.push(offset);
        cursor -= 1;
    }

    let preferred = if selection_length > 0 || change_type == ChangeType::Insert {
        selection_offset
    } else {
        selection_offset.saturating_sub(edit_len)
    };
    let chosen = candidates
        .iter()
        .copied()
        .min_by_key(|candidate| candidate.abs_diff(preferred))
        .unwrap_or(start);
    let confidence = if candidates.len() == 1 {
        1.0
    } else if chosen == preferred {
        0.8
    } else {
        0.5
    };

    // A slid window covers the same bytes of old (deletion) or the same
    // inserted string rotated onto the repeated prefix (insertion).
    let change = match change_type {
        ChangeType::Delete => TextChange {
            change_type,
            start: chosen,
            end: chosen + edit_len,
            text: String::new(),
            confidence,
        },
        _ => TextChange {
            change_type,
            start: chosen,
            end: chosen,
            text: new[chosen..chosen + edit_len].to_string(),
            confidence,
        },
    };
    vec![change]
}
