//! Style and annotation ranges carried through a text edit.

use crate::editing::edit::TextEdit;
use crate::model::{Annotation, MarkRange, Span};

/// Remaps one half-open range, or `None` when the edit removes it.
///
/// Ranges never grow on insertion at either boundary: text typed at a
/// range's start shifts the range, text typed at its end stays outside.
pub fn adjust_span(span: Span, edit: &TextEdit) -> Option<Span> {
    if edit.is_noop() {
        return Some(span);
    }

    let position = edit.edit_position;
    let deleted_end = position + edit.deleted_length;
    let replaced_end = position + edit.inserted_length;
    let shift = |offset: usize| offset + edit.inserted_length - edit.deleted_length;

    let adjusted = if position <= span.start && deleted_end >= span.end {
        return None;
    } else if position <= span.start {
        if deleted_end <= span.start {
            Span::new(shift(span.start), shift(span.end))
        } else {
            // deletion eats the head of the range
            Span::new(replaced_end, shift(span.end))
        }
    } else if position < span.end {
        if deleted_end <= span.end {
            Span::new(span.start, shift(span.end))
        } else {
            // deletion runs past the end of the range
            Span::new(span.start, replaced_end)
        }
    } else {
        span
    };

    (adjusted.start < adjusted.end).then_some(adjusted)
}

/// Remaps the marks of the edited node, dropping ranges that collapse.
pub fn adjust(marks: &[MarkRange], edit: &TextEdit) -> Vec<MarkRange> {
    marks
        .iter()
        .filter_map(|mark| {
            adjust_span(mark.span, edit).map(|span| MarkRange {
                span,
                ..mark.clone()
            })
        })
        .collect()
}

/// Remaps annotations attached to the edited node; others pass through.
pub fn adjust_annotations(annotations: &[Annotation], edit: &TextEdit) -> Vec<Annotation> {
    annotations
        .iter()
        .filter_map(|annotation| {
            if annotation.node_id != edit.node_id {
                return Some(annotation.clone());
            }
            adjust_span(annotation.span, edit).map(|span| Annotation {
                span,
                ..annotation.clone()
            })
        })
        .collect()
}
