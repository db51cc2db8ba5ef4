use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{NodeId, Span};

/// Style kinds the classifier can recognise on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
}

impl MarkKind {
    /// Canonical mark type name stored on [`MarkRange::kind`].
    pub fn as_str(self) -> &'static str {
        match self {
            MarkKind::Bold => "bold",
            MarkKind::Italic => "italic",
            MarkKind::Underline => "underline",
            MarkKind::Strikethrough => "strikethrough",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bold" => Some(MarkKind::Bold),
            "italic" => Some(MarkKind::Italic),
            "underline" => Some(MarkKind::Underline),
            "strikethrough" => Some(MarkKind::Strikethrough),
            _ => None,
        }
    }
}

impl fmt::Display for MarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A style range attached to one text node.
///
/// Some stores spell the type field `stype`; both spellings are accepted on
/// read and `type` is always written, so only this shape exists past the
/// serde boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkRange {
    #[serde(rename = "type", alias = "stype")]
    pub kind: String,
    #[serde(rename = "range")]
    pub span: Span,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

impl MarkRange {
    pub fn new(kind: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind: kind.into(),
            span: Span::new(start, end),
            attrs: BTreeMap::new(),
        }
    }

    pub fn of(kind: MarkKind, start: usize, end: usize) -> Self {
        Self::new(kind.as_str(), start, end)
    }

    pub fn is_kind(&self, kind: MarkKind) -> bool {
        self.kind == kind.as_str()
    }
}

/// A range attached to a node but stored outside it (comments, highlights).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub node_id: NodeId,
    pub kind: String,
    #[serde(rename = "range")]
    pub span: Span,
}

/// Merge overlapping or touching ranges of the same kind and attributes.
pub fn normalize_marks(mut marks: Vec<MarkRange>) -> Vec<MarkRange> {
    marks.retain(|mark| mark.span.start < mark.span.end);
    marks.sort_by(|a, b| {
        (a.kind.as_str(), a.span.start, a.span.end).cmp(&(b.kind.as_str(), b.span.start, b.span.end))
    });

    let mut merged: Vec<MarkRange> = Vec::with_capacity(marks.len());
    for mark in marks {
        match merged.last_mut() {
            Some(last)
                if last.kind == mark.kind
                    && last.attrs == mark.attrs
                    && mark.span.start <= last.span.end =>
            {
                last.span.end = last.span.end.max(mark.span.end);
            }
            _ => merged.push(mark),
        }
    }
    merged.sort_by_key(|mark| (mark.span.start, mark.span.end));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn legacy_stype_field_is_accepted() {
        let mark: MarkRange = toml::from_str(
            r#"
stype = "bold"
range = { start = 6, end = 11 }
"#,
        )
        .unwrap();

        assert_eq!(mark, MarkRange::of(MarkKind::Bold, 6, 11));
    }

    #[test]
    fn type_field_is_written() {
        let written = toml::to_string(&MarkRange::of(MarkKind::Italic, 0, 3)).unwrap();
        assert!(written.contains("type = \"italic\""));
        assert!(!written.contains("stype"));
    }

    #[test]
    fn normalize_merges_touching_ranges_of_same_kind() {
        let marks = vec![
            MarkRange::of(MarkKind::Bold, 4, 8),
            MarkRange::of(MarkKind::Italic, 0, 2),
            MarkRange::of(MarkKind::Bold, 0, 4),
            MarkRange::of(MarkKind::Bold, 10, 10),
        ];

        assert_eq!(
            normalize_marks(marks),
            vec![
                MarkRange::of(MarkKind::Italic, 0, 2),
                MarkRange::of(MarkKind::Bold, 0, 8),
            ]
        );
    }

    #[test]
    fn mark_kind_names_round_trip() {
        for kind in [
            MarkKind::Bold,
            MarkKind::Italic,
            MarkKind::Underline,
            MarkKind::Strikethrough,
        ] {
            assert_eq!(MarkKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MarkKind::parse("code"), None);
    }
}
