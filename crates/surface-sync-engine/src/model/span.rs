use serde::{Deserialize, Serialize};

/// A byte range `[start, end)` into a node's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start byte offset.
    pub start: usize,
    /// Exclusive end byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the length in bytes. Uses saturating subtraction for safety.
    #[must_use]
    pub fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the span is empty (start >= end).
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Returns true if `offset` lies in `[start, end)`.
    pub fn contains(self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Intersection with `other`, or `None` when they do not overlap.
    pub fn intersect(self, other: Span) -> Option<Span> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Span { start, end })
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

/// Clamps `offset` into `text` and moves it back onto a char boundary.
pub fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_saturates_on_inverted_span() {
        let sp = Span { start: 5, end: 2 };
        assert_eq!(sp.len(), 0);
        assert!(sp.is_empty());
    }

    #[test]
    fn contains_is_half_open() {
        let sp = Span::new(2, 4);
        assert!(!sp.contains(1));
        assert!(sp.contains(2));
        assert!(sp.contains(3));
        assert!(!sp.contains(4));
    }

    #[test]
    fn intersect_overlapping() {
        assert_eq!(Span::new(0, 5).intersect(Span::new(3, 8)), Some(Span::new(3, 5)));
    }

    #[test]
    fn intersect_touching_is_none() {
        assert_eq!(Span::new(0, 3).intersect(Span::new(3, 8)), None);
    }

    #[test]
    fn floor_char_boundary_backs_out_of_a_code_point() {
        // "é" occupies bytes 1..3
        assert_eq!(floor_char_boundary("aé", 2), 1);
        assert_eq!(floor_char_boundary("aé", 3), 3);
        assert_eq!(floor_char_boundary("aé", 40), 3);
    }
}
