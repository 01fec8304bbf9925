//! Half-open character ranges into a document's flattened text.
//!
//! Offsets count Unicode scalar values, not bytes, so they agree with the offsets
//! reported by external taggers. [`CharMap`] converts them to byte ranges for slicing.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A half-open `[start, end)` character range.
///
/// Serialized verbatim as a `[start, end]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of characters covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// `start < end`.
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Half-open overlap: `self.start < other.end && other.start < self.end`.
    pub fn overlaps(&self, other: &TextSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &TextSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The overlapping part of two spans, if any.
    pub fn intersect(&self, other: &TextSpan) -> Option<TextSpan> {
        let span = TextSpan::new(self.start.max(other.start), self.end.min(other.end));
        span.is_valid().then_some(span)
    }

    /// Shift both ends right by `offset` (chapter-local to document-global).
    pub fn shift(&self, offset: usize) -> TextSpan {
        TextSpan::new(self.start + offset, self.end + offset)
    }

    /// Express this span relative to `origin`, or `None` if it starts before it.
    pub fn relative_to(&self, origin: usize) -> Option<TextSpan> {
        (self.start >= origin).then(|| TextSpan::new(self.start - origin, self.end - origin))
    }
}

impl From<(usize, usize)> for TextSpan {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

impl From<TextSpan> for (usize, usize) {
    fn from(span: TextSpan) -> Self {
        (span.start, span.end)
    }
}

impl std::fmt::Display for TextSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Char-offset to byte-offset table for one text.
///
/// Built once per text; every lookup afterwards is O(1).
#[derive(Debug, Clone, Default)]
pub struct CharMap {
    /// Byte offset of every char boundary, including the end of the text.
    boundaries: Vec<usize>,
}

impl CharMap {
    pub fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        boundaries.push(text.len());
        Self { boundaries }
    }

    /// Length of the mapped text in characters.
    pub fn char_len(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    /// Byte range for a char span, or `None` if it falls outside the text.
    pub fn byte_range(&self, span: TextSpan) -> Option<Range<usize>> {
        if span.start > span.end || span.end > self.char_len() {
            return None;
        }
        Some(self.boundaries[span.start]..self.boundaries[span.end])
    }

    /// Slice `text` (the text this map was built from) by a char span.
    pub fn slice<'a>(&self, text: &'a str, span: TextSpan) -> Option<&'a str> {
        self.byte_range(span).and_then(|r| text.get(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_is_half_open() {
        let a = TextSpan::new(0, 3);
        assert!(a.overlaps(&TextSpan::new(2, 5)));
        assert!(!a.overlaps(&TextSpan::new(3, 5)));
        assert!(!TextSpan::new(3, 5).overlaps(&a));
    }

    #[test]
    fn intersect_and_contains() {
        let chapter = TextSpan::new(10, 20);
        assert_eq!(chapter.intersect(&TextSpan::new(5, 15)), Some(TextSpan::new(10, 15)));
        assert_eq!(chapter.intersect(&TextSpan::new(20, 25)), None);
        assert!(chapter.contains(&TextSpan::new(12, 20)));
        assert!(!chapter.contains(&TextSpan::new(9, 12)));
    }

    #[test]
    fn shift_and_relative() {
        let local = TextSpan::new(0, 3);
        let global = local.shift(100);
        assert_eq!(global, TextSpan::new(100, 103));
        assert_eq!(global.relative_to(100), Some(local));
        assert_eq!(global.relative_to(101), None);
    }

    #[test]
    fn serializes_as_pair() {
        let json = serde_json::to_string(&TextSpan::new(4, 9)).unwrap();
        assert_eq!(json, "[4,9]");
        let back: TextSpan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TextSpan::new(4, 9));
    }

    #[test]
    fn char_map_handles_multibyte() {
        let text = "Café au lait";
        let map = CharMap::new(text);
        assert_eq!(map.char_len(), 12);
        assert_eq!(map.slice(text, TextSpan::new(0, 4)), Some("Café"));
        assert_eq!(map.slice(text, TextSpan::new(5, 7)), Some("au"));
        assert_eq!(map.slice(text, TextSpan::new(5, 13)), None);
    }
}
