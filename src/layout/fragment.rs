//! Positioned text fragments as delivered by an extraction source.

use serde::{Deserialize, Serialize};

/// Text of the sentinel fragment that marks a page boundary in a flat stream.
pub const PAGE_BREAK: &str = "\0";

/// One unit of extracted text with its vertical extent on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedFragment {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub text: String,
}

impl PositionedFragment {
    pub fn new(top: f32, bottom: f32, left: f32, text: impl Into<String>) -> Self {
        Self {
            top,
            bottom,
            left,
            text: text.into(),
        }
    }

    /// The page-boundary sentinel.
    pub fn page_break() -> Self {
        Self::new(0.0, 0.0, 0.0, PAGE_BREAK)
    }

    pub fn is_page_break(&self) -> bool {
        self.text == PAGE_BREAK
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Non-sentinel fragment with visible text.
    pub(crate) fn has_content(&self) -> bool {
        !self.is_page_break() && !self.text.trim().is_empty()
    }
}

/// How the fragments of a page were produced, which selects the paragraph rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// Block-level text extraction: one fragment per text block.
    #[default]
    Blocks,
    /// OCR or word-level extraction: one fragment per word.
    Words,
}

/// The fragments of one physical page, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub mode: LayoutMode,
    pub fragments: Vec<PositionedFragment>,
}

impl Page {
    pub fn new(mode: LayoutMode, fragments: Vec<PositionedFragment>) -> Self {
        Self { mode, fragments }
    }

    pub fn blocks(fragments: Vec<PositionedFragment>) -> Self {
        Self::new(LayoutMode::Blocks, fragments)
    }

    pub fn words(fragments: Vec<PositionedFragment>) -> Self {
        Self::new(LayoutMode::Words, fragments)
    }
}

/// Flatten pages into one stream, closing every page with a sentinel.
///
/// Pages without fragments still emit their sentinel.
pub fn to_stream(pages: &[Page]) -> Vec<PositionedFragment> {
    let mut stream = Vec::with_capacity(pages.iter().map(|p| p.fragments.len() + 1).sum());
    for page in pages {
        stream.extend(page.fragments.iter().filter(|f| !f.is_page_break()).cloned());
        stream.push(PositionedFragment::page_break());
    }
    stream
}

/// Split a sentinel-delimited stream back into pages of the given mode.
///
/// Fragments after the last sentinel form a final page; consecutive sentinels
/// yield empty pages.
pub fn pages_from_stream(stream: Vec<PositionedFragment>, mode: LayoutMode) -> Vec<Page> {
    let mut pages = Vec::new();
    let mut current = Vec::new();
    for fragment in stream {
        if fragment.is_page_break() {
            pages.push(Page::new(mode, std::mem::take(&mut current)));
        } else {
            current.push(fragment);
        }
    }
    if !current.is_empty() {
        pages.push(Page::new(mode, current));
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str) -> PositionedFragment {
        PositionedFragment::new(10.0, 20.0, 5.0, text)
    }

    #[test]
    fn empty_page_still_emits_sentinel() {
        let pages = vec![
            Page::blocks(vec![frag("one")]),
            Page::blocks(vec![]),
            Page::blocks(vec![frag("two")]),
        ];
        let stream = to_stream(&pages);
        let breaks = stream.iter().filter(|f| f.is_page_break()).count();
        assert_eq!(breaks, 3);
        assert!(stream[1].is_page_break() && stream[2].is_page_break());
    }

    #[test]
    fn stream_round_trips_to_pages() {
        let pages = vec![
            Page::words(vec![frag("a"), frag("b")]),
            Page::words(vec![]),
            Page::words(vec![frag("c")]),
        ];
        let back = pages_from_stream(to_stream(&pages), LayoutMode::Words);
        assert_eq!(back, pages);
    }

    #[test]
    fn trailing_fragments_form_last_page() {
        let stream = vec![frag("a"), PositionedFragment::page_break(), frag("b")];
        let pages = pages_from_stream(stream, LayoutMode::Blocks);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].fragments[0].text, "b");
    }

    #[test]
    fn blank_and_sentinel_have_no_content() {
        assert!(!PositionedFragment::page_break().has_content());
        assert!(!frag("   ").has_content());
        assert!(frag(" x ").has_content());
    }
}
