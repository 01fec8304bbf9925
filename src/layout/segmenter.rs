//! Geometric segmentation of fragments into text, chapters, and paragraphs.
//!
//! One pass over the pages appends every fragment to the flattened text while a
//! running character offset is kept. Paragraph and chapter spans are cut at that
//! offset as boundaries are detected; nothing is recomputed by re-scanning text.
//!
//! - **Paragraphs.** On block pages a fragment starts a paragraph when it sits
//!   below the previous block (`top > prev.bottom`) and does not start left of the
//!   previous block's column (`left >= prev.left`). On word pages a fragment starts
//!   a paragraph when its `top` moved by at least `word_gap_factor` glyph heights.
//!   Paragraphs below `min_paragraph_words` are not emitted; their start is kept so
//!   their text folds into the following paragraph.
//! - **Chapters.** The first fragment of a page opens a chapter when it starts at
//!   least `chapter_gap_lines` line heights below the document's top margin. The
//!   last fragment of a page closes a chapter when it ends at least as far above
//!   the document's bottom margin.

use crate::config::LayoutConfig;
use crate::span::{TextSpan, char_len};

use super::fragment::{LayoutMode, Page, PositionedFragment};

/// Flattened text with its structural spans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub text: String,
    pub chapters: Vec<TextSpan>,
    /// Document-wide paragraph list; each paragraph lies inside one chapter.
    pub paragraphs: Vec<TextSpan>,
}

impl Segmentation {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Page-independent geometry gathered before segmentation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DocumentMetrics {
    /// Smallest `top` of any fragment (the top margin).
    start_of_page: f32,
    /// Largest `bottom` of any fragment (the bottom margin).
    end_of_page: f32,
    line_height: f32,
}

impl DocumentMetrics {
    fn measure(pages: &[Page], fallback_line_height: f32) -> Option<Self> {
        let mut fragments = pages.iter().flat_map(|p| p.fragments.iter()).filter(|f| f.has_content());
        let first = fragments.next()?;
        let (mut start_of_page, mut end_of_page) = (first.top, first.bottom);
        for f in fragments {
            start_of_page = start_of_page.min(f.top);
            end_of_page = end_of_page.max(f.bottom);
        }

        // Only word fragments are one line tall; blocks span many lines.
        let heights: Vec<f32> = pages
            .iter()
            .filter(|p| p.mode == LayoutMode::Words)
            .flat_map(|p| p.fragments.iter())
            .filter(|f| f.has_content() && f.height() > 0.0)
            .map(PositionedFragment::height)
            .collect();

        Some(Self {
            start_of_page,
            end_of_page,
            line_height: mean(&heights).unwrap_or(fallback_line_height),
        })
    }
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}

/// Accumulates the flattened text and cuts spans at the running offset.
struct SpanBuilder {
    min_words: usize,
    text: String,
    offset: usize,
    /// End offset of the most recently appended fragment.
    last_end: usize,
    chapters: Vec<TextSpan>,
    paragraphs: Vec<TextSpan>,
    chapter_start: Option<usize>,
    /// Index in `paragraphs` of the current chapter's first paragraph.
    chapter_first_paragraph: usize,
    paragraph_start: Option<usize>,
    paragraph_words: usize,
}

impl SpanBuilder {
    fn new(min_words: usize) -> Self {
        Self {
            min_words,
            text: String::new(),
            offset: 0,
            last_end: 0,
            chapters: Vec::new(),
            paragraphs: Vec::new(),
            chapter_start: None,
            chapter_first_paragraph: 0,
            paragraph_start: None,
            paragraph_words: 0,
        }
    }

    fn push(&mut self, fragment: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
            self.offset += 1;
        }
        self.chapter_start.get_or_insert(self.offset);
        self.paragraph_start.get_or_insert(self.offset);

        self.text.push_str(fragment);
        self.offset += char_len(fragment);
        self.last_end = self.offset;
        self.paragraph_words += fragment.split_whitespace().count();
    }

    /// Close the open paragraph if it is long enough; otherwise keep it open.
    fn break_paragraph(&mut self) {
        if self.paragraph_words >= self.min_words {
            self.close_paragraph();
        }
    }

    /// Close the open paragraph unconditionally, dropping it if too short.
    fn close_paragraph(&mut self) {
        if let Some(start) = self.paragraph_start.take() {
            if self.paragraph_words >= self.min_words && start < self.last_end {
                self.paragraphs.push(TextSpan::new(start, self.last_end));
            }
        }
        self.paragraph_words = 0;
    }

    fn break_chapter(&mut self) {
        self.close_paragraph();
        if let Some(start) = self.chapter_start.take() {
            let chapter = TextSpan::new(start, self.last_end);
            if self.paragraphs.len() == self.chapter_first_paragraph {
                // No paragraph survived: the chapter is one degenerate paragraph.
                self.paragraphs.push(chapter);
            }
            self.chapters.push(chapter);
        }
        self.chapter_first_paragraph = self.paragraphs.len();
    }

    fn finish(mut self) -> Segmentation {
        self.break_chapter();
        Segmentation {
            text: self.text,
            chapters: self.chapters,
            paragraphs: self.paragraphs,
        }
    }
}

/// Layout segmenter configured with the geometry thresholds.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: LayoutConfig,
}

impl Segmenter {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Segment pages into flattened text, chapter spans, and paragraph spans.
    ///
    /// Never fails; a document without text yields an empty [`Segmentation`].
    pub fn segment(&self, pages: &[Page]) -> Segmentation {
        let Some(metrics) = DocumentMetrics::measure(pages, self.config.fallback_line_height) else {
            return Segmentation::default();
        };
        let threshold = self.config.chapter_gap_lines * metrics.line_height;
        tracing::debug!(
            pages = pages.len(),
            start_of_page = metrics.start_of_page,
            end_of_page = metrics.end_of_page,
            line_height = metrics.line_height,
            "segmenting document"
        );

        let mut builder = SpanBuilder::new(self.config.min_paragraph_words);
        let mut prev_block: Option<&PositionedFragment> = None;
        let mut last_top: Option<f32> = None;

        for page in pages {
            let fragments: Vec<&PositionedFragment> =
                page.fragments.iter().filter(|f| f.has_content()).collect();
            let glyph_height = self.glyph_height(&fragments);
            let last = fragments.len().saturating_sub(1);

            for (i, fragment) in fragments.iter().copied().enumerate() {
                let opens_chapter = i == 0 && fragment.top - metrics.start_of_page >= threshold;
                if opens_chapter {
                    builder.break_chapter();
                } else if self.starts_paragraph(
                    page.mode,
                    fragment,
                    prev_block,
                    last_top,
                    glyph_height,
                ) {
                    builder.break_paragraph();
                }

                builder.push(fragment.text.trim());
                prev_block = Some(fragment);
                last_top = Some(fragment.top);

                if i == last && metrics.end_of_page - fragment.bottom >= threshold {
                    builder.break_chapter();
                }
            }
        }

        let segmentation = builder.finish();
        tracing::info!(
            chars = char_len(&segmentation.text),
            chapters = segmentation.chapters.len(),
            paragraphs = segmentation.paragraphs.len(),
            "segmentation complete"
        );
        segmentation
    }

    fn starts_paragraph(
        &self,
        mode: LayoutMode,
        fragment: &PositionedFragment,
        prev_block: Option<&PositionedFragment>,
        last_top: Option<f32>,
        glyph_height: f32,
    ) -> bool {
        match mode {
            LayoutMode::Blocks => prev_block
                .is_some_and(|prev| fragment.top > prev.bottom && fragment.left >= prev.left),
            LayoutMode::Words => last_top.is_some_and(|top| {
                (fragment.top - top).abs() >= self.config.word_gap_factor * glyph_height
            }),
        }
    }

    fn glyph_height(&self, fragments: &[&PositionedFragment]) -> f32 {
        let heights: Vec<f32> = fragments
            .iter()
            .map(|f| f.height())
            .filter(|h| *h > 0.0)
            .collect();
        mean(&heights).unwrap_or(self.config.fallback_glyph_height)
    }
}
