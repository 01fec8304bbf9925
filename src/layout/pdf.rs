//! PDF fragment source using the `pdf-extract` crate.
//!
//! `pdf-extract` returns the text of all pages as one string with form feeds
//! (`\x0C`) between pages. Within a page, consecutive non-blank lines form a
//! block; blank lines separate blocks. Each block becomes one fragment whose
//! geometry is derived from its line numbers and indentation, so vertical
//! whitespace on the page survives as vertical distance between fragments.

use crate::error::{StoryError, StoryResult};

use super::FragmentSource;
use super::fragment::{Page, PositionedFragment};

/// Nominal height of one extracted text line.
const LINE_HEIGHT: f32 = 17.0;

/// Nominal width of one leading-indent character.
const CHAR_WIDTH: f32 = 6.0;

/// PDF fragment source backed by `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfSource;

impl FragmentSource for PdfSource {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn pages(&self, data: &[u8]) -> StoryResult<Vec<Page>> {
        let text = pdf_extract::extract_text_from_mem(data).map_err(|e| StoryError::Parse {
            format: "pdf".into(),
            message: e.to_string(),
        })?;

        let pages: Vec<Page> = text.split('\x0C').map(page_blocks).collect();
        tracing::debug!(pages = pages.len(), "extracted pdf pages");
        Ok(pages)
    }
}

/// Group a page's lines into positioned blocks.
pub(crate) fn page_blocks(page_text: &str) -> Page {
    let mut fragments = Vec::new();
    let mut block: Vec<(usize, &str)> = Vec::new();

    for (line_no, line) in page_text.lines().enumerate() {
        if line.trim().is_empty() {
            if let Some(fragment) = close_block(&block) {
                fragments.push(fragment);
            }
            block.clear();
        } else {
            block.push((line_no, line));
        }
    }
    if let Some(fragment) = close_block(&block) {
        fragments.push(fragment);
    }

    Page::blocks(fragments)
}

fn close_block(lines: &[(usize, &str)]) -> Option<PositionedFragment> {
    let (first, _) = lines.first()?;
    let (last, _) = lines.last()?;
    let indent = lines
        .iter()
        .map(|(_, l)| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);
    let text = lines
        .iter()
        .map(|(_, l)| l.trim())
        .collect::<Vec<_>>()
        .join(" ");

    Some(PositionedFragment::new(
        *first as f32 * LINE_HEIGHT,
        (*last + 1) as f32 * LINE_HEIGHT,
        indent as f32 * CHAR_WIDTH,
        text,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_pdf_bytes() {
        // pdf-extract needs real PDF bytes, so only the error path is testable here.
        let result = PdfSource.pages(b"This is not a PDF");
        assert!(matches!(result, Err(StoryError::Parse { .. })));
    }

    #[test]
    fn blank_lines_separate_blocks() {
        let page = page_blocks("\n\nFirst line of one\nsecond line\n\n   Indented block\n");
        assert_eq!(page.fragments.len(), 2);

        let first = &page.fragments[0];
        assert_eq!(first.text, "First line of one second line");
        assert_eq!(first.top, 2.0 * LINE_HEIGHT);
        assert_eq!(first.bottom, 4.0 * LINE_HEIGHT);

        let second = &page.fragments[1];
        assert_eq!(second.top, 5.0 * LINE_HEIGHT);
        assert_eq!(second.left, 3.0 * CHAR_WIDTH);
    }

    #[test]
    fn blank_page_has_no_fragments() {
        assert!(page_blocks("  \n\n \n").fragments.is_empty());
    }
}
