//! Layout-based structural segmentation.
//!
//! An extraction source turns a file into pages of positioned fragments; the
//! [`Segmenter`] turns those into flattened text plus chapter and paragraph spans.
//!
//! Two sources exist: [`PdfSource`] for PDF files and [`JsonSource`] for fragment
//! dumps produced by an external extractor (block-level or OCR).

pub mod fragment;
pub mod pdf;
pub mod segmenter;

use serde::Deserialize;

use crate::error::{StoryError, StoryResult};

pub use fragment::{LayoutMode, PAGE_BREAK, Page, PositionedFragment, pages_from_stream, to_stream};
pub use pdf::PdfSource;
pub use segmenter::{Segmentation, Segmenter};

/// Produces pages of positioned fragments from raw file bytes.
pub trait FragmentSource: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Extract every page, in order. Pages without text are kept as empty pages.
    fn pages(&self, data: &[u8]) -> StoryResult<Vec<Page>>;
}

/// Input formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Pdf,
    /// JSON fragments from an external extractor.
    Fragments,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Fragments => "fragments",
        }
    }
}

impl std::fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the content format from a file extension.
pub fn detect_format(path: &str) -> Option<ContentFormat> {
    let lower = path.to_lowercase();
    if lower.ends_with(".pdf") {
        Some(ContentFormat::Pdf)
    } else if lower.ends_with(".json") {
        Some(ContentFormat::Fragments)
    } else {
        None
    }
}

/// Get the extraction source for a format.
pub fn source_for(format: ContentFormat) -> Box<dyn FragmentSource> {
    match format {
        ContentFormat::Pdf => Box::new(PdfSource),
        ContentFormat::Fragments => Box::new(JsonSource),
    }
}

/// Fragment dumps as JSON: either an array of pages or a flat,
/// sentinel-delimited array of fragments.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSource;

#[derive(Deserialize)]
#[serde(untagged)]
enum FragmentDump {
    Pages(Vec<Page>),
    Stream(Vec<PositionedFragment>),
}

impl FragmentSource for JsonSource {
    fn name(&self) -> &'static str {
        "fragments"
    }

    fn pages(&self, data: &[u8]) -> StoryResult<Vec<Page>> {
        let dump: FragmentDump = serde_json::from_slice(data).map_err(|e| StoryError::Parse {
            format: "fragments".into(),
            message: e.to_string(),
        })?;
        Ok(match dump {
            FragmentDump::Pages(pages) => pages,
            FragmentDump::Stream(stream) => pages_from_stream(stream, LayoutMode::Blocks),
        })
    }
}
