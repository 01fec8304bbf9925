//! The assembled result of processing one document.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::rank::Paragraph;
use crate::resolve::Entity;
use crate::span::{CharMap, TextSpan};

/// A processed document.
///
/// Every span is a document-global character range into `text` and is serialized
/// verbatim. `key_paragraphs[i]` belongs to `chapters[i]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Story {
    pub text: String,
    pub chapters: Vec<TextSpan>,
    /// Flat, chapter-agnostic paragraph list in document order.
    pub paragraphs: Vec<TextSpan>,
    pub entities: Vec<Entity>,
    pub key_paragraphs: Vec<Vec<Paragraph>>,
    #[serde(skip)]
    chars: OnceLock<CharMap>,
}

impl Story {
    pub fn new(
        text: String,
        chapters: Vec<TextSpan>,
        paragraphs: Vec<TextSpan>,
        entities: Vec<Entity>,
        key_paragraphs: Vec<Vec<Paragraph>>,
    ) -> Self {
        Self {
            text,
            chapters,
            paragraphs,
            entities,
            key_paragraphs,
            chars: OnceLock::new(),
        }
    }

    fn char_map(&self) -> &CharMap {
        self.chars.get_or_init(|| CharMap::new(&self.text))
    }

    /// Text covered by `span`, or `None` if it lies outside the document.
    pub fn paragraph_text(&self, span: TextSpan) -> Option<&str> {
        self.char_map().slice(&self.text, span)
    }

    pub fn chapter_text(&self, chapter: usize) -> Option<&str> {
        self.paragraph_text(*self.chapters.get(chapter)?)
    }

    /// `(index, span)` of every paragraph inside chapter `chapter`.
    pub fn chapter_paragraphs(&self, chapter: usize) -> impl Iterator<Item = (usize, TextSpan)> + '_ {
        let range = self.chapters.get(chapter).copied();
        let first = range.map_or(self.paragraphs.len(), |c| {
            self.paragraphs.partition_point(|p| p.start < c.start)
        });
        self.paragraphs
            .iter()
            .copied()
            .enumerate()
            .skip(first)
            .take_while(move |(_, p)| range.is_some_and(|c| c.contains(p)))
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length of the document text in characters.
    pub fn char_len(&self) -> usize {
        self.char_map().char_len()
    }
}
