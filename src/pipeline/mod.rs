//! Document pipeline: extraction, segmentation, resolution, ranking.
//!
//! ```text
//! file ─▶ FragmentSource ─▶ Segmenter ─▶ per chapter: NER + coref ─▶ resolve
//!                                                 └─▶ rank + summarize ─▶ Story
//! ```
//!
//! Chapters are independent. Resolution and ranking run on rayon's pool with one
//! chapter per task; each task owns its chapter's interval index. Results are
//! joined in chapter order before the story is assembled.

pub mod story;

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;

use crate::collab::{
    CorefProvider, DescriptionEnricher, HttpCoref, HttpNer, HttpSummarizer, NerProvider, NoCoref,
    NoDescriptions, NoNer, NoSummarizer, OllamaDescriber, Summarizer,
};
use crate::config::{RankingConfig, ServicesConfig, StoryConfig};
use crate::error::{StoryError, StoryResult};
use crate::layout::{Page, Segmentation, Segmenter, detect_format, source_for};
use crate::rank::{ChapterView, EntityGraphRanker, EntityRef, KeyParagraphSelector, Paragraph, ParagraphRanker};
use crate::resolve::{self, Entity};
use crate::span::TextSpan;

pub use story::Story;

/// Shared handles to every external collaborator.
#[derive(Clone)]
pub struct Collaborators {
    pub ner: Arc<dyn NerProvider>,
    pub coref: Arc<dyn CorefProvider>,
    pub summarizer: Arc<dyn Summarizer>,
    pub describer: Arc<dyn DescriptionEnricher>,
    pub ranker: Arc<dyn ParagraphRanker>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            ner: Arc::new(NoNer),
            coref: Arc::new(NoCoref),
            summarizer: Arc::new(NoSummarizer),
            describer: Arc::new(NoDescriptions),
            ranker: Arc::new(EntityGraphRanker::default()),
        }
    }
}

impl Collaborators {
    /// HTTP clients for every configured service, no-ops for the rest.
    pub fn from_config(services: &ServicesConfig, ranking: &RankingConfig) -> Self {
        let timeout = services.timeout_secs;
        let ner: Arc<dyn NerProvider> = match &services.ner_url {
            Some(url) => Arc::new(HttpNer::new(url.as_str(), timeout)),
            None => Arc::new(NoNer),
        };
        let coref: Arc<dyn CorefProvider> = match &services.coref_url {
            Some(url) => Arc::new(HttpCoref::new(url.as_str(), timeout)),
            None => Arc::new(NoCoref),
        };
        let summarizer: Arc<dyn Summarizer> = match &services.summarizer_url {
            Some(url) => Arc::new(HttpSummarizer::new(url.as_str(), timeout)),
            None => Arc::new(NoSummarizer),
        };
        let describer: Arc<dyn DescriptionEnricher> = match &services.ollama {
            Some(ollama) => Arc::new(OllamaDescriber::new(ollama.clone())),
            None => Arc::new(NoDescriptions),
        };

        tracing::debug!(
            ner = services.ner_url.is_some(),
            coref = services.coref_url.is_some(),
            summarizer = services.summarizer_url.is_some(),
            descriptions = services.ollama.is_some(),
            "configured collaborators"
        );

        Self {
            ner,
            coref,
            summarizer,
            describer,
            ranker: Arc::new(EntityGraphRanker::from_config(ranking)),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Turns documents into [`Story`] values.
pub struct Pipeline {
    config: StoryConfig,
    segmenter: Segmenter,
    ner: Arc<dyn NerProvider>,
    coref: Arc<dyn CorefProvider>,
    describer: Arc<dyn DescriptionEnricher>,
    selector: KeyParagraphSelector,
}

impl Pipeline {
    pub fn new(config: StoryConfig, collaborators: Collaborators) -> Self {
        let selector = KeyParagraphSelector::new(
            collaborators.ranker,
            collaborators.summarizer,
            &config.ranking,
            config.labels.clone(),
        );
        Self {
            segmenter: Segmenter::new(config.layout.clone()),
            ner: collaborators.ner,
            coref: collaborators.coref,
            describer: collaborators.describer,
            selector,
            config,
        }
    }

    /// Pipeline with collaborators built from `config.services`.
    pub fn from_config(config: StoryConfig) -> Self {
        let collaborators = Collaborators::from_config(&config.services, &config.ranking);
        Self::new(config, collaborators)
    }

    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    /// Extract the pages of a PDF or JSON fragment dump.
    pub fn read_pages(&self, path: &Path) -> StoryResult<Vec<Page>> {
        let origin = path.display().to_string();
        let format = detect_format(&origin).ok_or_else(|| StoryError::UnsupportedFormat {
            origin: origin.clone(),
        })?;
        let data = std::fs::read(path).map_err(|e| StoryError::Io {
            path: origin.clone(),
            source: e,
        })?;

        let source = source_for(format);
        let pages = source.pages(&data)?;
        tracing::info!(file = %origin, source = source.name(), pages = pages.len(), "extracted pages");
        Ok(pages)
    }

    /// Extract and segment a file without resolving entities.
    pub fn segment_file(&self, path: &Path) -> StoryResult<Segmentation> {
        let pages = self.read_pages(path)?;
        let segmentation = self.segmenter.segment(&pages);
        if segmentation.is_empty() {
            return Err(StoryError::EmptyDocument {
                origin: path.display().to_string(),
            });
        }
        Ok(segmentation)
    }

    /// Run the whole pipeline on a file.
    pub fn process_file(&self, path: &Path) -> StoryResult<Story> {
        let segmentation = self.segment_file(path)?;
        Ok(self.assemble(segmentation))
    }

    /// Run the whole pipeline on already extracted pages.
    pub fn process_pages(&self, pages: &[Page]) -> StoryResult<Story> {
        let segmentation = self.segmenter.segment(pages);
        if segmentation.is_empty() {
            return Err(StoryError::EmptyDocument {
                origin: "pages".into(),
            });
        }
        Ok(self.assemble(segmentation))
    }

    fn assemble(&self, segmentation: Segmentation) -> Story {
        let Segmentation {
            text,
            chapters,
            paragraphs,
        } = segmentation;
        let mut story = Story::new(text, chapters, paragraphs, Vec::new(), Vec::new());

        let chapter_texts: Vec<&str> = (0..story.chapter_count())
            .map(|i| story.chapter_text(i).unwrap_or_default())
            .collect();

        // Stage 1: entities per chapter, chapter-local.
        let local_entities: Vec<Vec<Entity>> = chapter_texts
            .par_iter()
            .enumerate()
            .map(|(i, text)| self.resolve_chapter(i, text))
            .collect();

        // Stage 2: key paragraphs per chapter.
        let first_entity: Vec<usize> = local_entities
            .iter()
            .scan(0, |next, entities| {
                let first = *next;
                *next += entities.len();
                Some(first)
            })
            .collect();

        let mut key_paragraphs: Vec<Vec<Paragraph>> = (0..story.chapter_count())
            .into_par_iter()
            .map(|i| {
                let origin = story.chapters[i].start;
                let paragraphs: Vec<(usize, TextSpan)> = story
                    .chapter_paragraphs(i)
                    .filter_map(|(idx, span)| span.relative_to(origin).map(|local| (idx, local)))
                    .collect();
                let selected = self.selector.select(ChapterView {
                    text: chapter_texts[i],
                    origin,
                    paragraphs: &paragraphs,
                    entities: &local_entities[i],
                    first_entity: first_entity[i],
                });
                tracing::debug!(chapter = i, paragraphs = paragraphs.len(), selected = selected.len(), "ranked chapter");
                selected
            })
            .collect();

        // Join: shift mentions into document coordinates.
        let global_entities: Vec<Vec<Entity>> = local_entities
            .into_iter()
            .zip(&story.chapters)
            .map(|(chapter_entities, chapter)| {
                chapter_entities
                    .into_iter()
                    .map(|mut e| {
                        for mention in &mut e.mentions {
                            *mention = mention.shift(chapter.start);
                        }
                        e
                    })
                    .collect()
            })
            .collect();

        let entities = if self.config.merge_across_chapters {
            let (merged, remap) = resolve::merge_across_chapters(global_entities, &self.config.gender);
            for paragraph in key_paragraphs.iter_mut().flatten() {
                for refs in [&mut paragraph.entities, &mut paragraph.place, &mut paragraph.time] {
                    for r in refs.iter_mut() {
                        *r = EntityRef(remap[r.0]);
                    }
                    refs.sort();
                    refs.dedup();
                }
            }
            merged
        } else {
            global_entities.concat()
        };

        story.entities = entities;
        story.key_paragraphs = key_paragraphs;
        tracing::info!(
            chapters = story.chapter_count(),
            paragraphs = story.paragraph_count(),
            entities = story.entity_count(),
            key_paragraphs = story.key_paragraphs.iter().map(Vec::len).sum::<usize>(),
            "assembled story"
        );
        story
    }

    /// NER, coreference, resolution and enrichment for one chapter.
    ///
    /// Collaborator failures degrade to empty results.
    fn resolve_chapter(&self, chapter: usize, text: &str) -> Vec<Entity> {
        let ner = self.ner.tag(text).unwrap_or_else(|e| {
            tracing::warn!(chapter, error = %e, "NER failed; continuing without entity labels");
            Vec::new()
        });
        let clusters = self.coref.resolve(text).unwrap_or_else(|e| {
            tracing::warn!(chapter, error = %e, "coreference failed; continuing without entities");
            Vec::new()
        });

        let mut entities = resolve::resolve_chapter(&ner, &clusters);

        if !entities.is_empty() {
            match self.describer.describe(text, &entities) {
                Ok(descriptions) => {
                    resolve::attach_descriptions(&mut entities, descriptions);
                }
                Err(e) => tracing::warn!(chapter, error = %e, "descriptions unavailable"),
            }
            resolve::assign_gender(&mut entities, &self.config.gender);
        }

        tracing::debug!(
            chapter,
            ner = ner.len(),
            clusters = clusters.len(),
            entities = entities.len(),
            "resolved chapter"
        );
        entities
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PositionedFragment;

    fn sentence(words: usize) -> String {
        vec!["word"; words].join(" ")
    }

    fn two_paragraph_page() -> Page {
        Page::blocks(vec![
            PositionedFragment::new(100.0, 200.0, 50.0, sentence(12)),
            PositionedFragment::new(220.0, 320.0, 50.0, sentence(12)),
        ])
    }

    #[test]
    fn empty_pages_are_an_empty_document() {
        let pipeline = Pipeline::new(StoryConfig::default(), Collaborators::default());
        let result = pipeline.process_pages(&[Page::blocks(Vec::new())]);
        assert!(matches!(result, Err(StoryError::EmptyDocument { .. })));
    }

    #[test]
    fn unsupported_extension() {
        let pipeline = Pipeline::new(StoryConfig::default(), Collaborators::default());
        let result = pipeline.process_file(Path::new("novel.epub"));
        assert!(matches!(result, Err(StoryError::UnsupportedFormat { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let pipeline = Pipeline::new(StoryConfig::default(), Collaborators::default());
        let result = pipeline.process_file(Path::new("/nonexistent/novel.pdf"));
        assert!(matches!(result, Err(StoryError::Io { .. })));
    }

    #[test]
    fn no_collaborators_still_yields_structure() {
        let pipeline = Pipeline::new(StoryConfig::default(), Collaborators::default());
        let story = pipeline.process_pages(&[two_paragraph_page()]).unwrap();

        assert_eq!(story.chapter_count(), 1);
        assert_eq!(story.paragraph_count(), 2);
        assert!(story.entities.is_empty());
        assert_eq!(story.key_paragraphs.len(), 1);
        // round(2 * 0.75) = 2
        assert_eq!(story.key_paragraphs[0].len(), 2);
        assert!(story.key_paragraphs[0].iter().all(|p| p.summary.is_none()));
    }
}
