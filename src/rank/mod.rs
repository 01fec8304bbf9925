//! Key-paragraph selection.
//!
//! A pluggable [`ParagraphRanker`] picks the most salient paragraphs of a chapter.
//! [`KeyParagraphSelector`] asks it for `round(paragraphs × ratio)` of them, then
//! sorts each selection's entities into place and time references and attaches a
//! summary per paragraph.

pub mod graph;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collab::Summarizer;
use crate::config::{LabelConfig, RankingConfig};
use crate::resolve::Entity;
use crate::span::{CharMap, TextSpan};

pub use graph::EntityGraphRanker;

/// Index into a story's document-level entity list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(pub usize);

/// A key paragraph with its entity annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Position in the story's flat paragraph list.
    pub index: usize,
    /// Document-global span.
    pub span: TextSpan,
    /// Entities that justified the selection.
    pub entities: Vec<EntityRef>,
    /// `None` when the summarizer failed for this paragraph.
    pub summary: Option<String>,
    pub place: Vec<EntityRef>,
    pub time: Vec<EntityRef>,
}

/// Scores a chapter's paragraphs.
///
/// Returns up to `target_count` selected paragraph indices (into `paragraphs`),
/// each with the indices (into `mention_groups`) of the entities behind it. All
/// spans are chapter-local.
pub trait ParagraphRanker: Send + Sync {
    fn rank(
        &self,
        chapter_text: &str,
        paragraphs: &[TextSpan],
        mention_groups: &[Vec<TextSpan>],
        target_count: usize,
    ) -> BTreeMap<usize, BTreeSet<usize>>;
}

/// Number of key paragraphs requested for a chapter.
pub fn target_count(paragraphs: usize, ratio: f64) -> usize {
    ((paragraphs as f64 * ratio).round() as usize).min(paragraphs)
}

/// One chapter as seen by the selector.
#[derive(Debug, Clone, Copy)]
pub struct ChapterView<'a> {
    /// The chapter's text.
    pub text: &'a str,
    /// Chapter start in document characters.
    pub origin: usize,
    /// `(global paragraph index, chapter-local span)`.
    pub paragraphs: &'a [(usize, TextSpan)],
    /// Entities of this chapter, with chapter-local mentions.
    pub entities: &'a [Entity],
    /// Document-level index of `entities[0]`.
    pub first_entity: usize,
}

/// Runs the ranker and annotates its selection.
pub struct KeyParagraphSelector {
    ranker: Arc<dyn ParagraphRanker>,
    summarizer: Arc<dyn Summarizer>,
    ratio: f64,
    labels: LabelConfig,
}

impl KeyParagraphSelector {
    pub fn new(
        ranker: Arc<dyn ParagraphRanker>,
        summarizer: Arc<dyn Summarizer>,
        ranking: &RankingConfig,
        labels: LabelConfig,
    ) -> Self {
        Self {
            ranker,
            summarizer,
            ratio: ranking.ratio,
            labels,
        }
    }

    /// Select and annotate the key paragraphs of one chapter, ordered by index.
    ///
    /// A ranker that returns fewer paragraphs than requested is not padded: every
    /// returned [`Paragraph`] is a real selection with its own span, and a filler
    /// entry would have no paragraph to point at. The shortfall is logged instead.
    /// A failed summary is marked per paragraph with `summary: None`.
    pub fn select(&self, chapter: ChapterView<'_>) -> Vec<Paragraph> {
        let n = chapter.paragraphs.len();
        let target = target_count(n, self.ratio);
        if target == 0 {
            return Vec::new();
        }

        let spans: Vec<TextSpan> = chapter.paragraphs.iter().map(|(_, s)| *s).collect();
        let groups: Vec<Vec<TextSpan>> = chapter.entities.iter().map(|e| e.mentions.clone()).collect();
        let mut selection = self.ranker.rank(chapter.text, &spans, &groups, target);

        let before = selection.len();
        selection.retain(|&p, _| p < n);
        if selection.len() < before {
            tracing::warn!(dropped = before - selection.len(), "ranker returned unknown paragraph indices");
        }
        if selection.len() > target {
            tracing::warn!(got = selection.len(), target, "ranker returned too many paragraphs; truncating");
            selection = selection.into_iter().take(target).collect();
        } else if selection.len() < target {
            tracing::warn!(got = selection.len(), target, "ranker returned fewer paragraphs than requested");
        }

        let chars = CharMap::new(chapter.text);
        let texts: Vec<&str> = selection
            .keys()
            .map(|&p| chars.slice(chapter.text, spans[p]).unwrap_or_default())
            .collect();
        let summaries = self.summarizer.summarize_batch(&texts);

        selection
            .into_iter()
            .zip(summaries.into_iter().map(Some).chain(std::iter::repeat_with(|| None)))
            .map(|((p, entity_ids), summary)| {
                let (index, span) = chapter.paragraphs[p];
                let mut paragraph = Paragraph {
                    index,
                    span: span.shift(chapter.origin),
                    entities: Vec::new(),
                    summary: None,
                    place: Vec::new(),
                    time: Vec::new(),
                };

                for e in entity_ids {
                    let Some(entity) = chapter.entities.get(e) else {
                        tracing::debug!(entity = e, "ranker referenced an unknown entity");
                        continue;
                    };
                    let id = EntityRef(chapter.first_entity + e);
                    paragraph.entities.push(id);
                    if entity.label.is_in(&self.labels.place) {
                        paragraph.place.push(id);
                    } else if entity.label.is_in(&self.labels.time) {
                        paragraph.time.push(id);
                    }
                }

                paragraph.summary = match summary {
                    Some(Ok(text)) => Some(text),
                    Some(Err(e)) => {
                        tracing::warn!(paragraph = index, error = %e, "summary unavailable");
                        None
                    }
                    None => None,
                };
                paragraph
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::NoSummarizer;
    use crate::error::{CollaboratorError, CollaboratorResult};
    use crate::resolve::{Description, EntityLabel};

    /// Picks fixed paragraphs regardless of input.
    struct Fixed(BTreeMap<usize, BTreeSet<usize>>);

    impl ParagraphRanker for Fixed {
        fn rank(&self, _: &str, _: &[TextSpan], _: &[Vec<TextSpan>], _: usize) -> BTreeMap<usize, BTreeSet<usize>> {
            self.0.clone()
        }
    }

    /// Summarizes everything except text containing "storm".
    struct Picky;

    impl Summarizer for Picky {
        fn summarize(&self, text: &str) -> CollaboratorResult<String> {
            if text.contains("storm") {
                return Err(CollaboratorError::Timeout {
                    service: "picky".into(),
                    timeout_secs: 1,
                });
            }
            Ok(format!("summary of {}", text.split_whitespace().next().unwrap_or("")))
        }
    }

    fn entity(name: &str, label: EntityLabel, start: usize) -> Entity {
        Entity {
            name: name.into(),
            label,
            aliases: Vec::new(),
            mentions: vec![TextSpan::new(start, start + name.len())],
            description: Description::new(),
        }
    }

    fn selector(ranker: Arc<dyn ParagraphRanker>, summarizer: Arc<dyn Summarizer>) -> KeyParagraphSelector {
        KeyParagraphSelector::new(ranker, summarizer, &RankingConfig::default(), LabelConfig::default())
    }

    #[test]
    fn target_count_rounds_and_clamps() {
        assert_eq!(target_count(4, 0.75), 3);
        assert_eq!(target_count(2, 0.75), 2);
        assert_eq!(target_count(1, 0.75), 1);
        assert_eq!(target_count(0, 0.75), 0);
        assert_eq!(target_count(10, 0.65), 7);
    }

    #[test]
    fn classifies_place_and_time() {
        // "Tom left Haifa in May." split in two paragraphs.
        let text = "Tom left Haifa in May.";
        let paragraphs = [(7, TextSpan::new(0, 14)), (8, TextSpan::new(15, 22))];
        let entities = vec![
            entity("Tom", EntityLabel::Person, 0),
            entity("Haifa", EntityLabel::Gpe, 9),
            entity("May", EntityLabel::Date, 18),
        ];
        let ranker = Fixed(BTreeMap::from([(0, BTreeSet::from([0, 1, 2]))]));
        let selected = selector(Arc::new(ranker), Arc::new(Picky)).select(ChapterView {
            text,
            origin: 100,
            paragraphs: &paragraphs,
            entities: &entities,
            first_entity: 5,
        });

        assert_eq!(selected.len(), 1);
        let p = &selected[0];
        assert_eq!(p.index, 7);
        assert_eq!(p.span, TextSpan::new(100, 114));
        assert_eq!(p.entities, vec![EntityRef(5), EntityRef(6), EntityRef(7)]);
        assert_eq!(p.place, vec![EntityRef(6)]);
        assert_eq!(p.time, vec![EntityRef(7)]);
        assert_eq!(p.summary.as_deref(), Some("summary of Tom"));
    }

    #[test]
    fn summary_failure_is_per_paragraph() {
        let text = "Calm morning at sea. A storm broke at noon. Night was quiet.";
        let paragraphs = [
            (0, TextSpan::new(0, 20)),
            (1, TextSpan::new(21, 43)),
            (2, TextSpan::new(44, 60)),
        ];
        let ranker = Fixed(BTreeMap::from([
            (0, BTreeSet::new()),
            (1, BTreeSet::new()),
            (2, BTreeSet::new()),
        ]));
        let ranking = RankingConfig {
            ratio: 1.0,
            ..Default::default()
        };
        let selector = KeyParagraphSelector::new(Arc::new(ranker), Arc::new(Picky), &ranking, LabelConfig::default());
        let selected = selector.select(ChapterView {
            text,
            origin: 0,
            paragraphs: &paragraphs,
            entities: &[],
            first_entity: 0,
        });

        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0].summary.as_deref(), Some("summary of Calm"));
        assert_eq!(selected[1].summary, None);
        assert_eq!(selected[2].summary.as_deref(), Some("summary of Night"));
    }

    #[test]
    fn out_of_range_and_excess_selections_are_dropped() {
        let text = "aaaa bbbb cccc dddd";
        let paragraphs = [
            (0, TextSpan::new(0, 4)),
            (1, TextSpan::new(5, 9)),
            (2, TextSpan::new(10, 14)),
            (3, TextSpan::new(15, 19)),
        ];
        let ranker = Fixed(BTreeMap::from([
            (0, BTreeSet::from([9])),
            (1, BTreeSet::new()),
            (2, BTreeSet::new()),
            (3, BTreeSet::new()),
            (42, BTreeSet::new()),
        ]));
        let selected = selector(Arc::new(ranker), Arc::new(NoSummarizer)).select(ChapterView {
            text,
            origin: 0,
            paragraphs: &paragraphs,
            entities: &[],
            first_entity: 0,
        });

        assert_eq!(selected.len(), 3);
        assert!(selected.iter().all(|p| p.summary.is_none()));
        assert!(selected[0].entities.is_empty());
    }

    #[test]
    fn short_selection_is_kept_as_is() {
        let text = "aaaa bbbb cccc dddd";
        let paragraphs = [
            (0, TextSpan::new(0, 4)),
            (1, TextSpan::new(5, 9)),
            (2, TextSpan::new(10, 14)),
            (3, TextSpan::new(15, 19)),
        ];
        let ranker = Fixed(BTreeMap::from([(2, BTreeSet::new())]));
        let selected = selector(Arc::new(ranker), Arc::new(Picky)).select(ChapterView {
            text,
            origin: 0,
            paragraphs: &paragraphs,
            entities: &[],
            first_entity: 0,
        });

        assert_eq!(target_count(paragraphs.len(), RankingConfig::default().ratio), 3);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].index, 2);
        assert_eq!(selected[0].summary.as_deref(), Some("summary of cccc"));
    }

    #[test]
    fn empty_chapter_selects_nothing() {
        let ranker = Arc::new(EntityGraphRanker::default());
        let selected = selector(ranker, Arc::new(NoSummarizer)).select(ChapterView {
            text: "",
            origin: 0,
            paragraphs: &[],
            entities: &[],
            first_entity: 0,
        });
        assert!(selected.is_empty());
    }
}
