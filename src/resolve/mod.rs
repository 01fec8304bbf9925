//! Entity resolution: coreference clusters matched to NER labels.
//!
//! Per chapter, every NER span goes into an [`IntervalTree`]. Each mention of a
//! coreference cluster is looked up in that tree, and the labels of the NER spans
//! it overlaps vote on the cluster's label. The tree lives only for the chapter.
//!
//! All offsets handled here are chapter-local.

pub mod enrich;
pub mod label;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::interval::IntervalTree;
use crate::span::TextSpan;

pub use enrich::{assign_gender, attach_descriptions, merge_across_chapters, parse_descriptions};
pub use label::EntityLabel;

/// Features of one entity, e.g. `{"hair": "red"}`.
pub type Description = BTreeMap<String, String>;

/// A named-entity mention from the NER tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerSpan {
    pub text: String,
    pub label: EntityLabel,
    pub span: TextSpan,
}

impl NerSpan {
    pub fn new(text: impl Into<String>, label: impl Into<EntityLabel>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
            span: TextSpan::new(start, end),
        }
    }
}

/// Mentions judged by the coreference model to refer to one entity.
///
/// `mention_texts[i]` is the surface text at `mention_spans[i]`, in the order the
/// model emitted them. Spans are half-open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorefCluster {
    pub mention_texts: Vec<String>,
    pub mention_spans: Vec<TextSpan>,
}

impl CorefCluster {
    pub fn new(mentions: impl IntoIterator<Item = (impl Into<String>, TextSpan)>) -> Self {
        let (mention_texts, mention_spans) = mentions
            .into_iter()
            .map(|(t, s)| (Into::<String>::into(t), s))
            .unzip();
        Self {
            mention_texts,
            mention_spans,
        }
    }

    /// Paired `(text, span)` mentions; unpaired trailing entries are ignored.
    pub fn mentions(&self) -> impl Iterator<Item = (&str, TextSpan)> {
        self.mention_texts
            .iter()
            .map(String::as_str)
            .zip(self.mention_spans.iter().copied())
    }
}

/// A resolved entity: one coreference cluster with a majority NER label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Text of the cluster's first emitted mention.
    pub name: String,
    pub label: EntityLabel,
    /// Texts of the remaining mentions, duplicates included.
    pub aliases: Vec<String>,
    /// Every mention span, sorted by start.
    pub mentions: Vec<TextSpan>,
    #[serde(default)]
    pub description: Description,
}

impl Entity {
    /// Name followed by every alias.
    pub fn surface_forms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Whether `form` is the name or one of the aliases.
    pub fn is_called(&self, form: &str) -> bool {
        self.surface_forms().any(|f| f == form)
    }
}

/// NER spans and coreference clusters for one chapter.
#[derive(Debug, Clone, Default)]
pub struct ChapterAnnotations {
    pub ner: Vec<NerSpan>,
    pub clusters: Vec<CorefCluster>,
}

/// Most frequent label; ties go to the label seen first.
fn majority_label(votes: &[&EntityLabel]) -> EntityLabel {
    let mut tally: Vec<(&EntityLabel, usize)> = Vec::new();
    for &label in votes {
        match tally.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => tally.push((label, 1)),
        }
    }
    // `max_by_key` keeps the last maximum, so scan in reverse to keep the first.
    tally
        .iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map_or(EntityLabel::Unknown, |(label, _)| (*label).clone())
}

/// Resolve one chapter's clusters into entities.
///
/// A cluster without mentions yields no entity. Each mention votes with the NER
/// span it overlaps, whichever cluster it belongs to, so the result does not
/// depend on the order clusters arrive in.
pub fn resolve_chapter(ner: &[NerSpan], clusters: &[CorefCluster]) -> Vec<Entity> {
    let tree: IntervalTree<usize> = ner
        .iter()
        .enumerate()
        .filter(|(_, n)| n.span.is_valid())
        .map(|(i, n)| (n.span, i))
        .collect();

    let mut entities = Vec::with_capacity(clusters.len());

    for (cluster_idx, cluster) in clusters.iter().enumerate() {
        if cluster.mention_texts.len() != cluster.mention_spans.len() {
            tracing::warn!(
                cluster = cluster_idx,
                texts = cluster.mention_texts.len(),
                spans = cluster.mention_spans.len(),
                "coreference cluster has unpaired mentions"
            );
        }

        let mut votes: Vec<&EntityLabel> = Vec::new();
        let mut texts: Vec<&str> = Vec::new();
        let mut mentions: Vec<TextSpan> = Vec::new();

        for (text, span) in cluster.mentions() {
            if !span.is_valid() {
                continue;
            }
            texts.push(text);
            mentions.push(span);

            if let Some((_, &idx)) = tree.overlap_search(span) {
                votes.push(&ner[idx].label);
            }
        }

        let Some((name, aliases)) = texts.split_first() else {
            continue;
        };
        mentions.sort();

        entities.push(Entity {
            name: (*name).to_string(),
            label: majority_label(&votes),
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
            mentions,
            description: Description::new(),
        });
    }

    // The tree is dropped here; it never outlives the chapter.
    entities
}

/// Resolve every chapter and concatenate the results in chapter order.
///
/// No merging happens across chapters.
pub fn resolve_document(chapters: &[ChapterAnnotations]) -> Vec<Vec<Entity>> {
    chapters
        .iter()
        .map(|c| resolve_chapter(&c.ner, &c.clusters))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(mentions: &[(&str, usize, usize)]) -> CorefCluster {
        CorefCluster::new(mentions.iter().map(|(t, s, e)| (*t, TextSpan::new(*s, *e))))
    }

    #[test]
    fn tom_ran_scenario() {
        // "Tom ran. Tom ran fast."
        let ner = vec![NerSpan::new("Tom", "PERSON", 0, 3)];
        let clusters = vec![cluster(&[("Tom", 0, 3), ("Tom", 9, 12)])];
        let entities = resolve_chapter(&ner, &clusters);

        assert_eq!(entities.len(), 1);
        let tom = &entities[0];
        assert_eq!(tom.name, "Tom");
        assert_eq!(tom.label, EntityLabel::Person);
        assert_eq!(tom.aliases, vec!["Tom"]);
        assert_eq!(tom.mentions, vec![TextSpan::new(0, 3), TextSpan::new(9, 12)]);
    }

    #[test]
    fn majority_label_wins() {
        let ner = vec![
            NerSpan::new("Paris", "GPE", 0, 5),
            NerSpan::new("Paris", "GPE", 20, 25),
            NerSpan::new("Paris", "PERSON", 40, 45),
        ];
        let clusters = vec![cluster(&[("Paris", 0, 5), ("Paris", 20, 25), ("Paris", 40, 45)])];
        let entities = resolve_chapter(&ner, &clusters);
        assert_eq!(entities[0].label, EntityLabel::Gpe);
    }

    #[test]
    fn no_overlap_is_unknown() {
        let clusters = vec![cluster(&[("he", 10, 12), ("him", 30, 33)])];
        let entities = resolve_chapter(&[], &clusters);
        assert_eq!(entities[0].label, EntityLabel::Unknown);
    }

    #[test]
    fn tie_goes_to_first_seen_label() {
        let ner = vec![NerSpan::new("Jordan", "GPE", 0, 6), NerSpan::new("Jordan", "PERSON", 10, 16)];
        let clusters = vec![cluster(&[("Jordan", 0, 6), ("Jordan", 10, 16)])];
        assert_eq!(resolve_chapter(&ner, &clusters)[0].label, EntityLabel::Gpe);

        let clusters = vec![cluster(&[("Jordan", 10, 16), ("Jordan", 0, 6)])];
        assert_eq!(resolve_chapter(&ner, &clusters)[0].label, EntityLabel::Person);
    }

    #[test]
    fn empty_clusters_yield_no_entities() {
        let ner = vec![NerSpan::new("Tom", "PERSON", 0, 3)];
        assert!(resolve_chapter(&ner, &[]).is_empty());
        assert!(resolve_chapter(&ner, &[CorefCluster::default()]).is_empty());
    }

    #[test]
    fn name_is_first_emitted_mention_and_mentions_are_sorted() {
        let clusters = vec![cluster(&[("the captain", 50, 61), ("Ahab", 4, 8), ("he", 70, 72)])];
        let entity = &resolve_chapter(&[], &clusters)[0];
        assert_eq!(entity.name, "the captain");
        assert_eq!(entity.aliases, vec!["Ahab", "he"]);
        assert_eq!(entity.mentions[0], TextSpan::new(4, 8));
    }

    #[test]
    fn aliases_keep_duplicates() {
        let clusters = vec![cluster(&[("Tom", 0, 3), ("he", 5, 7), ("he", 9, 11)])];
        let entity = &resolve_chapter(&[], &clusters)[0];
        assert_eq!(entity.aliases, vec!["he", "he"]);
    }

    #[test]
    fn shared_ner_span_votes_for_every_cluster() {
        let ner = vec![NerSpan::new("Tom Smith", "PERSON", 0, 9)];
        let clusters = vec![cluster(&[("Tom", 0, 3)]), cluster(&[("Smith", 4, 9)])];
        let entities = resolve_chapter(&ner, &clusters);
        assert_eq!(entities[0].label, EntityLabel::Person);
        assert_eq!(entities[1].label, EntityLabel::Person);
    }

    #[test]
    fn labels_do_not_depend_on_cluster_order() {
        // "The house of Tom was quiet; he slept."
        let ner = vec![NerSpan::new("Tom", "PERSON", 13, 16)];
        let house = cluster(&[("the house of Tom", 0, 16)]);
        let tom = cluster(&[("Tom", 13, 16), ("he", 30, 32)]);

        let labels = |clusters: Vec<CorefCluster>| {
            let mut out: Vec<(String, EntityLabel)> = resolve_chapter(&ner, &clusters)
                .into_iter()
                .map(|e| (e.name, e.label))
                .collect();
            out.sort_by(|a, b| a.0.cmp(&b.0));
            out
        };

        let tom_first = labels(vec![tom.clone(), house.clone()]);
        let house_first = labels(vec![house, tom]);
        assert_eq!(tom_first, house_first);
        assert!(tom_first.contains(&("Tom".to_string(), EntityLabel::Person)));
    }

    #[test]
    fn chapters_are_not_merged() {
        let chapter = ChapterAnnotations {
            ner: vec![NerSpan::new("Tom", "PERSON", 0, 3)],
            clusters: vec![cluster(&[("Tom", 0, 3)])],
        };
        let per_chapter = resolve_document(&[chapter.clone(), chapter]);
        assert_eq!(per_chapter.len(), 2);
        assert_eq!(per_chapter.concat().len(), 2);
    }
}
