//! Serialization round-trip tests.
//!
//! A story written to disk as JSON and read back must carry exactly the same
//! `(start, end)` pairs; nothing is re-derived from the text.

use std::sync::Arc;

use storyline::collab::{CorefProvider, NerProvider};
use storyline::config::StoryConfig;
use storyline::error::CollaboratorResult;
use storyline::layout::{Page, PositionedFragment};
use storyline::pipeline::{Collaborators, Pipeline, Story};
use storyline::resolve::{CorefCluster, NerSpan};
use storyline::span::TextSpan;

/// Tags "Zoë" wherever it starts a chapter-local word.
struct ZoeNer;

fn zoe_spans(text: &str) -> Vec<TextSpan> {
    let chars: Vec<char> = text.chars().collect();
    (0..chars.len())
        .filter(|&i| chars[i..].starts_with(&['Z', 'o', 'ë']))
        .map(|i| TextSpan::new(i, i + 3))
        .collect()
}

impl NerProvider for ZoeNer {
    fn tag(&self, chapter_text: &str) -> CollaboratorResult<Vec<NerSpan>> {
        Ok(zoe_spans(chapter_text)
            .into_iter()
            .map(|s| NerSpan::new("Zoë", "PERSON", s.start, s.end))
            .collect())
    }
}

struct ZoeCoref;

impl CorefProvider for ZoeCoref {
    fn resolve(&self, chapter_text: &str) -> CollaboratorResult<Vec<CorefCluster>> {
        let spans = zoe_spans(chapter_text);
        if spans.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![CorefCluster::new(spans.into_iter().map(|s| ("Zoë", s)))])
    }
}

fn story() -> Story {
    let pages = vec![
        Page::blocks(vec![
            PositionedFragment::new(50.0, 90.0, 40.0, "Zoë crossed the frozen café terrace and waved at the naïve porter"),
            PositionedFragment::new(100.0, 140.0, 40.0, "The porter smiled because Zoë always tipped him twice on Sundays"),
        ]),
        Page::blocks(vec![PositionedFragment::new(
            300.0,
            400.0,
            40.0,
            "Much later Zoë wrote about that winter in a long letter to her sister",
        )]),
    ];
    let collaborators = Collaborators {
        ner: Arc::new(ZoeNer),
        coref: Arc::new(ZoeCoref),
        ..Default::default()
    };
    Pipeline::new(StoryConfig::default(), collaborators)
        .process_pages(&pages)
        .unwrap()
}

#[test]
fn spans_survive_json_file_round_trip() {
    let original = story();
    assert_eq!(original.chapter_count(), 2);
    assert!(!original.entities.is_empty());

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("story.json");
    std::fs::write(&path, serde_json::to_string_pretty(&original).unwrap()).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let restored: Story = serde_json::from_str(&content).unwrap();

    assert_eq!(restored.text, original.text);
    assert_eq!(restored.chapters, original.chapters);
    assert_eq!(restored.paragraphs, original.paragraphs);
    assert_eq!(restored.entities, original.entities);
    assert_eq!(restored.key_paragraphs, original.key_paragraphs);
}

#[test]
fn restored_spans_slice_the_same_text() {
    let original = story();
    let json = serde_json::to_string(&original).unwrap();
    let restored: Story = serde_json::from_str(&json).unwrap();

    for entity in &restored.entities {
        for mention in &entity.mentions {
            assert_eq!(restored.paragraph_text(*mention), Some("Zoë"));
        }
    }
    for i in 0..restored.chapter_count() {
        assert_eq!(restored.chapter_text(i), original.chapter_text(i));
    }
}

#[test]
fn spans_serialize_as_pairs() {
    let story = story();
    let value = serde_json::to_value(&story).unwrap();
    let first = &value["chapters"][0];
    assert_eq!(first[0].as_u64(), Some(story.chapters[0].start as u64));
    assert_eq!(first[1].as_u64(), Some(story.chapters[0].end as u64));
}
