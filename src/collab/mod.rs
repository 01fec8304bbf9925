//! External model collaborators.
//!
//! The NER tagger, coreference model, summarizer and description enricher are
//! reached through the traits below. Handles are created once at process start
//! and shared read-only with every chapter worker, so implementations must be
//! `Send + Sync` and safe to call concurrently.
//!
//! Every call may fail. Callers recover locally: an empty result for NER and
//! coreference, a missing summary or description otherwise.

pub mod http;
pub mod ollama;

use std::collections::BTreeMap;

use crate::error::{CollaboratorError, CollaboratorResult};
use crate::resolve::{CorefCluster, Description, Entity, NerSpan};

pub use http::{HttpCoref, HttpNer, HttpSummarizer, JsonService};
pub use ollama::OllamaDescriber;

/// Tags named entities in a chapter. Offsets are chapter-local, half-open.
pub trait NerProvider: Send + Sync {
    fn tag(&self, chapter_text: &str) -> CollaboratorResult<Vec<NerSpan>>;
}

/// Groups mentions of the same entity. Offsets are chapter-local, half-open.
pub trait CorefProvider: Send + Sync {
    fn resolve(&self, chapter_text: &str) -> CollaboratorResult<Vec<CorefCluster>>;
}

/// Abstractive paragraph summaries.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> CollaboratorResult<String>;

    /// One result per input, in order. A failed item never affects the others.
    fn summarize_batch(&self, texts: &[&str]) -> Vec<CollaboratorResult<String>> {
        texts.iter().map(|t| self.summarize(t)).collect()
    }
}

/// Appearance features per entity, keyed by entity name or alias.
pub trait DescriptionEnricher: Send + Sync {
    fn describe(
        &self,
        chapter_text: &str,
        entities: &[Entity],
    ) -> CollaboratorResult<BTreeMap<String, Description>>;
}

// ---------------------------------------------------------------------------
// No-op collaborators
// ---------------------------------------------------------------------------

/// NER provider used when no tagger is configured. Tags nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNer;

impl NerProvider for NoNer {
    fn tag(&self, _chapter_text: &str) -> CollaboratorResult<Vec<NerSpan>> {
        Ok(Vec::new())
    }
}

/// Coreference provider used when no model is configured. Finds no clusters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCoref;

impl CorefProvider for NoCoref {
    fn resolve(&self, _chapter_text: &str) -> CollaboratorResult<Vec<CorefCluster>> {
        Ok(Vec::new())
    }
}

/// Summarizer used when none is configured. Every call is `Unavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSummarizer;

impl Summarizer for NoSummarizer {
    fn summarize(&self, _text: &str) -> CollaboratorResult<String> {
        Err(CollaboratorError::Unavailable {
            service: "summarizer".into(),
        })
    }
}

/// Enricher used when none is configured. Describes nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDescriptions;

impl DescriptionEnricher for NoDescriptions {
    fn describe(
        &self,
        _chapter_text: &str,
        _entities: &[Entity],
    ) -> CollaboratorResult<BTreeMap<String, Description>> {
        Ok(BTreeMap::new())
    }
}
