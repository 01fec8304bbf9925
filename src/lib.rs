// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # storyline
//!
//! Structure and salience for long-form documents: chapters and paragraphs from
//! page layout, entities from NER and coreference annotations, and key
//! paragraphs ranked by shared entities.
//!
//! ## Architecture
//!
//! - **Spans** (`span`, `interval`): half-open character ranges and an AVL
//!   interval tree answering overlap queries
//! - **Layout** (`layout`): PDF and JSON fragment sources, geometric segmentation
//!   into flattened text, chapter spans and paragraph spans
//! - **Resolution** (`resolve`): coreference clusters labelled by overlapping NER
//!   spans, plus description, gender and optional cross-chapter merging
//! - **Ranking** (`rank`): weighted PageRank over a paragraph co-occurrence graph
//! - **Collaborators** (`collab`): NER, coreference, summarizer and description
//!   services behind traits, with HTTP, Ollama and no-op implementations
//! - **Pipeline** (`pipeline`): per-chapter parallel orchestration into a [`Story`]
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//! use storyline::config::StoryConfig;
//! use storyline::pipeline::Pipeline;
//!
//! let pipeline = Pipeline::from_config(StoryConfig::default());
//! let story = pipeline.process_file(Path::new("novel.pdf")).unwrap();
//! for (i, key) in story.key_paragraphs.iter().enumerate() {
//!     println!("chapter {i}: {} key paragraphs", key.len());
//! }
//! ```

pub mod collab;
pub mod config;
pub mod error;
pub mod interval;
pub mod layout;
pub mod pipeline;
pub mod rank;
pub mod resolve;
pub mod span;

pub use pipeline::{Pipeline, Story};
