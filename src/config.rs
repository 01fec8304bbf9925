//! Pipeline configuration, stored as TOML.
//!
//! Every field has a default, so an empty file (or no file at all) is a valid
//! configuration. Tuning constants for the layout heuristics and the ranking ratio
//! live here rather than at call sites.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoryError, StoryResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Merge same-named entities across chapters after per-chapter resolution.
    pub merge_across_chapters: bool,
    pub layout: LayoutConfig,
    pub ranking: RankingConfig,
    pub labels: LabelConfig,
    pub gender: GenderConfig,
    pub services: ServicesConfig,
}

/// Geometry thresholds for the layout segmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Line height used when no fragment has a measurable height.
    pub fallback_line_height: f32,
    /// Glyph height used for word-mode pages with no measurable word.
    pub fallback_glyph_height: f32,
    /// Chapter threshold, in multiples of the average line height.
    pub chapter_gap_lines: f32,
    /// Word-mode paragraph threshold, in multiples of the page's glyph height.
    pub word_gap_factor: f32,
    /// Paragraphs with fewer words are folded into the next one.
    pub min_paragraph_words: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            fallback_line_height: 17.0,
            fallback_glyph_height: 12.0,
            chapter_gap_lines: 10.0,
            word_gap_factor: 1.1,
            min_paragraph_words: 10,
        }
    }
}

/// Key-paragraph selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Fraction of a chapter's paragraphs selected as key paragraphs.
    pub ratio: f64,
    /// PageRank damping factor.
    pub damping: f64,
    /// PageRank power iterations.
    pub iterations: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            ratio: 0.75,
            damping: 0.85,
            iterations: 50,
        }
    }
}

/// NER label sets used to classify key-paragraph entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub place: Vec<String>,
    pub time: Vec<String>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            place: vec!["GPE".into(), "LOC".into(), "FAC".into()],
            time: vec!["DATE".into(), "TIME".into()],
        }
    }
}

/// Cue words used to attach a gender to PERSON entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenderConfig {
    pub male: Vec<String>,
    pub female: Vec<String>,
}

impl Default for GenderConfig {
    fn default() -> Self {
        let words = |list: &[&str]| -> Vec<String> { list.iter().map(|w| (*w).to_string()).collect() };
        Self {
            male: words(&[
                "he", "him", "his", "himself", "mr", "mr.", "sir", "man", "boy", "father",
                "brother", "son", "king", "lord", "uncle",
            ]),
            female: words(&[
                "she", "her", "hers", "herself", "mrs", "mrs.", "ms", "ms.", "miss", "madam",
                "woman", "girl", "mother", "sister", "daughter", "queen", "lady", "aunt",
            ]),
        }
    }
}

/// Endpoints of the external model collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub ner_url: Option<String>,
    pub coref_url: Option<String>,
    pub summarizer_url: Option<String>,
    /// Per-request timeout for the HTTP collaborators.
    pub timeout_secs: u64,
    pub ollama: Option<OllamaConfig>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            ner_url: None,
            coref_url: None,
            summarizer_url: None,
            timeout_secs: 120,
            ollama: None,
        }
    }
}

/// Ollama endpoint used for character descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

impl StoryConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> StoryResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StoryError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| StoryError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> StoryResult<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoryError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| StoryError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn to_toml(&self) -> StoryResult<String> {
        toml::to_string_pretty(self).map_err(|e| StoryError::Config {
            message: format!("serialize: {e}"),
        })
    }

    /// Reject values the heuristics cannot work with.
    pub fn validate(&self) -> StoryResult<()> {
        let invalid = |message: String| -> StoryResult<()> { Err(StoryError::Config { message }) };

        if !(self.ranking.ratio > 0.0 && self.ranking.ratio <= 1.0) {
            return invalid(format!("ranking.ratio must be in (0, 1], got {}", self.ranking.ratio));
        }
        if !(0.0..1.0).contains(&self.ranking.damping) {
            return invalid(format!(
                "ranking.damping must be in [0, 1), got {}",
                self.ranking.damping
            ));
        }
        if self.layout.fallback_line_height <= 0.0 || self.layout.fallback_glyph_height <= 0.0 {
            return invalid("layout fallback heights must be positive".into());
        }
        if self.layout.chapter_gap_lines <= 0.0 || self.layout.word_gap_factor <= 0.0 {
            return invalid("layout gap multipliers must be positive".into());
        }
        Ok(())
    }
}
