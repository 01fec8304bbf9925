//! Post-resolution enrichment of entities.
//!
//! Descriptions come from an external enricher as loosely structured JSON and
//! are parsed defensively. Gender is a cue-word vote over an entity's surface
//! forms. Cross-chapter merging is optional and off by default.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::GenderConfig;

use super::{Description, Entity, EntityLabel};

/// Parse an enricher reply into `name -> {feature -> value}`.
///
/// Markdown code fences are stripped. Entries whose value is not an object (or a
/// string holding a JSON object) are dropped, non-string leaf values are
/// stringified and `null` leaves are skipped. Anything that is not a JSON object
/// at the top level yields an empty map.
pub fn parse_descriptions(raw: &str) -> BTreeMap<String, Description> {
    let body = strip_code_fence(raw);
    match serde_json::from_str::<Value>(body) {
        Ok(value) => descriptions_from_value(&value),
        Err(e) => {
            tracing::warn!(error = %e, "description reply is not JSON; discarding");
            BTreeMap::new()
        }
    }
}

/// Like [`parse_descriptions`] but for an already-parsed JSON value.
pub fn descriptions_from_value(value: &Value) -> BTreeMap<String, Description> {
    let Value::Object(entries) = value else {
        tracing::warn!("description reply is not a JSON object; discarding");
        return BTreeMap::new();
    };

    let mut out = BTreeMap::new();
    for (name, features) in entries {
        match feature_map(features) {
            Some(description) => {
                out.insert(name.clone(), description);
            }
            None => tracing::debug!(entity = %name, "skipping malformed description entry"),
        }
    }
    out
}

fn feature_map(value: &Value) -> Option<Description> {
    match value {
        Value::Object(features) => Some(
            features
                .iter()
                .filter_map(|(k, v)| leaf_string(v).map(|s| (k.clone(), s)))
                .collect(),
        ),
        // Some models double-encode the inner object.
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(inner @ Value::Object(_)) => feature_map(&inner),
            _ => None,
        },
        _ => None,
    }
}

fn leaf_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Attach descriptions to the entities they name.
///
/// A key matches an entity whose name or alias equals it exactly, falling back to
/// a case-insensitive match. Features are merged into any existing description.
/// Returns the number of keys attached.
pub fn attach_descriptions(entities: &mut [Entity], descriptions: BTreeMap<String, Description>) -> usize {
    let mut attached = 0;
    for (key, description) in descriptions {
        let position = entities.iter().position(|e| e.is_called(&key)).or_else(|| {
            entities
                .iter()
                .position(|e| e.surface_forms().any(|f| f.eq_ignore_ascii_case(&key)))
        });
        match position {
            Some(idx) => {
                entities[idx].description.extend(description);
                attached += 1;
            }
            None => tracing::debug!(key = %key, "description matches no entity"),
        }
    }
    attached
}

/// Add `description["gender"]` to PERSON entities by majority of cue words.
///
/// Words of the name and every alias are compared, lowercased, against the
/// configured cue lists. A tie (including no cues at all) adds nothing.
pub fn assign_gender(entities: &mut [Entity], cues: &GenderConfig) {
    for entity in entities.iter_mut().filter(|e| e.label == EntityLabel::Person) {
        let (mut male, mut female) = (0usize, 0usize);
        for word in entity.surface_forms().flat_map(str::split_whitespace) {
            let word = word.to_lowercase();
            let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '.');
            let bare = word.trim_end_matches('.');
            let cued = |list: &[String]| list.iter().any(|c| c == word || c == bare);
            if cued(&cues.male) {
                male += 1;
            } else if cued(&cues.female) {
                female += 1;
            }
        }

        let gender = match male.cmp(&female) {
            std::cmp::Ordering::Greater => "male",
            std::cmp::Ordering::Less => "female",
            std::cmp::Ordering::Equal => continue,
        };
        entity.description.insert("gender".into(), gender.into());
    }
}

/// Pronouns and determiners that never identify an entity on their own.
const NEUTRAL_FORMS: &[&str] = &[
    "i", "me", "my", "mine", "myself", "you", "your", "yours", "we", "us", "our", "ours",
    "they", "them", "their", "theirs", "it", "its", "this", "that", "these", "those",
    "who", "whom", "the", "a", "an",
];

/// Whether a surface form can identify an entity across chapters.
fn is_identifying(form: &str, cues: &GenderConfig) -> bool {
    let form = form.trim().to_lowercase();
    let bare = form.trim_end_matches('.');
    !bare.is_empty()
        && !NEUTRAL_FORMS.contains(&bare)
        && !cues.male.iter().chain(&cues.female).any(|c| *c == form || c == bare)
}

/// Merge entities of different chapters that share a label and a name.
///
/// `chapters[c]` holds the entities resolved in chapter `c`. Two entities merge when
/// the name of one equals (case-insensitively) the name or an alias of the other.
/// Pronouns, titles and other cue words are not names and never match. Entities of
/// the same chapter are never merged with each other. The earlier entity keeps its
/// name; the later one's name and aliases become aliases, mentions are merged and
/// re-sorted and descriptions are unioned with earlier values winning.
///
/// Also returns, for every input entity in chapter order, the index of the entity
/// it ended up in.
pub fn merge_across_chapters(chapters: Vec<Vec<Entity>>, cues: &GenderConfig) -> (Vec<Entity>, Vec<usize>) {
    let before: usize = chapters.iter().map(Vec::len).sum();
    let mut merged: Vec<Entity> = Vec::with_capacity(before);
    // Chapters already folded into each merged entity.
    let mut sources: Vec<Vec<usize>> = Vec::with_capacity(before);
    let mut remap = Vec::with_capacity(before);

    for (chapter, entities) in chapters.into_iter().enumerate() {
        for entity in entities {
            let names = |e: &Entity, form: &str| {
                is_identifying(form, cues) && e.surface_forms().any(|f| f.eq_ignore_ascii_case(form))
            };
            let target = merged.iter().zip(&sources).position(|(m, from)| {
                m.label == entity.label
                    && !from.contains(&chapter)
                    && (names(m, &entity.name) || names(&entity, &m.name))
            });
            match target {
                Some(idx) => {
                    let m = &mut merged[idx];
                    m.aliases.push(entity.name);
                    m.aliases.extend(entity.aliases);
                    m.mentions.extend(entity.mentions);
                    m.mentions.sort();
                    m.mentions.dedup();
                    for (k, v) in entity.description {
                        m.description.entry(k).or_insert(v);
                    }
                    sources[idx].push(chapter);
                    remap.push(idx);
                }
                None => {
                    remap.push(merged.len());
                    merged.push(entity);
                    sources.push(vec![chapter]);
                }
            }
        }
    }

    tracing::debug!(before, after = merged.len(), "merged entities across chapters");
    (merged, remap)
}
