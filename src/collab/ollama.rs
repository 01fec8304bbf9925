//! Ollama-backed description enricher.
//!
//! Asks a local LLM for the appearance of each character in a chapter. The
//! reply is free-form and goes through [`parse_descriptions`], so a model that
//! ignores the requested format simply yields no descriptions.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::config::OllamaConfig;
use crate::error::{CollaboratorError, CollaboratorResult};
use crate::resolve::{Description, Entity, EntityLabel, parse_descriptions};

use super::DescriptionEnricher;
use super::http::JsonService;

const SYSTEM_PROMPT: &str = "You extract character appearance from fiction. \
    For each listed character that the passage physically describes, return an entry \
    keyed by the character's main name whose value is an object mapping a feature \
    (e.g. \"hair\", \"height\") to its description. Omit characters without an \
    appearance description. Return only a JSON object, no other text.";

/// Description enricher using Ollama's `/api/generate`.
#[derive(Debug)]
pub struct OllamaDescriber {
    model: String,
    endpoint: JsonService,
}

impl OllamaDescriber {
    pub fn new(config: OllamaConfig) -> Self {
        let url = format!("{}/api/generate", config.base_url.trim_end_matches('/'));
        Self {
            endpoint: JsonService::new("ollama", url, config.timeout_secs),
            model: config.model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a JSON-formatted completion.
    pub fn generate(&self, prompt: &str, system: &str) -> CollaboratorResult<String> {
        let reply = self.endpoint.post(&json!({
            "model": self.model,
            "prompt": prompt,
            "system": system,
            "stream": false,
            "format": "json",
        }))?;
        completion_text(&reply)
    }
}

/// The `response` field of a non-streaming generate reply.
fn completion_text(reply: &Value) -> CollaboratorResult<String> {
    reply["response"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CollaboratorError::MalformedOutput {
            service: "ollama".into(),
            message: "missing 'response' field".into(),
        })
}

/// Prompt listing the chapter's characters with their other names.
pub(crate) fn description_prompt(chapter_text: &str, characters: &[&Entity]) -> String {
    let listed: Vec<String> = characters
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {} (also called: {})", i + 1, c.name, c.aliases.join(", ")))
        .collect();
    format!(
        "The passage:\n{chapter_text}\n\nThe characters:\n{}",
        listed.join("\n")
    )
}

impl DescriptionEnricher for OllamaDescriber {
    fn describe(
        &self,
        chapter_text: &str,
        entities: &[Entity],
    ) -> CollaboratorResult<BTreeMap<String, Description>> {
        let characters: Vec<&Entity> = entities
            .iter()
            .filter(|e| e.label == EntityLabel::Person)
            .collect();
        if characters.is_empty() {
            return Ok(BTreeMap::new());
        }

        let prompt = description_prompt(chapter_text, &characters);
        let reply = self.generate(&prompt, SYSTEM_PROMPT)?;
        Ok(parse_descriptions(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::TextSpan;

    fn person(name: &str, aliases: &[&str]) -> Entity {
        Entity {
            name: name.into(),
            label: EntityLabel::Person,
            aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
            mentions: vec![TextSpan::new(0, 1)],
            description: Description::new(),
        }
    }

    #[test]
    fn prompt_lists_characters_with_aliases() {
        let ahab = person("Ahab", &["the captain", "he"]);
        let prompt = description_prompt("Ahab stood on his ivory leg.", &[&ahab]);
        assert!(prompt.contains("1. Ahab (also called: the captain, he)"));
        assert!(prompt.starts_with("The passage:\nAhab stood"));
    }

    #[test]
    fn completion_text_reads_response_field() {
        let reply = json!({"model": "llama3.2", "response": "{\"Tom\": {}}", "done": true});
        assert_eq!(completion_text(&reply).unwrap(), "{\"Tom\": {}}");

        let err = completion_text(&json!({"error": "model not found"})).unwrap_err();
        assert!(matches!(err, CollaboratorError::MalformedOutput { .. }));
    }

    #[test]
    fn no_characters_skips_the_request() {
        let describer = OllamaDescriber::new(OllamaConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        });
        let mut place = person("Nantucket", &[]);
        place.label = EntityLabel::Gpe;
        assert!(describer.describe("Nantucket.", &[place]).unwrap().is_empty());
    }

    #[test]
    fn unreachable_server_is_an_error() {
        let describer = OllamaDescriber::new(OllamaConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        });
        let result = describer.describe("Tom ran.", &[person("Tom", &[])]);
        assert!(result.is_err());
    }
}
