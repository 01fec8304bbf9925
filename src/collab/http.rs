//! JSON-over-HTTP collaborators built on `ureq`.
//!
//! Wire contracts:
//!
//! | Service | Request | Reply |
//! |---|---|---|
//! | NER | `{"text": …}` | `[{"text", "label", "start", "end"}]` |
//! | Coreference | `{"text": …}` | `[{"mention_texts": […], "mention_offsets": [[s, e], …]}]` |
//! | Summarizer | `{"texts": […]}` | `{"summaries": [string or null, …]}` |
//!
//! Coreference end offsets arrive inclusive and are normalised to half-open here.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{CollaboratorError, CollaboratorResult};
use crate::resolve::{CorefCluster, EntityLabel, NerSpan};
use crate::span::TextSpan;

use super::{CorefProvider, NerProvider, Summarizer};

/// One JSON endpoint with a shared agent and a fixed timeout.
pub struct JsonService {
    service: &'static str,
    url: String,
    timeout_secs: u64,
    agent: ureq::Agent,
}

impl JsonService {
    pub fn new(service: &'static str, url: impl Into<String>, timeout_secs: u64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(timeout_secs))
            .build();
        Self {
            service,
            url: url.into(),
            timeout_secs,
            agent,
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// POST `body` and parse the reply as JSON.
    pub fn post(&self, body: &Value) -> CollaboratorResult<Value> {
        let body_str = serde_json::to_string(body).map_err(|e| CollaboratorError::RequestFailed {
            service: self.service.into(),
            message: format!("JSON serialize error: {e}"),
        })?;

        let resp = self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
            .map_err(|e| self.classify(e))?;

        let resp_str = resp.into_string().map_err(|e| self.malformed(e.to_string()))?;
        serde_json::from_str(&resp_str).map_err(|e| self.malformed(e.to_string()))
    }

    fn malformed(&self, message: String) -> CollaboratorError {
        CollaboratorError::MalformedOutput {
            service: self.service.into(),
            message,
        }
    }

    fn classify(&self, error: ureq::Error) -> CollaboratorError {
        let service = self.service.to_string();
        match error {
            ureq::Error::Status(code, _) => CollaboratorError::RequestFailed {
                service,
                message: format!("server returned status {code}"),
            },
            ureq::Error::Transport(transport) => {
                let timed_out = std::error::Error::source(&transport)
                    .and_then(|s| s.downcast_ref::<std::io::Error>())
                    .is_some_and(|io| {
                        matches!(
                            io.kind(),
                            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                        )
                    });
                match transport.kind() {
                    _ if timed_out => CollaboratorError::Timeout {
                        service,
                        timeout_secs: self.timeout_secs,
                    },
                    ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => {
                        CollaboratorError::Unavailable { service }
                    }
                    _ => CollaboratorError::RequestFailed {
                        service,
                        message: transport.to_string(),
                    },
                }
            }
        }
    }
}

impl std::fmt::Debug for JsonService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonService")
            .field("service", &self.service)
            .field("url", &self.url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// NER
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WireNerSpan {
    text: String,
    label: String,
    start: usize,
    end: usize,
}

/// Parse an NER reply.
pub fn parse_ner(reply: Value) -> CollaboratorResult<Vec<NerSpan>> {
    let spans: Vec<WireNerSpan> =
        serde_json::from_value(reply).map_err(|e| CollaboratorError::MalformedOutput {
            service: "ner".into(),
            message: e.to_string(),
        })?;
    Ok(spans
        .into_iter()
        .map(|s| NerSpan {
            text: s.text,
            label: EntityLabel::from(s.label),
            span: TextSpan::new(s.start, s.end),
        })
        .collect())
}

/// NER tagger behind an HTTP endpoint.
#[derive(Debug)]
pub struct HttpNer {
    service: JsonService,
}

impl HttpNer {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            service: JsonService::new("ner", url, timeout_secs),
        }
    }
}

impl NerProvider for HttpNer {
    fn tag(&self, chapter_text: &str) -> CollaboratorResult<Vec<NerSpan>> {
        let reply = self.service.post(&serde_json::json!({ "text": chapter_text }))?;
        parse_ner(reply)
    }
}

// ---------------------------------------------------------------------------
// Coreference
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WireCluster {
    mention_texts: Vec<String>,
    mention_offsets: Vec<(usize, usize)>,
}

/// Parse a coreference reply, turning inclusive ends into half-open ones.
pub fn parse_coref(reply: Value) -> CollaboratorResult<Vec<CorefCluster>> {
    let clusters: Vec<WireCluster> =
        serde_json::from_value(reply).map_err(|e| CollaboratorError::MalformedOutput {
            service: "coref".into(),
            message: e.to_string(),
        })?;
    Ok(clusters
        .into_iter()
        .map(|c| CorefCluster {
            mention_texts: c.mention_texts,
            mention_spans: c
                .mention_offsets
                .into_iter()
                .map(|(start, end)| TextSpan::new(start, end + 1))
                .collect(),
        })
        .collect())
}

/// Coreference model behind an HTTP endpoint.
#[derive(Debug)]
pub struct HttpCoref {
    service: JsonService,
}

impl HttpCoref {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            service: JsonService::new("coref", url, timeout_secs),
        }
    }
}

impl CorefProvider for HttpCoref {
    fn resolve(&self, chapter_text: &str) -> CollaboratorResult<Vec<CorefCluster>> {
        let reply = self.service.post(&serde_json::json!({ "text": chapter_text }))?;
        parse_coref(reply)
    }
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

/// Split a summarizer reply into one result per requested text.
///
/// Missing or `null` entries are per-item failures.
pub fn parse_summaries(reply: &Value, expected: usize) -> Vec<CollaboratorResult<String>> {
    let missing = |message: &str| CollaboratorError::MalformedOutput {
        service: "summarizer".into(),
        message: message.into(),
    };
    let Some(summaries) = reply["summaries"].as_array() else {
        return (0..expected).map(|_| Err(missing("missing 'summaries' array"))).collect();
    };
    if summaries.len() != expected {
        tracing::warn!(
            expected,
            got = summaries.len(),
            "summarizer returned a different number of summaries"
        );
    }
    (0..expected)
        .map(|i| match summaries.get(i) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(missing("summary is not a string")),
            None => Err(missing("no summary for this item")),
        })
        .collect()
}

/// Abstractive summarizer behind an HTTP endpoint. Batches in one request.
#[derive(Debug)]
pub struct HttpSummarizer {
    service: JsonService,
}

impl HttpSummarizer {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            service: JsonService::new("summarizer", url, timeout_secs),
        }
    }
}

impl Summarizer for HttpSummarizer {
    fn summarize(&self, text: &str) -> CollaboratorResult<String> {
        self.summarize_batch(&[text])
            .pop()
            .unwrap_or_else(|| Err(CollaboratorError::MalformedOutput {
                service: self.service.service().into(),
                message: "empty batch reply".into(),
            }))
    }

    fn summarize_batch(&self, texts: &[&str]) -> Vec<CollaboratorResult<String>> {
        if texts.is_empty() {
            return Vec::new();
        }
        match self.service.post(&serde_json::json!({ "texts": texts })) {
            Ok(reply) => parse_summaries(&reply, texts.len()),
            Err(e) => {
                let message = e.to_string();
                texts
                    .iter()
                    .map(|_| {
                        Err(CollaboratorError::RequestFailed {
                            service: self.service.service().into(),
                            message: message.clone(),
                        })
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ner_reply_parses() {
        let reply = json!([
            {"text": "Tom", "label": "PERSON", "start": 0, "end": 3},
            {"text": "Haifa", "label": "GPE", "start": 10, "end": 15}
        ]);
        let spans = parse_ner(reply).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].label, EntityLabel::Person);
        assert_eq!(spans[1].span, TextSpan::new(10, 15));
    }

    #[test]
    fn ner_wrong_shape_is_malformed() {
        let err = parse_ner(json!({"entities": []})).unwrap_err();
        assert!(matches!(err, CollaboratorError::MalformedOutput { .. }));
    }

    #[test]
    fn coref_ends_become_exclusive() {
        let reply = json!([
            {"mention_texts": ["Tom", "Tom"], "mention_offsets": [[0, 2], [9, 11]]}
        ]);
        let clusters = parse_coref(reply).unwrap();
        assert_eq!(
            clusters[0].mention_spans,
            vec![TextSpan::new(0, 3), TextSpan::new(9, 12)]
        );
    }

    #[test]
    fn summaries_partial_failure() {
        let reply = json!({"summaries": ["first", null]});
        let results = parse_summaries(&reply, 3);
        assert_eq!(results[0].as_deref().ok(), Some("first"));
        assert!(results[1].is_err());
        assert!(results[2].is_err());
    }

    #[test]
    fn summaries_missing_array() {
        let results = parse_summaries(&json!("nope"), 2);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_err));
    }

    #[test]
    fn unreachable_service_is_an_error() {
        let ner = HttpNer::new("http://127.0.0.1:1/ner", 2);
        assert!(ner.tag("Tom ran.").is_err());
    }

    #[test]
    fn failed_batch_fails_every_item() {
        let summarizer = HttpSummarizer::new("http://127.0.0.1:1/summarize", 2);
        let results = summarizer.summarize_batch(&["a", "b"]);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_err));
    }
}
