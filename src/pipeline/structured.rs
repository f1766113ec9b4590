//! Parsing of structured (JSON) model answers.
//!
//! Models asked for "one JSON object and nothing else" still wrap it in
//! ```json fences or add a sentence before it. We locate the outermost
//! object and hand it to serde; anything that does not deserialise into the
//! declared shape is a schema violation carrying the raw text.

use crate::types::{ExtractionResponse, SupplementationResponse};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*?)\n?```\s*$").unwrap());

/// The outermost `{ ... }` span of `raw`, after removing a code fence.
pub fn json_object_span(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let inner = match RE_JSON_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    };
    let start = inner.find('{')?;
    let end = inner.rfind('}')?;
    (start < end).then(|| &inner[start..=end])
}

fn parse_object<T: DeserializeOwned>(raw: &str) -> Option<T> {
    json_object_span(raw).and_then(|span| serde_json::from_str(span).ok())
}

/// Parse the extraction answer. `None` means the shape is wrong.
pub fn parse_extraction(raw: &str) -> Option<ExtractionResponse> {
    parse_object(raw)
}

/// How the supplementation answer was shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupplementationShape {
    /// The declared `{"supplementedPoints": "..."}` envelope.
    Envelope(String),
    /// Plain Markdown; the model ignored the envelope instruction.
    Markdown(String),
    /// Blank, or JSON without the expected field.
    Invalid,
}

/// Classify the supplementation answer.
pub fn parse_supplementation(raw: &str) -> SupplementationShape {
    if raw.trim().is_empty() {
        return SupplementationShape::Invalid;
    }
    if let Some(resp) = parse_object::<SupplementationResponse>(raw) {
        return SupplementationShape::Envelope(resp.supplemented_points);
    }
    let trimmed = raw.trim_start();
    let looks_like_json = trimmed.starts_with('{')
        || trimmed.starts_with('[')
        || RE_JSON_FENCE.is_match(raw.trim());
    if looks_like_json {
        SupplementationShape::Invalid
    } else {
        SupplementationShape::Markdown(raw.to_string())
    }
}
