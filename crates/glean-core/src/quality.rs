//! Deterministic 0 to 1 quality score for extracted content.
//!
//! `score = 0.3 * length + 0.4 * richness + 0.3 * indicators`, where each
//! contribution is independently bounded to `[0, 1]`:
//!
//! - **length**: `1 - e^(-chars / 2000)` over the primary text.
//! - **richness**: `1 - e^(-fields / 5)` over distinct non-empty structured fields.
//! - **indicators**: mean of sentence-punctuation density and absence of
//!   boilerplate markers. Zero when there is no text.

use serde_json::{Map, Value};

const LENGTH_WEIGHT: f64 = 0.3;
const RICHNESS_WEIGHT: f64 = 0.4;
const INDICATOR_WEIGHT: f64 = 0.3;

const LENGTH_SCALE: f64 = 2000.0;
const RICHNESS_SCALE: f64 = 5.0;

/// Structured keys that are bookkeeping rather than extracted content.
const IGNORED_FIELDS: &[&str] = &["content_hash", "failed_backends"];

const BOILERPLATE_MARKERS: &[&str] = &[
    "lorem ipsum",
    "cookie",
    "javascript is disabled",
    "page not found",
    "access denied",
    "captcha",
];

/// Scores a payload and its structured data.
pub fn score(payload: &Value, structured_data: &Map<String, Value>) -> f64 {
    let text = primary_text(payload);
    let total = LENGTH_WEIGHT * length_score(&text)
        + RICHNESS_WEIGHT * richness_score(structured_data)
        + INDICATOR_WEIGHT * indicator_score(&text);
    total.clamp(0.0, 1.0)
}

/// Saturating content-length adequacy.
pub fn length_score(text: &str) -> f64 {
    let chars = text.chars().count() as f64;
    1.0 - (-chars / LENGTH_SCALE).exp()
}

/// Saturating count of distinct non-empty structured fields.
pub fn richness_score(structured_data: &Map<String, Value>) -> f64 {
    let fields = structured_data
        .iter()
        .filter(|(k, v)| !IGNORED_FIELDS.contains(&k.as_str()) && !is_empty_value(v))
        .count() as f64;
    1.0 - (-fields / RICHNESS_SCALE).exp()
}

/// Mean of punctuation density and boilerplate absence.
pub fn indicator_score(text: &str) -> f64 {
    let chars = text.chars().count();
    if chars == 0 {
        return 0.0;
    }

    let terminators = text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();
    let density = terminators as f64 * 100.0 / chars as f64;
    let punctuation = density.min(1.0);

    let lower = text.to_lowercase();
    let markers = BOILERPLATE_MARKERS
        .iter()
        .filter(|m| lower.contains(*m))
        .count() as f64;
    let clean = (1.0 - 0.25 * markers).max(0.0);

    (punctuation + clean) / 2.0
}

/// Extracts the text the length and indicator contributions are measured on.
///
/// Prefers `payload.text`, then a bare string payload, then every string
/// leaf of the payload joined by spaces.
pub fn primary_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("text") {
            Some(Value::String(s)) => s.clone(),
            _ => joined_strings(payload),
        },
        _ => joined_strings(payload),
    }
}

fn joined_strings(value: &Value) -> String {
    let mut parts = Vec::new();
    collect_strings(value, &mut parts);
    parts.join(" ")
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) if !s.is_empty() => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
