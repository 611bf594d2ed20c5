//! Structured memory: the compact long-term summary of a conversation.
//!
//! The memory is a single JSON object with exactly four keys:
//! `context`, `keywords`, `tone` and `direction`. It is produced by a model,
//! so parsing is forgiving: [`recover_json_object`] tries, in order,
//!
//! 1. the whole trimmed text,
//! 2. the interior of a ```` ```json ```` fenced block,
//! 3. the span from the first `{` to the last `}`,
//!
//! and [`StructuredMemory::from_object`] fills any missing key with its default.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::trace;

pub const DEFAULT_CONTEXT: &str = "Résumé non disponible";
pub const DEFAULT_TONE: &str = "neutre";
pub const DEFAULT_DIRECTION: &str = "continuer";

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("Invalid fence regex")
});

/// The long-term memory of one conversation.
///
/// Replaced wholesale on every successful update; the model performs the
/// merge, never this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredMemory {
    #[serde(default = "default_context")]
    pub context: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default = "default_tone")]
    pub tone: String,

    #[serde(default = "default_direction")]
    pub direction: String,
}

fn default_context() -> String {
    DEFAULT_CONTEXT.into()
}
fn default_tone() -> String {
    DEFAULT_TONE.into()
}
fn default_direction() -> String {
    DEFAULT_DIRECTION.into()
}

impl Default for StructuredMemory {
    fn default() -> Self {
        Self {
            context: default_context(),
            keywords: Vec::new(),
            tone: default_tone(),
            direction: default_direction(),
        }
    }
}

impl StructuredMemory {
    /// Re-key an arbitrary JSON object into the four-key shape.
    ///
    /// Missing or null keys take their defaults. Non-string scalars are
    /// stringified; a comma-separated `keywords` string is split.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let text = |key: &str, default: fn() -> String| match object.get(key) {
            None | Some(Value::Null) => default(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        let keywords = match object.get("keywords") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };

        Self {
            context: text("context", default_context),
            keywords,
            tone: text("tone", default_tone),
            direction: text("direction", default_direction),
        }
    }

    /// Parse model output or stored text into a memory, if any object is recoverable.
    pub fn parse(raw: &str) -> Option<Self> {
        recover_json_object(raw).map(|object| Self::from_object(&object))
    }

    /// Serialize with a stable key order and without ASCII escaping.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Extract a JSON object from possibly noisy model output.
///
/// Returns `None` for empty input or when none of the three strategies
/// yields an object.
pub fn recover_json_object(raw: &str) -> Option<Map<String, Value>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(object) = parse_object(raw) {
        return Some(object);
    }

    if let Some(captures) = JSON_FENCE.captures(raw) {
        if let Some(object) = captures.get(1).and_then(|m| parse_object(m.as_str().trim())) {
            trace!("Recovered memory JSON from fenced block");
            return Some(object);
        }
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            if let Some(object) = parse_object(&raw[start..=end]) {
                trace!("Recovered memory JSON from brace span");
                return Some(object);
            }
        }
    }

    None
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}
