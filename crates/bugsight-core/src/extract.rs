//! Recover a JSON object from model output.
//!
//! Models are asked to answer with bare JSON but routinely wrap it in
//! commentary. Extraction tries, in order:
//!
//! 1. The whole text as JSON. Any JSON value wins here, object or not;
//!    the validator rejects the wrong shapes.
//! 2. The span from the first `{` to the last `}` (inclusive).
//!
//! This is a heuristic, not a parser. Braces in the surrounding prose can
//! make step 2 pick the wrong span; such answers end up as `NotFound`.

use serde_json::Value as JsonValue;

/// Outcome of [`extract`].
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// JSON was recovered. Only the whole-text step can yield a non-object.
    Parsed(JsonValue),

    /// Nothing in the text parsed as JSON.
    NotFound,
}

impl Extraction {
    /// The recovered value, if any.
    pub fn into_value(self) -> Option<JsonValue> {
        match self {
            Extraction::Parsed(value) => Some(value),
            Extraction::NotFound => None,
        }
    }
}

/// Extract a JSON object from `text`. First success wins.
pub fn extract(text: &str) -> Extraction {
    if let Ok(value) = serde_json::from_str::<JsonValue>(text) {
        return Extraction::Parsed(value);
    }

    if let Some(span) = brace_span(text) {
        if let Ok(object) = serde_json::from_str::<JsonValue>(span) {
            tracing::debug!(
                text_len = text.len(),
                json_len = span.len(),
                "Recovered JSON object embedded in surrounding text"
            );
            return Extraction::Parsed(object);
        }
    }

    Extraction::NotFound
}

/// The slice from the first `{` to the last `}`, inclusive.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}
