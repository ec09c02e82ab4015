//! Compiled-in model catalog.
//!
//! Maps a model identifier to the provider that serves it and a label for
//! display. The catalog is fixed at build time and never mutated.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// The provider family a model belongs to.
///
/// The tag alone decides which adapter handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    /// Chat-completion style API (OpenAI).
    OpenAi,
    /// Single-turn generate style API (Google Gemini).
    Gemini,
    /// Message-based API (Anthropic).
    Anthropic,
    /// Hosted model runs (Replicate).
    Replicate,
}

impl ProviderTag {
    /// Every provider tag, in display order.
    pub const ALL: [ProviderTag; 4] = [
        ProviderTag::OpenAi,
        ProviderTag::Gemini,
        ProviderTag::Anthropic,
        ProviderTag::Replicate,
    ];

    /// Stable lowercase name, used in logs and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::OpenAi => "openai",
            ProviderTag::Gemini => "gemini",
            ProviderTag::Anthropic => "anthropic",
            ProviderTag::Replicate => "replicate",
        }
    }

    /// Human-readable provider name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderTag::OpenAi => "OpenAI",
            ProviderTag::Gemini => "Google Gemini",
            ProviderTag::Anthropic => "Anthropic",
            ProviderTag::Replicate => "Replicate",
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model the dispatcher can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    /// Identifier sent to the provider (unique across the catalog)
    pub identifier: &'static str,

    /// Label shown to users
    pub display_label: &'static str,

    /// Provider that serves this model
    pub provider: ProviderTag,
}

const fn model(
    identifier: &'static str,
    display_label: &'static str,
    provider: ProviderTag,
) -> ModelDescriptor {
    ModelDescriptor {
        identifier,
        display_label,
        provider,
    }
}

/// All models known to bugsight.
pub static MODELS: &[ModelDescriptor] = &[
    model("gpt-4o", "GPT-4o", ProviderTag::OpenAi),
    model("gpt-4o-mini", "GPT-4o mini", ProviderTag::OpenAi),
    model("gpt-4-turbo", "GPT-4 Turbo", ProviderTag::OpenAi),
    model("gpt-4", "GPT-4", ProviderTag::OpenAi),
    model("gemini-1.5-pro", "Gemini 1.5 Pro", ProviderTag::Gemini),
    model("gemini-1.5-flash", "Gemini 1.5 Flash", ProviderTag::Gemini),
    model(
        "claude-3-5-sonnet-20241022",
        "Claude 3.5 Sonnet",
        ProviderTag::Anthropic,
    ),
    model(
        "claude-3-opus-20240229",
        "Claude 3 Opus",
        ProviderTag::Anthropic,
    ),
    model(
        "claude-3-haiku-20240307",
        "Claude 3 Haiku",
        ProviderTag::Anthropic,
    ),
    model(
        "meta/meta-llama-3-70b-instruct",
        "Llama 3 70B Instruct",
        ProviderTag::Replicate,
    ),
    model(
        "mistralai/mixtral-8x7b-instruct-v0.1",
        "Mixtral 8x7B Instruct",
        ProviderTag::Replicate,
    ),
];

lazy_static! {
    static ref BY_IDENTIFIER: HashMap<&'static str, &'static ModelDescriptor> =
        MODELS.iter().map(|m| (m.identifier, m)).collect();
}

/// Look up a model by identifier.
///
/// Returns `None` for identifiers outside the catalog. Callers treat that
/// as a fatal configuration error for the request.
pub fn lookup(identifier: &str) -> Option<&'static ModelDescriptor> {
    BY_IDENTIFIER.get(identifier).copied()
}

/// Models grouped by provider, for presentation only.
pub fn grouped_by_provider() -> BTreeMap<ProviderTag, Vec<&'static ModelDescriptor>> {
    let mut groups: BTreeMap<ProviderTag, Vec<&'static ModelDescriptor>> = BTreeMap::new();
    for m in MODELS {
        groups.entry(m.provider).or_default().push(m);
    }
    groups
}
