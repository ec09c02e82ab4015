//! Provider adapters for bugsight-runtime.
//!
//! Each supported provider has one adapter implementing [`ProviderAdapter`].
//! Adapters translate a prompt into the provider's request shape and reduce
//! the provider's response envelope to a single answer string.
//!
//! ## Security
//!
//! Credentials are passed per call as [`ApiCredential`] and never stored by
//! an adapter. Every error message is passed through [`redact`] before it
//! leaves this module.

use async_trait::async_trait;
use bugsight_core::ProviderTag;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

mod anthropic;
mod gemini;
#[cfg(any(
    feature = "openai",
    feature = "gemini",
    feature = "anthropic",
    feature = "replicate"
))]
mod http;
mod openai;
mod registry;
mod replicate;
pub mod secrets;

pub use anthropic::{AnthropicAdapter, DEFAULT_ANTHROPIC_BASE_URL};
pub use gemini::{GeminiAdapter, DEFAULT_GEMINI_BASE_URL};
pub use openai::{OpenAiAdapter, DEFAULT_OPENAI_BASE_URL};
pub use registry::AdapterSet;
pub use replicate::{ReplicateAdapter, DEFAULT_REPLICATE_BASE_URL};
pub use secrets::{redact, ApiCredential, CredentialSource};

/// Errors from provider adapters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Response could not be decoded: {0}")]
    Parse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Request blocked by provider: {0}")]
    Blocked(String),

    #[error("Prediction {status}: {message}")]
    Prediction { status: String, message: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("{0}")]
    UnsupportedOutputShape(String),
}

impl ProviderError {
    /// Scrub `credential` from every message this error carries.
    pub fn redacted(self, credential: &ApiCredential) -> Self {
        let scrub = |text: String| redact(&text, credential);
        match self {
            ProviderError::Http(message) => ProviderError::Http(scrub(message)),
            ProviderError::Api { status, message } => ProviderError::Api {
                status,
                message: scrub(message),
            },
            ProviderError::Auth(message) => ProviderError::Auth(scrub(message)),
            ProviderError::Parse(message) => ProviderError::Parse(scrub(message)),
            ProviderError::Blocked(reason) => ProviderError::Blocked(scrub(reason)),
            ProviderError::Prediction { status, message } => ProviderError::Prediction {
                status: scrub(status),
                message: scrub(message),
            },
            ProviderError::NotConfigured(message) => ProviderError::NotConfigured(scrub(message)),
            ProviderError::UnsupportedOutputShape(message) => {
                ProviderError::UnsupportedOutputShape(scrub(message))
            }
            other @ (ProviderError::RateLimited { .. } | ProviderError::Timeout(_)) => other,
        }
    }
}

/// Generation parameters shared by all adapters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.2,
            timeout: Duration::from_secs(60),
        }
    }
}

/// A chat message for chat-style providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One provider behind the uniform invoke contract.
///
/// Implementations must classify every failure as a [`ProviderError`]; a
/// transport error never escapes unclassified.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider this adapter serves.
    fn provider(&self) -> ProviderTag;

    /// Send `prompt` to `model` and return the answer text.
    ///
    /// The credential is only borrowed for the duration of the call.
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        credential: &ApiCredential,
    ) -> Result<String, ProviderError>;
}

/// Reduce one slot of a response envelope to a single text value.
///
/// `what` names the slot in error messages (e.g. "first choice content").
pub(crate) fn single_text(value: Option<JsonValue>, what: &str) -> Result<String, ProviderError> {
    match value {
        Some(JsonValue::String(text)) => Ok(text),
        Some(JsonValue::Array(items)) => Err(ProviderError::UnsupportedOutputShape(format!(
            "{} is a sequence of {} fragments, not a single text value",
            what,
            items.len()
        ))),
        None | Some(JsonValue::Null) => Err(ProviderError::UnsupportedOutputShape(format!(
            "{} is missing",
            what
        ))),
        Some(other) => Err(ProviderError::UnsupportedOutputShape(format!(
            "{} is {}, not text",
            what,
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Longest raw error body quoted back to the caller.
const MAX_ERROR_BODY: usize = 200;

/// Build an error from a non-success HTTP response body.
///
/// Understands the `{"error": {"message": ..}}` envelope (OpenAI, Anthropic,
/// Gemini) and Replicate's `{"detail": ..}`. Anything else is quoted raw,
/// truncated.
pub(crate) fn api_error(status: u16, body: &str, credential: &ApiCredential) -> ProviderError {
    let message = serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("detail"))
                .or_else(|| v.get("message"))
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate(body.trim(), MAX_ERROR_BODY));
    let message = redact(&message, credential);

    match status {
        401 | 403 => ProviderError::Auth(message),
        _ => ProviderError::Api { status, message },
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
