//! OpenAI chat-completion adapter.
//!
//! Sends a system instruction plus one user message and reads the first
//! choice's message content. JSON mode (`response_format: json_object`) is
//! requested for models that support it.

use async_trait::async_trait;
use bugsight_core::{prompt::SYSTEM_INSTRUCTION, ProviderTag};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{single_text, ApiCredential, ChatMessage, GenerationConfig, ProviderAdapter, ProviderError};

/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Model families that accept `response_format: {"type": "json_object"}`.
const JSON_MODE_PREFIXES: &[&str] = &["gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"];

/// OpenAI adapter.
pub struct OpenAiAdapter {
    base_url: String,
    generation: GenerationConfig,
    #[cfg(feature = "openai")]
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("base_url", &self.base_url)
            .field("generation", &self.generation)
            .finish()
    }
}

impl OpenAiAdapter {
    /// Create an adapter talking to `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        generation: GenerationConfig,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            #[cfg(feature = "openai")]
            client: super::http::build_client(generation.timeout)?,
            base_url: base_url.into(),
            generation,
        })
    }

    #[cfg_attr(not(feature = "openai"), allow(dead_code))]
    fn request_body<'a>(&self, prompt: &str, model: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages: vec![ChatMessage::system(SYSTEM_INSTRUCTION), ChatMessage::user(prompt)],
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
            response_format: supports_json_mode(model).then_some(ResponseFormat {
                type_: "json_object",
            }),
        }
    }
}

fn supports_json_mode(model: &str) -> bool {
    JSON_MODE_PREFIXES.iter().any(|p| model.starts_with(p))
}

/// OpenAI chat completion request format.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    type_: &'static str,
}

/// OpenAI chat completion response format.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<JsonValue>,
    refusal: Option<String>,
}

#[cfg_attr(not(feature = "openai"), allow(dead_code))]
fn answer_text(response: ChatResponse) -> Result<String, ProviderError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message);

    match message {
        Some(ChoiceMessage {
            content: None | Some(JsonValue::Null),
            refusal: Some(refusal),
        }) => Err(ProviderError::Blocked(refusal)),
        Some(message) => single_text(message.content, "first choice content"),
        None => single_text(None, "first choice"),
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider(&self) -> ProviderTag {
        ProviderTag::OpenAi
    }

    #[cfg(feature = "openai")]
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        credential: &ApiCredential,
    ) -> Result<String, ProviderError> {
        let body = self.request_body(prompt, model);

        // SECURITY: Only expose the credential here, at the point of use
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(credential.expose())
            .json(&body);

        let response: ChatResponse =
            super::http::send_json(request, credential, self.generation.timeout).await?;
        answer_text(response)
    }

    #[cfg(not(feature = "openai"))]
    async fn invoke(
        &self,
        _prompt: &str,
        _model: &str,
        _credential: &ApiCredential,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(
            "OpenAI adapter requires 'openai' feature".to_string(),
        ))
    }
}
