//! Anthropic Messages API adapter.
//!
//! Sends the prompt as one user message and reads the text of the first
//! content block.
//!
//! ## Security
//!
//! The credential is exposed only when the `x-api-key` header is set. See the
//! [`secrets`](super::secrets) module for details.

use async_trait::async_trait;
use bugsight_core::ProviderTag;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{single_text, ApiCredential, GenerationConfig, ProviderAdapter, ProviderError};

/// Default Anthropic API base URL.
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value.
#[cfg_attr(not(feature = "anthropic"), allow(dead_code))]
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude adapter.
pub struct AnthropicAdapter {
    base_url: String,
    generation: GenerationConfig,
    #[cfg(feature = "anthropic")]
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicAdapter")
            .field("base_url", &self.base_url)
            .field("generation", &self.generation)
            .finish()
    }
}

impl AnthropicAdapter {
    /// Create an adapter talking to `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        generation: GenerationConfig,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            #[cfg(feature = "anthropic")]
            client: super::http::build_client(generation.timeout)?,
            base_url: base_url.into(),
            generation,
        })
    }

    #[cfg_attr(not(feature = "anthropic"), allow(dead_code))]
    fn request_body<'a>(&self, prompt: &'a str, model: &'a str) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model,
            max_tokens: self.generation.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![ContentBlock::Text { text: prompt }],
            }],
            temperature: self.generation.temperature,
        }
    }
}

/// Anthropic API request format.
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Text { text: &'a str },
}

/// Anthropic API response format.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlockResponse>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    #[serde(rename = "type")]
    type_: String,
    text: Option<JsonValue>,
}

#[cfg_attr(not(feature = "anthropic"), allow(dead_code))]
fn answer_text(response: AnthropicResponse) -> Result<String, ProviderError> {
    let Some(block) = response.content.into_iter().next() else {
        let what = match response.stop_reason {
            Some(reason) => format!("first content block (stop reason {})", reason),
            None => "first content block".to_string(),
        };
        return single_text(None, &what);
    };

    if block.type_ != "text" {
        return Err(ProviderError::UnsupportedOutputShape(format!(
            "first content block is of type '{}', not text",
            block.type_
        )));
    }

    single_text(block.text, "first content block text")
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> ProviderTag {
        ProviderTag::Anthropic
    }

    #[cfg(feature = "anthropic")]
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
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", credential.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let response: AnthropicResponse =
            super::http::send_json(request, credential, self.generation.timeout).await?;
        answer_text(response)
    }

    #[cfg(not(feature = "anthropic"))]
    async fn invoke(
        &self,
        _prompt: &str,
        _model: &str,
        _credential: &ApiCredential,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Anthropic adapter requires 'anthropic' feature".to_string(),
        ))
    }
}
