//! Google Gemini `generateContent` adapter.
//!
//! The prompt goes out as a single user turn; the answer is the text of the
//! first part of the first candidate.

use async_trait::async_trait;
use bugsight_core::ProviderTag;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{single_text, ApiCredential, GenerationConfig, ProviderAdapter, ProviderError};

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini adapter.
pub struct GeminiAdapter {
    base_url: String,
    generation: GenerationConfig,
    #[cfg(feature = "gemini")]
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiAdapter")
            .field("base_url", &self.base_url)
            .field("generation", &self.generation)
            .finish()
    }
}

impl GeminiAdapter {
    /// Create an adapter talking to `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        generation: GenerationConfig,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            #[cfg(feature = "gemini")]
            client: super::http::build_client(generation.timeout)?,
            base_url: base_url.into(),
            generation,
        })
    }

    #[cfg_attr(not(feature = "gemini"), allow(dead_code))]
    fn request_body<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationParams {
                temperature: self.generation.temperature,
                max_output_tokens: self.generation.max_tokens,
            },
        }
    }
}

/// Gemini request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationParams,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    temperature: f32,
    max_output_tokens: u32,
}

/// Gemini response format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg_attr(not(feature = "gemini"), allow(dead_code))]
fn answer_text(response: GenerateResponse) -> Result<String, ProviderError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::Blocked(reason));
        }
        return single_text(None, "first candidate");
    };

    let Some(content) = candidate.content else {
        let what = match candidate.finish_reason {
            Some(reason) => format!("first candidate content (finish reason {})", reason),
            None => "first candidate content".to_string(),
        };
        return single_text(None, &what);
    };

    let text = content
        .parts
        .into_iter()
        .next()
        .and_then(|mut part| part.get_mut("text").map(JsonValue::take));
    single_text(text, "first candidate text part")
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider(&self) -> ProviderTag {
        ProviderTag::Gemini
    }

    #[cfg(feature = "gemini")]
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        credential: &ApiCredential,
    ) -> Result<String, ProviderError> {
        let body = self.request_body(prompt);

        // SECURITY: Key goes in a header so it never appears in a logged URL
        let request = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", credential.expose())
            .json(&body);

        let response: GenerateResponse =
            super::http::send_json(request, credential, self.generation.timeout).await?;
        answer_text(response)
    }

    #[cfg(not(feature = "gemini"))]
    async fn invoke(
        &self,
        _prompt: &str,
        _model: &str,
        _credential: &ApiCredential,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Gemini adapter requires 'gemini' feature".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> GeminiAdapter {
        GeminiAdapter::new(DEFAULT_GEMINI_BASE_URL, GenerationConfig::default()).unwrap()
    }

    fn parse(value: JsonValue) -> GenerateResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_provider_tag() {
        assert_eq!(adapter().provider(), ProviderTag::Gemini);
    }

    #[test]
    fn test_request_is_single_user_turn() {
        let body = serde_json::to_value(adapter().request_body("PROMPT")).unwrap();
        assert_eq!(
            body["contents"],
            json!([{"role": "user", "parts": [{"text": "PROMPT"}]}])
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_answer_from_first_part() {
        let response = parse(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"a\":1}"}]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(answer_text(response).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_blocked_prompt() {
        let response = parse(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }));
        assert_eq!(
            answer_text(response).unwrap_err(),
            ProviderError::Blocked("SAFETY".to_string())
        );
    }

    #[test]
    fn test_no_candidates_is_unsupported_shape() {
        let response = parse(json!({"candidates": []}));
        assert!(matches!(
            answer_text(response),
            Err(ProviderError::UnsupportedOutputShape(_))
        ));
    }

    #[test]
    fn test_candidate_without_content_names_finish_reason() {
        let response = parse(json!({
            "candidates": [{"finishReason": "RECITATION"}]
        }));
        match answer_text(response) {
            Err(ProviderError::UnsupportedOutputShape(msg)) => assert!(msg.contains("RECITATION")),
            other => panic!("Expected UnsupportedOutputShape, got {other:?}"),
        }
    }

    #[test]
    fn test_non_text_part_is_unsupported_shape() {
        let response = parse(json!({
            "candidates": [{
                "content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "AAAA"}}]}
            }]
        }));
        assert!(matches!(
            answer_text(response),
            Err(ProviderError::UnsupportedOutputShape(_))
        ));
    }
}
