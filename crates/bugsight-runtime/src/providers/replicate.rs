//! Replicate hosted-model adapter.
//!
//! Creates a prediction for an official model and waits for it in the same
//! request (`Prefer: wait`). The prediction's `output` must be a single
//! string. Many language models on Replicate stream tokens and report their
//! output as a list of fragments; that shape is rejected as
//! [`ProviderError::UnsupportedOutputShape`] rather than guessed at.

use async_trait::async_trait;
use bugsight_core::ProviderTag;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{single_text, ApiCredential, GenerationConfig, ProviderAdapter, ProviderError};

/// Default Replicate API base URL.
pub const DEFAULT_REPLICATE_BASE_URL: &str = "https://api.replicate.com/v1";

/// Replicate adapter.
pub struct ReplicateAdapter {
    base_url: String,
    generation: GenerationConfig,
    #[cfg(feature = "replicate")]
    client: reqwest::Client,
}

impl std::fmt::Debug for ReplicateAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicateAdapter")
            .field("base_url", &self.base_url)
            .field("generation", &self.generation)
            .finish()
    }
}

impl ReplicateAdapter {
    /// Create an adapter talking to `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        generation: GenerationConfig,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            #[cfg(feature = "replicate")]
            client: super::http::build_client(generation.timeout)?,
            base_url: base_url.into(),
            generation,
        })
    }

    #[cfg_attr(not(feature = "replicate"), allow(dead_code))]
    fn request_body<'a>(&self, prompt: &'a str) -> PredictionRequest<'a> {
        PredictionRequest {
            input: PredictionInput {
                prompt,
                max_new_tokens: self.generation.max_tokens,
                temperature: self.generation.temperature,
            },
        }
    }
}

/// Replicate prediction request format.
#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    max_new_tokens: u32,
    temperature: f32,
}

/// Replicate prediction response format.
#[derive(Debug, Deserialize)]
struct Prediction {
    status: String,
    output: Option<JsonValue>,
    error: Option<JsonValue>,
}

#[cfg_attr(not(feature = "replicate"), allow(dead_code))]
fn answer_text(prediction: Prediction) -> Result<String, ProviderError> {
    match prediction.status.as_str() {
        "succeeded" => single_text(prediction.output, "prediction output"),
        "failed" | "canceled" | "aborted" => {
            let message = match prediction.error {
                Some(JsonValue::String(message)) => message,
                Some(JsonValue::Null) | None => "no error detail returned".to_string(),
                Some(other) => other.to_string(),
            };
            Err(ProviderError::Prediction {
                status: prediction.status.clone(),
                message,
            })
        }
        _ => Err(ProviderError::Prediction {
            message: "did not complete within the wait window".to_string(),
            status: prediction.status.clone(),
        }),
    }
}

#[async_trait]
impl ProviderAdapter for ReplicateAdapter {
    fn provider(&self) -> ProviderTag {
        ProviderTag::Replicate
    }

    #[cfg(feature = "replicate")]
    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        credential: &ApiCredential,
    ) -> Result<String, ProviderError> {
        let body = self.request_body(prompt);

        // SECURITY: Only expose the credential here, at the point of use
        let request = self
            .client
            .post(format!("{}/models/{}/predictions", self.base_url, model))
            .bearer_auth(credential.expose())
            .header("Prefer", format!("wait={}", wait_seconds(self.generation.timeout)))
            .json(&body);

        let prediction: Prediction =
            super::http::send_json(request, credential, self.generation.timeout).await?;
        answer_text(prediction)
    }

    #[cfg(not(feature = "replicate"))]
    async fn invoke(
        &self,
        _prompt: &str,
        _model: &str,
        _credential: &ApiCredential,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Replicate adapter requires 'replicate' feature".to_string(),
        ))
    }
}

/// Replicate holds a `Prefer: wait` request open for at most 60 seconds.
#[cfg_attr(not(feature = "replicate"), allow(dead_code))]
fn wait_seconds(timeout: std::time::Duration) -> u64 {
    timeout.as_secs().clamp(1, 60)
}
