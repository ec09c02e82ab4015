//! Dispatch controller.
//!
//! One dispatch is a single forward pass through
//! `Idle → Building → Calling → Extracting → Validating` and ends in a
//! [`DispatchOutcome`], `Succeeded` or `Failed`. It makes exactly one adapter
//! call, never retries, and never falls back to another provider. Every
//! failure leaves as a [`DispatchError`] naming its kind and the stage it
//! happened in.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bugsight_core::{
    catalog, extract, prompt, validate, DiagnosticResult, ProviderTag, ValidationError,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use crate::config::RuntimeConfig;
use crate::providers::{AdapterSet, ProviderAdapter, ProviderError};
use crate::request::DiagnosticRequest;

/// Working states of the dispatch state machine.
///
/// Terminal states are the variants of [`DispatchOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStage {
    Idle,
    Building,
    Calling,
    Extracting,
    Validating,
}

impl DispatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStage::Idle => "idle",
            DispatchStage::Building => "building",
            DispatchStage::Calling => "calling",
            DispatchStage::Extracting => "extracting",
            DispatchStage::Validating => "validating",
        }
    }
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five failure classifications a caller can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnknownModel,
    ProviderCallFailed,
    UnsupportedOutputShape,
    NoJsonFound,
    InvalidShape,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnknownModel => "UnknownModel",
            ErrorKind::ProviderCallFailed => "ProviderCallFailed",
            ErrorKind::UnsupportedOutputShape => "UnsupportedOutputShape",
            ErrorKind::NoJsonFound => "NoJsonFound",
            ErrorKind::InvalidShape => "InvalidShape",
        };
        f.write_str(name)
    }
}

/// A classified dispatch failure.
///
/// Messages are suitable for direct display and never contain the
/// credential.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Unknown model: '{0}'")]
    UnknownModel(String),

    #[error("{} call failed: {message}", .provider.display_name())]
    ProviderCallFailed {
        provider: ProviderTag,
        message: String,
    },

    #[error("{} returned an unsupported output shape: {message}", .provider.display_name())]
    UnsupportedOutputShape {
        provider: ProviderTag,
        message: String,
    },

    #[error("The model's answer did not contain a JSON object")]
    NoJsonFound,

    #[error("{0}")]
    InvalidShape(String),
}

impl DispatchError {
    /// Classify an adapter failure.
    pub fn from_provider(provider: ProviderTag, error: ProviderError) -> Self {
        match error {
            ProviderError::UnsupportedOutputShape(message) => {
                DispatchError::UnsupportedOutputShape { provider, message }
            }
            other => DispatchError::ProviderCallFailed {
                provider,
                message: other.to_string(),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::UnknownModel(_) => ErrorKind::UnknownModel,
            DispatchError::ProviderCallFailed { .. } => ErrorKind::ProviderCallFailed,
            DispatchError::UnsupportedOutputShape { .. } => ErrorKind::UnsupportedOutputShape,
            DispatchError::NoJsonFound => ErrorKind::NoJsonFound,
            DispatchError::InvalidShape(_) => ErrorKind::InvalidShape,
        }
    }

    /// Classify a validator failure.
    ///
    /// A schema that fails to load is a build defect, not a bad answer; it
    /// is logged at error level before being reported.
    pub fn from_validation(error: ValidationError) -> Self {
        if let ValidationError::SchemaLoad(reason) = &error {
            tracing::error!(error = %reason, "Embedded result schema failed to load");
        }
        DispatchError::InvalidShape(error.to_string())
    }

    /// The state the dispatch was in when it failed.
    pub fn stage(&self) -> DispatchStage {
        match self {
            DispatchError::UnknownModel(_) => DispatchStage::Idle,
            DispatchError::ProviderCallFailed { .. }
            | DispatchError::UnsupportedOutputShape { .. } => DispatchStage::Calling,
            DispatchError::NoJsonFound => DispatchStage::Extracting,
            DispatchError::InvalidShape(_) => DispatchStage::Validating,
        }
    }
}

/// Terminal state of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Succeeded {
        result: DiagnosticResult,
    },
    Failed {
        kind: ErrorKind,
        stage: DispatchStage,
        message: String,
    },
}

impl From<Result<DiagnosticResult, DispatchError>> for DispatchOutcome {
    fn from(result: Result<DiagnosticResult, DispatchError>) -> Self {
        match result {
            Ok(result) => DispatchOutcome::Succeeded { result },
            Err(e) => DispatchOutcome::Failed {
                kind: e.kind(),
                stage: e.stage(),
                message: e.to_string(),
            },
        }
    }
}

/// Record of one dispatch, for display or JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// Model identifier as requested
    pub model: String,

    /// Provider the model routes to, if the model is known
    pub provider: Option<ProviderTag>,

    /// When the dispatch started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration of the dispatch in milliseconds
    pub elapsed_ms: u64,

    /// How the dispatch ended
    pub outcome: DispatchOutcome,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DispatchOutcome::Succeeded { .. })
    }
}

/// Routes diagnostic requests to provider adapters.
///
/// Holds no per-request state, so one dispatcher can serve concurrent
/// dispatches.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    adapters: AdapterSet,
    call_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher over `adapters`, bounding each call by `call_timeout`.
    pub fn new(adapters: AdapterSet, call_timeout: Duration) -> Self {
        Self {
            adapters,
            call_timeout,
        }
    }

    /// Create a dispatcher with HTTP adapters built from `config`.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, ProviderError> {
        Ok(Self::new(
            AdapterSet::from_config(config)?,
            config.request_timeout,
        ))
    }

    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    /// Run one dispatch to a validated result or a classified failure.
    pub async fn dispatch(
        &self,
        request: DiagnosticRequest,
    ) -> Result<DiagnosticResult, DispatchError> {
        let span = tracing::info_span!(
            "dispatch",
            model = %request.model_identifier,
            provider = tracing::field::Empty,
        );

        let result = self.execute(request).instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(_) => tracing::debug!("Dispatch succeeded"),
            Err(e) => tracing::warn!(
                stage = %e.stage(),
                kind = %e.kind(),
                error = %e,
                "Dispatch failed"
            ),
        });

        result
    }

    /// Run one dispatch and report it, whatever the outcome.
    pub async fn run(&self, request: DiagnosticRequest) -> DispatchReport {
        let model = request.model_identifier.clone();
        let provider = catalog::lookup(&model).map(|descriptor| descriptor.provider);
        let started_at = Utc::now();
        let clock = Instant::now();

        let outcome = DispatchOutcome::from(self.dispatch(request).await);

        DispatchReport {
            model,
            provider,
            started_at,
            elapsed_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
            outcome,
        }
    }

    async fn execute(&self, request: DiagnosticRequest) -> Result<DiagnosticResult, DispatchError> {
        let DiagnosticRequest {
            code_text,
            problem_text,
            model_identifier,
            credential,
        } = request;

        let descriptor = catalog::lookup(&model_identifier)
            .ok_or_else(|| DispatchError::UnknownModel(model_identifier.clone()))?;
        let provider = descriptor.provider;
        tracing::Span::current().record("provider", provider.as_str());

        tracing::debug!(stage = %DispatchStage::Building, "Building prompt");
        let prompt_text = prompt::build(&code_text, &problem_text);

        let adapter: &Arc<dyn ProviderAdapter> = self.adapters.adapter_for(provider);
        tracing::debug!(
            stage = %DispatchStage::Calling,
            prompt_len = prompt_text.len(),
            timeout = ?self.call_timeout,
            "Calling provider"
        );

        let call = adapter.invoke(&prompt_text, descriptor.identifier, &credential);
        let answer = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(answer) => answer,
            Err(_) => Err(ProviderError::Timeout(self.call_timeout)),
        };
        let answer = answer.map_err(|e| e.redacted(&credential));
        drop(credential);
        let answer = answer.map_err(|e| DispatchError::from_provider(provider, e))?;

        tracing::debug!(
            stage = %DispatchStage::Extracting,
            answer_len = answer.len(),
            "Extracting JSON"
        );
        let value = extract(&answer)
            .into_value()
            .ok_or(DispatchError::NoJsonFound)?;

        tracing::debug!(
            stage = %DispatchStage::Validating,
            is_object = value.is_object(),
            "Validating result"
        );
        validate(&value).map_err(DispatchError::from_validation)
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    config: RuntimeConfig,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl DispatcherBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            adapters: Vec::new(),
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the adapter for the provider `adapter` serves.
    pub fn adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> Result<Dispatcher, ProviderError> {
        let adapters = self
            .adapters
            .into_iter()
            .fold(AdapterSet::from_config(&self.config)?, AdapterSet::with_adapter);

        Ok(Dispatcher::new(adapters, self.config.request_timeout))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ApiCredential, CredentialSource};
    use async_trait::async_trait;

    struct FixedAdapter {
        tag: ProviderTag,
        answer: Result<String, ProviderError>,
    }

    #[async_trait]
    impl ProviderAdapter for FixedAdapter {
        fn provider(&self) -> ProviderTag {
            self.tag
        }

        async fn invoke(
            &self,
            _prompt: &str,
            _model: &str,
            _credential: &ApiCredential,
        ) -> Result<String, ProviderError> {
            self.answer.clone()
        }
    }

    fn request(model: &str) -> DiagnosticRequest {
        DiagnosticRequest::new(
            "let x = 1;",
            "x is unused",
            model,
            ApiCredential::new("key", CredentialSource::Programmatic, "Test key"),
        )
    }

    fn dispatcher(answer: Result<String, ProviderError>) -> Dispatcher {
        DispatcherBuilder::new()
            .adapter(Arc::new(FixedAdapter {
                tag: ProviderTag::Anthropic,
                answer,
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_error_kinds_and_stages() {
        let cases = [
            (
                DispatchError::UnknownModel("x".to_string()),
                ErrorKind::UnknownModel,
                DispatchStage::Idle,
            ),
            (
                DispatchError::from_provider(ProviderTag::OpenAi, ProviderError::Auth("no".into())),
                ErrorKind::ProviderCallFailed,
                DispatchStage::Calling,
            ),
            (
                DispatchError::from_provider(
                    ProviderTag::Replicate,
                    ProviderError::UnsupportedOutputShape("fragments".into()),
                ),
                ErrorKind::UnsupportedOutputShape,
                DispatchStage::Calling,
            ),
            (
                DispatchError::NoJsonFound,
                ErrorKind::NoJsonFound,
                DispatchStage::Extracting,
            ),
            (
                DispatchError::InvalidShape("missing".to_string()),
                ErrorKind::InvalidShape,
                DispatchStage::Validating,
            ),
        ];

        for (error, kind, stage) in cases {
            assert_eq!(error.kind(), kind);
            assert_eq!(error.stage(), stage);
        }
    }

    #[test]
    fn test_provider_error_message_names_provider() {
        let error = DispatchError::from_provider(
            ProviderTag::Gemini,
            ProviderError::RateLimited { retry_after: None },
        );
        assert!(error.to_string().starts_with("Google Gemini call failed"));
    }

    #[test]
    fn test_failed_outcome_serialization() {
        let failed: Result<DiagnosticResult, DispatchError> = Err(DispatchError::NoJsonFound);
        let outcome = DispatchOutcome::from(failed);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "NoJsonFound");
        assert_eq!(json["stage"], "extracting");
        assert!(json["message"].as_str().unwrap().contains("JSON"));
    }

    #[test]
    fn test_validation_errors_classify_as_invalid_shape() {
        let load = DispatchError::from_validation(ValidationError::SchemaLoad(
            "Invalid schema JSON".to_string(),
        ));
        assert_eq!(load.kind(), ErrorKind::InvalidShape);
        assert!(load.to_string().contains("Failed to load result schema"));

        let shape = DispatchError::from_validation(ValidationError::InvalidShape(vec![
            "\"codeSnippet\" is a required property".to_string(),
        ]));
        assert_eq!(shape.kind(), ErrorKind::InvalidShape);
        assert_eq!(shape.stage(), DispatchStage::Validating);
        assert!(shape.to_string().contains("codeSnippet"));
    }

    #[tokio::test]
    async fn test_dispatch_array_wrapped_answer_is_invalid_shape() {
        let answer = r#"[{"problem":"p","solution":"s","codeSnippet":"c"}]"#.to_string();
        let error = dispatcher(Ok(answer))
            .dispatch(request("claude-3-haiku-20240307"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidShape);
        assert_eq!(error.stage(), DispatchStage::Validating);
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let answer = r#"{"problem":"p","solution":"s","codeSnippet":"c"}"#.to_string();
        let result = dispatcher(Ok(answer))
            .dispatch(request("claude-3-haiku-20240307"))
            .await
            .unwrap();
        assert_eq!(result.problem_analysis(), "p");
        assert_eq!(result.solution_steps(), "s");
        assert_eq!(result.code_snippet(), "c");
    }

    #[tokio::test]
    async fn test_dispatch_invalid_shape() {
        let answer = r#"{"problem":"p","solution":""}"#.to_string();
        let error = dispatcher(Ok(answer))
            .dispatch(request("claude-3-haiku-20240307"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidShape);
    }

    #[tokio::test]
    async fn test_run_reports_unknown_model() {
        let report = dispatcher(Ok(String::new())).run(request("gpt-99")).await;
        assert!(!report.is_success());
        assert_eq!(report.provider, None);
        match report.outcome {
            DispatchOutcome::Failed { kind, stage, .. } => {
                assert_eq!(kind, ErrorKind::UnknownModel);
                assert_eq!(stage, DispatchStage::Idle);
            }
            other => panic!("Expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_reports_provider() {
        let answer = r#"{"problem":"p","solution":"s","codeSnippet":"c"}"#.to_string();
        let report = dispatcher(Ok(answer))
            .run(request("claude-3-haiku-20240307"))
            .await;
        assert!(report.is_success());
        assert_eq!(report.provider, Some(ProviderTag::Anthropic));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["provider"], "anthropic");
        assert_eq!(json["outcome"]["status"], "succeeded");
        assert_eq!(json["outcome"]["result"]["codeSnippet"], "c");
    }
}
