//! End-to-end dispatch tests against deterministic stub adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bugsight_core::catalog::{self, MODELS};
use bugsight_core::ProviderTag;
use bugsight_runtime::providers::secrets::REDACTED;
use bugsight_runtime::{
    AdapterSet, ApiCredential, CredentialSource, DiagnosticRequest, DispatchError,
    DispatchOutcome, DispatchReport, DispatchStage, Dispatcher, ErrorKind, ProviderAdapter,
    ProviderError,
};

const SECRET: &str = "sk-live-0123456789abcdef";

/// What a stub adapter answers with.
#[derive(Clone)]
enum Reply {
    Fixed(Result<String, ProviderError>),
    /// Fails with an error built from the credential it was handed
    EchoCredential(fn(&str) -> ProviderError),
}

/// Replies with a fixed answer and counts calls.
struct StubAdapter {
    tag: ProviderTag,
    reply: Reply,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderAdapter for StubAdapter {
    fn provider(&self) -> ProviderTag {
        self.tag
    }

    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        credential: &ApiCredential,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(prompt.contains("codeSnippet"));
        assert_eq!(catalog::lookup(model).map(|m| m.provider), Some(self.tag));
        assert_eq!(credential.expose(), SECRET);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Reply::Fixed(reply) => reply.clone(),
            Reply::EchoCredential(build) => Err(build(credential.expose())),
        }
    }
}

struct Harness {
    dispatcher: Dispatcher,
    calls: Arc<AtomicUsize>,
}

fn harness(reply: Result<&str, ProviderError>) -> Harness {
    harness_with(
        Reply::Fixed(reply.map(str::to_string)),
        None,
        Duration::from_secs(5),
    )
}

fn harness_with(reply: Reply, delay: Option<Duration>, timeout: Duration) -> Harness {
    let calls = Arc::new(AtomicUsize::new(0));
    let adapters = AdapterSet::from_fn(|tag| {
        Arc::new(StubAdapter {
            tag,
            reply: reply.clone(),
            delay,
            calls: Arc::clone(&calls),
        }) as Arc<dyn ProviderAdapter>
    })
    .unwrap();

    Harness {
        dispatcher: Dispatcher::new(adapters, timeout),
        calls,
    }
}

fn request(model: &str) -> DiagnosticRequest {
    DiagnosticRequest::new(
        "for (i = 0; i <= n; i++) { sum += a[i]; }",
        "Reads past the end of the array",
        model,
        ApiCredential::new(SECRET, CredentialSource::Programmatic, "Test API key"),
    )
}

#[tokio::test]
async fn test_pure_json_answer_succeeds() {
    let h = harness(Ok(
        r#"{"problem":"off-by-one","solution":"use < not <=","codeSnippet":"for(i=0;i<=n;i++)"}"#,
    ));

    let result = h.dispatcher.dispatch(request("gpt-4o")).await.unwrap();
    assert_eq!(result.problem_analysis(), "off-by-one");
    assert_eq!(result.solution_steps(), "use < not <=");
    assert_eq!(result.code_snippet(), "for(i=0;i<=n;i++)");
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_json_in_prose_succeeds() {
    let h = harness(Ok(
        r#"I think the issue is here: {"problem":"null deref","solution":"check for null","codeSnippet":"x.value"} — let me know if that helps."#,
    ));

    let result = h
        .dispatcher
        .dispatch(request("gemini-1.5-flash"))
        .await
        .unwrap();
    assert_eq!(result.problem_analysis(), "null deref");
    assert_eq!(result.solution_steps(), "check for null");
    assert_eq!(result.code_snippet(), "x.value");
}

#[tokio::test]
async fn test_refusal_is_no_json_found() {
    let h = harness(Ok("Sorry, I cannot help with that."));

    let error = h
        .dispatcher
        .dispatch(request("claude-3-haiku-20240307"))
        .await
        .unwrap_err();
    assert_eq!(error, DispatchError::NoJsonFound);
    assert_eq!(error.stage(), DispatchStage::Extracting);
}

#[tokio::test]
async fn test_auth_failure_is_provider_call_failed() {
    let h = harness(Err(ProviderError::Auth(
        "Incorrect API key provided".to_string(),
    )));

    let error = h
        .dispatcher
        .dispatch(request("claude-3-haiku-20240307"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ProviderCallFailed);
    assert_eq!(error.stage(), DispatchStage::Calling);
    match error {
        DispatchError::ProviderCallFailed { provider, message } => {
            assert_eq!(provider, ProviderTag::Anthropic);
            assert!(message.contains("Authentication failed"));
        }
        other => panic!("Expected ProviderCallFailed, got {other:?}"),
    }
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_model_makes_no_call() {
    let h = harness(Ok("{}"));

    let error = h
        .dispatcher
        .dispatch(request("gpt-5-ultra"))
        .await
        .unwrap_err();
    assert_eq!(error, DispatchError::UnknownModel("gpt-5-ultra".to_string()));
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fragmented_output_is_unsupported_shape() {
    let h = harness(Err(ProviderError::UnsupportedOutputShape(
        "prediction output is a sequence of 12 fragments, not a single text value".to_string(),
    )));

    let error = h
        .dispatcher
        .dispatch(request("meta/meta-llama-3-70b-instruct"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnsupportedOutputShape);
    assert!(error.to_string().contains("12 fragments"));
}

#[tokio::test]
async fn test_missing_field_is_invalid_shape() {
    let h = harness(Ok(r#"{"problem":"off-by-one","solution":"use <"}"#));

    let error = h
        .dispatcher
        .dispatch(request("gpt-4o-mini"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidShape);
    assert_eq!(error.stage(), DispatchStage::Validating);
    assert!(error.to_string().contains("codeSnippet"));
}

#[tokio::test]
async fn test_empty_field_is_invalid_shape() {
    let h = harness(Ok(r#"{"problem":"off-by-one","solution":"","codeSnippet":"x"}"#));

    let error = h
        .dispatcher
        .dispatch(request("gpt-4o-mini"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidShape);
}

#[tokio::test(start_paused = true)]
async fn test_slow_provider_times_out() {
    let h = harness_with(
        Reply::Fixed(Ok("{}".to_string())),
        Some(Duration::from_secs(120)),
        Duration::from_secs(30),
    );

    let error = h
        .dispatcher
        .dispatch(request("gpt-4"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ProviderCallFailed);
    assert!(error.to_string().contains("Timeout"));
}

#[tokio::test]
async fn test_repeated_dispatch_is_identical() {
    let h = harness(Ok(
        r#"Sure! {"problem":"off-by-one","solution":"use <","codeSnippet":"i < n"}"#,
    ));

    let first = h.dispatcher.dispatch(request("gpt-4o")).await.unwrap();
    let second = h.dispatcher.dispatch(request("gpt-4o")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(h.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_every_catalog_model_dispatches() {
    let h = harness(Ok(r#"{"problem":"p","solution":"s","codeSnippet":"c"}"#));

    for model in MODELS {
        let report = h.dispatcher.run(request(model.identifier)).await;
        assert!(report.is_success(), "{} failed", model.identifier);
        assert_eq!(report.provider, Some(model.provider));
    }
    assert_eq!(h.calls.load(Ordering::SeqCst), MODELS.len());
}

#[tokio::test]
async fn test_array_wrapped_answer_is_invalid_shape() {
    let h = harness(Ok(
        r#"[{"problem":"off-by-one","solution":"use <","codeSnippet":"i < n"}]"#,
    ));

    let report = h.dispatcher.run(request("gpt-4o")).await;
    assert!(!report.is_success());
    match report.outcome {
        DispatchOutcome::Failed { kind, stage, .. } => {
            assert_eq!(kind, ErrorKind::InvalidShape);
            assert_eq!(stage, DispatchStage::Validating);
        }
        other => panic!("Expected failure, got {other:?}"),
    }
}

fn assert_scrubbed(report: &DispatchReport) {
    let json = serde_json::to_string(report).unwrap();
    assert!(!json.contains(SECRET), "{json}");
    assert!(json.contains(REDACTED), "{json}");
    assert!(!format!("{:?}", report).contains(SECRET));
}

#[tokio::test]
async fn test_echoed_credential_never_in_failure_output() {
    let echoes: [fn(&str) -> ProviderError; 4] = [
        |key| ProviderError::Prediction {
            status: "failed".to_string(),
            message: format!("Invalid token {key} for model"),
        },
        |key| ProviderError::Blocked(format!("SAFETY (prompt mentioned {key})")),
        |key| ProviderError::Http(format!("error sending request for url (https://host/v1?key={key})")),
        |key| ProviderError::UnsupportedOutputShape(format!("output started with {key}")),
    ];

    for echo in echoes {
        let h = harness_with(Reply::EchoCredential(echo), None, Duration::from_secs(5));

        let error = h
            .dispatcher
            .dispatch(request("meta/meta-llama-3-70b-instruct"))
            .await
            .unwrap_err();
        assert!(!error.to_string().contains(SECRET), "{error}");
        assert!(!format!("{error:?}").contains(SECRET));

        let report = h.dispatcher.run(request("gemini-1.5-flash")).await;
        assert!(!report.is_success());
        assert_scrubbed(&report);
    }
}

#[tokio::test]
async fn test_credential_never_in_auth_failure_output() {
    let h = harness_with(
        Reply::EchoCredential(|key| ProviderError::Auth(format!("key {key} rejected"))),
        None,
        Duration::from_secs(5),
    );

    let report = h.dispatcher.run(request("gpt-4o")).await;
    assert_scrubbed(&report);
}
