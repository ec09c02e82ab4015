//! The per-invocation input to a dispatch.

use crate::providers::ApiCredential;

/// One diagnostic request, consumed by a single dispatch.
///
/// The request owns its credential. Because [`Dispatcher::dispatch`] takes
/// the request by value, the credential is dropped when the dispatch ends.
///
/// [`Dispatcher::dispatch`]: crate::Dispatcher::dispatch
#[derive(Debug)]
pub struct DiagnosticRequest {
    /// Source code to diagnose
    pub code_text: String,

    /// Free-text description of the problem
    pub problem_text: String,

    /// Catalog identifier of the model to ask
    pub model_identifier: String,

    /// Credential for the model's provider
    pub credential: ApiCredential,
}

impl DiagnosticRequest {
    /// Create a new request.
    pub fn new(
        code_text: impl Into<String>,
        problem_text: impl Into<String>,
        model_identifier: impl Into<String>,
        credential: ApiCredential,
    ) -> Self {
        Self {
            code_text: code_text.into(),
            problem_text: problem_text.into(),
            model_identifier: model_identifier.into(),
            credential,
        }
    }
}
