//! Secure credential handling for provider adapters.
//!
//! This module provides a single type for API credentials across all
//! providers. Using it ensures:
//!
//! - **No accidental logging**: Credentials cannot appear in Debug/Display output
//! - **Memory safety**: Credentials are zeroed on drop
//! - **No echoing**: Provider error text is scrubbed with [`redact`] before it
//!   reaches the caller
//!
//! ## Usage
//!
//! ```ignore
//! use bugsight_runtime::providers::{ApiCredential, CredentialSource};
//!
//! // Load the conventional variable for a provider
//! let cred = ApiCredential::for_provider_from_env(ProviderTag::Anthropic)?;
//!
//! // Use in HTTP header (explicit exposure)
//! request.header("x-api-key", cred.expose());
//! ```

use bugsight_core::ProviderTag;
use lazy_static::lazy_static;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Replacement text for scrubbed secrets.
pub const REDACTED: &str = "[REDACTED]";

lazy_static! {
    /// Secrets carried in query strings: `?key=...`, `&api_key=...`, `token=...`
    static ref QUERY_SECRET_PATTERN: Regex = Regex::new(
        r#"(?i)([?&](?:key|api[_-]?key|access[_-]?token|token)=)[^&\s"']+"#
    ).unwrap();

    /// Bearer tokens echoed from an Authorization header
    static ref BEARER_PATTERN: Regex = Regex::new(
        r"(?i)(bearer\s+)[a-z0-9._~+/=-]+"
    ).unwrap();
}

/// Where a credential was loaded from.
///
/// This is useful for debugging configuration issues without
/// exposing the actual credential value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically (request input, CLI flag)
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// Conventional environment variable holding a provider's credential.
pub fn credential_env_var(provider: ProviderTag) -> &'static str {
    match provider {
        ProviderTag::OpenAi => "OPENAI_API_KEY",
        ProviderTag::Gemini => "GEMINI_API_KEY",
        ProviderTag::Anthropic => "ANTHROPIC_API_KEY",
        ProviderTag::Replicate => "REPLICATE_API_TOKEN",
    }
}

fn credential_name(provider: ProviderTag) -> &'static str {
    match provider {
        ProviderTag::OpenAi => "OpenAI API key",
        ProviderTag::Gemini => "Gemini API key",
        ProviderTag::Anthropic => "Anthropic API key",
        ProviderTag::Replicate => "Replicate API token",
    }
}

/// A securely-stored API credential.
///
/// This wrapper provides:
/// - Safe Debug/Display implementations that show `[REDACTED]`
/// - Memory zeroing on drop via `secrecy` crate
/// - Explicit exposure via `.expose()` method
/// - Source tracking for debugging
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Create a new credential from a string value.
    ///
    /// The value is immediately wrapped in SecretString and cannot
    /// be accidentally logged after this point.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load credential from an environment variable.
    ///
    /// # Arguments
    /// * `env_var` - Name of the environment variable
    /// * `name` - Human-readable name for error messages (e.g., "Anthropic API key")
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Load the conventional environment variable for `provider`.
    pub fn for_provider_from_env(provider: ProviderTag) -> Result<Self, ProviderError> {
        Self::from_env(credential_env_var(provider), credential_name(provider))
    }

    /// Expose the credential value for use in API calls.
    ///
    /// Only call this at the point where the credential is actually needed
    /// (e.g., setting an HTTP header). Never store the exposed value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Check if the credential is empty.
    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    /// Get the source of this credential.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Get the human-readable name of this credential.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &REDACTED)
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} {}", self.name, self.source, REDACTED)
    }
}

/// Scrub secrets from text that may be shown to the caller.
///
/// Removes the literal credential value, secret-bearing query parameters,
/// and bearer tokens.
pub fn redact(text: &str, credential: &ApiCredential) -> String {
    let mut scrubbed = if credential.is_empty() {
        text.to_string()
    } else {
        text.replace(credential.expose(), REDACTED)
    };

    scrubbed = QUERY_SECRET_PATTERN
        .replace_all(&scrubbed, format!("${{1}}{}", REDACTED).as_str())
        .into_owned();
    BEARER_PATTERN
        .replace_all(&scrubbed, format!("${{1}}{}", REDACTED).as_str())
        .into_owned()
}
