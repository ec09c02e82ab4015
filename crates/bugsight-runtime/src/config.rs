//! Runtime configuration loaded from YAML.
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```yaml
//! request_timeout: 45s
//! max_tokens: 2048
//! temperature: 0.0
//! endpoints:
//!   anthropic: http://localhost:8080/v1
//! ```

use bugsight_core::ProviderTag;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::providers::{
    GenerationConfig, DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_REPLICATE_BASE_URL,
};

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Base URLs for each provider's API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    pub openai: String,
    pub gemini: String,
    pub anthropic: String,
    pub replicate: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openai: DEFAULT_OPENAI_BASE_URL.to_string(),
            gemini: DEFAULT_GEMINI_BASE_URL.to_string(),
            anthropic: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            replicate: DEFAULT_REPLICATE_BASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// The base URL configured for `provider`.
    pub fn base_url(&self, provider: ProviderTag) -> &str {
        match provider {
            ProviderTag::OpenAi => &self.openai,
            ProviderTag::Gemini => &self.gemini,
            ProviderTag::Anthropic => &self.anthropic,
            ProviderTag::Replicate => &self.replicate,
        }
    }
}

/// Configuration for the dispatch runtime.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Upper bound on one provider call, e.g. "60s" or "2m"
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,

    /// Maximum tokens the model may generate
    pub max_tokens: u32,

    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,

    /// Provider base URLs
    pub endpoints: Endpoints,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let generation = GenerationConfig::default();
        Self {
            request_timeout: generation.timeout,
            max_tokens: generation.max_tokens,
            temperature: generation.temperature,
            endpoints: Endpoints::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as null, not as an empty map
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be greater than zero".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "max_tokens must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        for provider in ProviderTag::ALL {
            let url = self.endpoints.base_url(provider);
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "endpoints.{} must be an http(s) URL, got '{}'",
                    provider.as_str(),
                    url
                )));
            }
        }

        Ok(())
    }

    /// Generation parameters handed to every adapter.
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.request_timeout,
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}
