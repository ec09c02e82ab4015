//! The closed set of adapters, one per provider tag.
//!
//! Routing is a `match` over [`ProviderTag`], so every tag in the catalog
//! always has exactly one adapter. Individual adapters can be swapped (for
//! tests or custom endpoints) but never removed.
//!
//! ## Usage
//!
//! ```ignore
//! let adapters = AdapterSet::from_config(&RuntimeConfig::default())?
//!     .with_adapter(Arc::new(MyAnthropicProxy::new()));
//!
//! let adapter = adapters.adapter_for(ProviderTag::Anthropic);
//! ```

use std::sync::Arc;

use bugsight_core::ProviderTag;

use super::{
    AnthropicAdapter, GeminiAdapter, OpenAiAdapter, ProviderAdapter, ProviderError,
    ReplicateAdapter,
};
use crate::config::RuntimeConfig;

/// One adapter per provider tag.
#[derive(Clone)]
pub struct AdapterSet {
    openai: Arc<dyn ProviderAdapter>,
    gemini: Arc<dyn ProviderAdapter>,
    anthropic: Arc<dyn ProviderAdapter>,
    replicate: Arc<dyn ProviderAdapter>,
}

impl AdapterSet {
    /// Build the HTTP adapters from runtime configuration.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, ProviderError> {
        let generation = config.generation();
        let endpoints = &config.endpoints;

        Ok(Self {
            openai: Arc::new(OpenAiAdapter::new(&endpoints.openai, generation)?),
            gemini: Arc::new(GeminiAdapter::new(&endpoints.gemini, generation)?),
            anthropic: Arc::new(AnthropicAdapter::new(&endpoints.anthropic, generation)?),
            replicate: Arc::new(ReplicateAdapter::new(&endpoints.replicate, generation)?),
        })
    }

    /// Build a set by asking `make` for each provider's adapter.
    ///
    /// Each returned adapter must report the tag it was built for.
    pub fn from_fn(
        mut make: impl FnMut(ProviderTag) -> Arc<dyn ProviderAdapter>,
    ) -> Result<Self, ProviderError> {
        let mut build = |tag: ProviderTag| {
            let adapter = make(tag);
            if adapter.provider() != tag {
                return Err(ProviderError::NotConfigured(format!(
                    "Adapter for '{}' reports provider '{}'",
                    tag,
                    adapter.provider()
                )));
            }
            Ok(adapter)
        };

        Ok(Self {
            openai: build(ProviderTag::OpenAi)?,
            gemini: build(ProviderTag::Gemini)?,
            anthropic: build(ProviderTag::Anthropic)?,
            replicate: build(ProviderTag::Replicate)?,
        })
    }

    /// Replace the adapter for whichever provider `adapter` serves.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        match adapter.provider() {
            ProviderTag::OpenAi => self.openai = adapter,
            ProviderTag::Gemini => self.gemini = adapter,
            ProviderTag::Anthropic => self.anthropic = adapter,
            ProviderTag::Replicate => self.replicate = adapter,
        }
        self
    }

    /// The adapter that handles `provider`.
    pub fn adapter_for(&self, provider: ProviderTag) -> &Arc<dyn ProviderAdapter> {
        match provider {
            ProviderTag::OpenAi => &self.openai,
            ProviderTag::Gemini => &self.gemini,
            ProviderTag::Anthropic => &self.anthropic,
            ProviderTag::Replicate => &self.replicate,
        }
    }
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSet")
            .field("providers", &ProviderTag::ALL)
            .finish()
    }
}
