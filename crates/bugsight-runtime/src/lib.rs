//! # bugsight-runtime
//!
//! Provider adapters and the dispatch controller for bugsight.
//!
//! A [`Dispatcher`] takes a [`DiagnosticRequest`], looks the model up in the
//! catalog, sends one prompt to the model's provider, and turns the answer
//! into a validated [`DiagnosticResult`] or a classified [`DispatchError`].
//!
//! ## Providers
//!
//! HTTP transport for each provider sits behind a cargo feature (`openai`,
//! `gemini`, `anthropic`, `replicate`, or `all-providers`). Without its
//! feature an adapter still exists, so routing stays total, but every call
//! fails as `ProviderCallFailed`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bugsight_runtime::{DiagnosticRequest, Dispatcher, RuntimeConfig};
//! use bugsight_runtime::providers::ApiCredential;
//!
//! let dispatcher = Dispatcher::from_config(&RuntimeConfig::default())?;
//! let credential = ApiCredential::for_provider_from_env(ProviderTag::Anthropic)?;
//!
//! let request = DiagnosticRequest::new(code, problem, "claude-3-5-sonnet-20241022", credential);
//! match dispatcher.dispatch(request).await {
//!     Ok(result) => println!("{}", result.solution_steps()),
//!     Err(e) => eprintln!("{} ({})", e, e.kind()),
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod providers;
pub mod request;

pub use bugsight_core::DiagnosticResult;
pub use config::{ConfigError, Endpoints, RuntimeConfig};
pub use dispatch::{
    DispatchError, DispatchOutcome, DispatchReport, DispatchStage, Dispatcher, DispatcherBuilder,
    ErrorKind,
};
pub use providers::{AdapterSet, ApiCredential, CredentialSource, ProviderAdapter, ProviderError};
pub use request::DiagnosticRequest;
