//! # bugsight-core
//!
//! Deterministic building blocks for AI-assisted debugging.
//!
//! This crate turns a code sample and a problem description into a prompt,
//! and turns a model's free-text answer back into a validated
//! [`DiagnosticResult`]. It never performs I/O; provider calls live in
//! `bugsight-runtime`.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces the same prompt and result
//! 2. **No LLM calls**: Everything here is pure string and JSON handling
//! 3. **Validated output**: A `DiagnosticResult` only exists after validation
//!
//! ## Example
//!
//! ```rust,ignore
//! use bugsight_core::{extract, prompt, validate, Extraction};
//!
//! let text = prompt::build(code, problem);
//! // ... send `text` to a model, receive `answer` ...
//! match extract(&answer) {
//!     Extraction::Parsed(value) => println!("{:?}", validate(&value)?),
//!     Extraction::NotFound => println!("model ignored the output format"),
//! }
//! ```

pub mod catalog;
pub mod extract;
pub mod prompt;
pub mod validate;

// Re-export main types at crate root
pub use catalog::{ModelDescriptor, ProviderTag};
pub use extract::{extract, Extraction};
pub use validate::{validate, DiagnosticResult, ValidationError};
