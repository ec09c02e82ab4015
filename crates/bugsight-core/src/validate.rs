//! Result validation against the diagnostic output contract.
//!
//! Parsed model output is checked against schema/diagnostic_result.schema.json
//! before a [`DiagnosticResult`] is constructed. There is no coercion and no
//! default-filling: the value must be an object with all three non-empty
//! string fields or it is rejected. Arrays and scalars are never unwrapped.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;
use thiserror::Error;

/// Embedded result schema (loaded at compile time).
const RESULT_SCHEMA_JSON: &str = include_str!("../schema/diagnostic_result.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from result validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Failed to load result schema: {0}")]
    SchemaLoad(String),

    #[error("Response does not match the expected shape: {}", .0.join("; "))]
    InvalidShape(Vec<String>),
}

/// A validated diagnosis.
///
/// Only [`validate`] constructs one, so every instance has three non-empty
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticResult {
    /// What is wrong and why
    #[serde(rename = "problem")]
    problem_analysis: String,

    /// How to fix it
    #[serde(rename = "solution")]
    solution_steps: String,

    /// The corrected code
    #[serde(rename = "codeSnippet")]
    code_snippet: String,
}

impl DiagnosticResult {
    pub fn problem_analysis(&self) -> &str {
        &self.problem_analysis
    }

    pub fn solution_steps(&self) -> &str {
        &self.solution_steps
    }

    pub fn code_snippet(&self) -> &str {
        &self.code_snippet
    }
}

fn get_validator() -> Result<&'static jsonschema::Validator, ValidationError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: JsonValue = match serde_json::from_str(RESULT_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(ValidationError::SchemaLoad(e.clone())),
    }
}

/// Validate a parsed value and build a [`DiagnosticResult`] from it.
///
/// Requires an object with non-empty strings at `problem`, `solution`, and
/// `codeSnippet`. Extra keys are ignored. All violations are reported together.
pub fn validate(value: &JsonValue) -> Result<DiagnosticResult, ValidationError> {
    let validator = get_validator()?;

    let violations: Vec<String> = validator
        .iter_errors(value)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{} at {}", e, path)
            }
        })
        .collect();

    if !violations.is_empty() {
        return Err(ValidationError::InvalidShape(violations));
    }

    Ok(DiagnosticResult {
        problem_analysis: string_field(value, "problem")?,
        solution_steps: string_field(value, "solution")?,
        code_snippet: string_field(value, "codeSnippet")?,
    })
}

fn string_field(value: &JsonValue, key: &str) -> Result<String, ValidationError> {
    match value.get(key) {
        Some(JsonValue::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(ValidationError::InvalidShape(vec![format!(
            "\"{}\" must be a non-empty string",
            key
        )])),
    }
}
