//! Prompt construction for diagnostic requests.
//!
//! The prompt is provider-agnostic. Adapters may add their own role framing
//! (a system message, for example) but never change the output contract.
//!
//! The output contract is the one stable protocol between bugsight and the
//! models it calls:
//!
//! ```text
//! {"problem": string, "solution": string, "codeSnippet": string}
//! ```

/// The exact JSON shape every model is asked to return.
pub const OUTPUT_CONTRACT: &str = r#"{"problem": string, "solution": string, "codeSnippet": string}"#;

/// Role framing for providers that take a separate system instruction.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert software debugging assistant. \
You always respond with a single JSON object and nothing else.";

/// Render the instruction sent to a provider.
///
/// `code_text` and `problem_text` are embedded verbatim. Empty input is
/// passed through unchanged; rejecting it is the caller's job.
pub fn build(code_text: &str, problem_text: &str) -> String {
    format!(
        r#"You are an expert software engineer helping a developer debug their code.

Analyze the code below together with the developer's description of the problem.

## Code
```
{code_text}
```

## Problem Description
{problem_text}

## Output Format (JSON)
Respond with ONLY a JSON object of exactly this shape:
{OUTPUT_CONTRACT}

- "problem": a clear analysis of what is wrong and why
- "solution": the steps needed to fix it
- "codeSnippet": the corrected code

Do not add any text before or after the JSON object. Do not wrap it in markdown."#
    )
}
