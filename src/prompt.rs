//! Instruction prompt template shared by preparation, evaluation and chat.
//!
//! Sections are delimited by the literal marker `"### "`. There is no
//! escaping: a field whose own content contains that marker cannot be
//! recovered by [`parse`].

const PREAMBLE: &str = "Below is an instruction that describes a task, paired with an input that provides further context. Write a response that appropriately completes the request.";

const MARKER: &str = "### ";
const INSTRUCTION_LABEL: &str = "Instruction:";
const INPUT_LABEL: &str = "Input:";
const RESPONSE_LABEL: &str = "Response:";

/// Fields recovered from a rendered prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptParts {
    pub instruction: String,
    pub input: String,
    pub output: String,
}

/// Render the full template. Pass an empty `response` to get a generation prompt.
pub fn render(instruction: &str, input: &str, response: &str) -> String {
    format!(
        "{PREAMBLE}\n\n{MARKER}{INSTRUCTION_LABEL}\n{instruction}\n\n{MARKER}{INPUT_LABEL}\n{input}\n\n{MARKER}{RESPONSE_LABEL}\n{response}"
    )
}

/// Render the prompt sent to the model, ending right after the response header
pub fn render_generation_prompt(instruction: &str, input: &str) -> String {
    render(instruction, input, "")
}

/// Split a rendered prompt back into its fields. Missing sections come back empty.
pub fn parse(text: &str) -> PromptParts {
    let mut parts = PromptParts::default();

    for segment in text.split(MARKER) {
        if let Some(rest) = segment.strip_prefix(INSTRUCTION_LABEL) {
            parts.instruction = rest.trim().to_string();
        } else if let Some(rest) = segment.strip_prefix(INPUT_LABEL) {
            parts.input = rest.trim().to_string();
        } else if let Some(rest) = segment.strip_prefix(RESPONSE_LABEL) {
            parts.output = rest.trim().to_string();
        }
    }

    parts
}

/// Keep only what follows the last response header of a generation
pub fn extract_response(generated: &str) -> String {
    let header = format!("{MARKER}{RESPONSE_LABEL}");
    match generated.rfind(&header) {
        Some(pos) => generated[pos + header.len()..].trim().to_string(),
        None => generated.trim().to_string(),
    }
}
