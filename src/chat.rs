use crate::client::{GenerationClient, GenerationParams};
use crate::prompt;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};

const QUIT_COMMAND: &str = "quit";

/// Interactive instruction/input loop against the model.
///
/// Ends on `quit` (any case) or end of input. A failed generation is reported
/// and the loop keeps going.
pub async fn run_chat<G, R, W>(generator: &G, params: &GenerationParams, mut input: R, mut output: W) -> Result<()>
where
    G: GenerationClient,
    R: BufRead,
    W: Write,
{
    loop {
        writeln!(output, "\n{}", "=".repeat(50))?;
        let Some(instruction) = prompt_line(&mut input, &mut output, "Instruction: ")? else {
            break;
        };
        if instruction.eq_ignore_ascii_case(QUIT_COMMAND) {
            break;
        }

        let Some(user_input) = prompt_line(&mut input, &mut output, "Input: ")? else {
            break;
        };

        let generation_prompt = prompt::render_generation_prompt(&instruction, &user_input);
        match generator.generate(&generation_prompt, params).await {
            Ok(generated) => {
                writeln!(output, "\nResponse: {}", prompt::extract_response(&generated))?;
            }
            Err(e) => {
                tracing::error!("Generation failed: {}", e);
                writeln!(output, "\nError: {}", e)?;
            }
        }
    }

    Ok(())
}

/// Prompt for one line; `None` at end of input
fn prompt_line<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> Result<Option<String>> {
    write!(output, "{label}")?;
    output.flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line).context("Failed to read from input")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
