//! Delegated-execution path: the model writes a program, the sandbox runs it

use tracing::{info, warn};

use super::extract::extract_program;
use super::{ModelSettings, OrchestrationError, TokenUsage};
use crate::engine::SandboxedExecutor;
use crate::llm::{CompletionClient, CompletionRequest, Message};
use crate::registry::{CapabilityRegistry, OUTPUT_BINDING};
use crate::types::{ExecutionResult, FailureKind, SandboxError};

const DELEGATED_USER_PROMPT: &str =
    "Write a Rhai program to analyze all support tickets and generate a report.";

/// Outcome of one delegated-execution run
#[derive(Debug, Clone)]
pub struct DelegatedRun {
    /// Usage for the single planning request
    pub usage: TokenUsage,
    pub response_text: String,
    pub program: String,
    pub result: ExecutionResult,
}

/// System prompt listing the registry's capabilities
pub fn delegated_system_prompt(registry: &CapabilityRegistry) -> String {
    format!(
        "\
You are an AI assistant with access to a Rhai scripting environment.

Available functions:
{functions}

Helpers: len, sum, min, max, sorted, any, all, enumerate, zip, tally(array) -> map of counts,
str, int, float, plus Rhai string, array and map methods. There is no file, network or
process access.

Rhai syntax: `let x = 0;`, `for item in items {{ ... }}`, `if a {{ ... }} else {{ ... }}`,
maps are `#{{ key: value }}`, fields are read with `item.text` or `item[\"text\"]`.

Your task: write a Rhai program that:
1. Fetches all tickets
2. Processes them efficiently using loops
3. Counts sentiments and topics
4. Creates a summary report
5. Saves it using save_report()

Store your final result in the variable `{output}` (assign it, do not declare it with `let`).

Write concise, efficient code in a single ```rhai block. DO NOT return any ticket data to me -
process everything in the program.",
        functions = registry.describe(),
        output = OUTPUT_BINDING,
    )
}

/// Ask the model for a program and execute it locally.
///
/// Program failures, including a response with no program in it, are part
/// of the returned [`ExecutionResult`]; only a client failure is an error.
pub fn run_delegated(
    client: &dyn CompletionClient,
    executor: &SandboxedExecutor,
    settings: &ModelSettings,
) -> Result<DelegatedRun, OrchestrationError> {
    let request = CompletionRequest {
        model: settings.model.clone(),
        max_tokens: settings.max_tokens,
        system: delegated_system_prompt(executor.registry()),
        messages: vec![Message::user_text(DELEGATED_USER_PROMPT)],
    };

    let completion = client.complete(&request)?;
    let usage = TokenUsage::from(&completion);
    info!(
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "received program from model"
    );

    let program = extract_program(&completion.text).to_string();
    let result = match executor.execute(&program) {
        Ok(result) => result,
        Err(SandboxError::EmptyProgram) => {
            warn!("model response contained no program");
            ExecutionResult::failure(
                FailureKind::Syntax,
                SandboxError::EmptyProgram.to_string(),
                Vec::new(),
                0,
            )
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        success = result.is_success(),
        capability_calls = result.capability_calls.len(),
        execution_time_ms = result.execution_time_ms,
        "delegated-execution run complete"
    );

    Ok(DelegatedRun {
        usage,
        response_text: completion.text,
        program,
        result,
    })
}
