//! Direct-context and delegated-execution orchestration paths
//!
//! Both paths send one request to the completion client and report token
//! usage. The direct path puts a bounded sample of records into the prompt
//! and extrapolates; the delegated path asks for a program and runs it in
//! the [`SandboxedExecutor`](crate::engine::SandboxedExecutor).

pub mod delegated;
pub mod direct;
pub mod estimate;
pub mod extract;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collaborators::{ReportError, StoreError};
use crate::llm::{Completion, LlmError};
use crate::types::SandboxError;

pub use delegated::{delegated_system_prompt, run_delegated, DelegatedRun};
pub use direct::{run_direct, DirectRun, DIRECT_SYSTEM_PROMPT};
pub use estimate::{estimate_tokens, extrapolate, Comparison, CostModel};
pub use extract::extract_program;

/// Model parameters shared by both paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: String,
    pub max_tokens: u32,
}

/// Token counters reported by the completion client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl From<&Completion> for TokenUsage {
    fn from(c: &Completion) -> Self {
        Self {
            input_tokens: c.input_tokens,
            output_tokens: c.output_tokens,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("completion failed: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("sandbox misuse: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("record store is empty")]
    NoRecords,
}
