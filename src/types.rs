//! Core types for sandboxed program execution

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder returned when a program finishes without assigning `result`
pub const NO_RESULT_MARKER: &str = "Code executed successfully";

/// Prefix of every rendered failure
pub const FAILURE_PREFIX: &str = "Error executing code: ";

/// What a single program execution produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The program assigned the output binding
    Value { value: serde_json::Value },
    /// The program completed without assigning the output binding
    NoResult,
    /// The program failed; the failure never escapes as a fault
    Failure { kind: FailureKind, message: String },
}

/// Classification of a failed execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Program text could not be parsed
    Syntax,
    /// Program referenced a variable or function outside the environment
    NameResolution,
    /// A bound capability reported an error
    Capability,
    /// Type or arity mismatch, or any other evaluation error
    Runtime,
    /// An execution limit was hit
    LimitExceeded,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Syntax => write!(f, "syntax"),
            FailureKind::NameResolution => write!(f, "name_resolution"),
            FailureKind::Capability => write!(f, "capability"),
            FailureKind::Runtime => write!(f, "runtime"),
            FailureKind::LimitExceeded => write!(f, "limit_exceeded"),
        }
    }
}

/// Result from executing a program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exactly one outcome per execution
    pub outcome: ExecutionOutcome,
    /// All capability calls made during execution
    pub capability_calls: Vec<CapabilityCall>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    /// Create a result carrying the program's output value
    pub fn value(
        value: serde_json::Value,
        capability_calls: Vec<CapabilityCall>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            outcome: ExecutionOutcome::Value { value },
            capability_calls,
            execution_time_ms,
        }
    }

    /// Create a result for a program that never assigned its output
    pub fn no_result(capability_calls: Vec<CapabilityCall>, execution_time_ms: u64) -> Self {
        Self {
            outcome: ExecutionOutcome::NoResult,
            capability_calls,
            execution_time_ms,
        }
    }

    /// Create a failed result
    pub fn failure(
        kind: FailureKind,
        message: String,
        capability_calls: Vec<CapabilityCall>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            outcome: ExecutionOutcome::Failure { kind, message },
            capability_calls,
            execution_time_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, ExecutionOutcome::Failure { .. })
    }

    /// The output value, if the program assigned one
    pub fn value_ref(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            ExecutionOutcome::Value { value } => Some(value),
            _ => None,
        }
    }

    /// Failure message, if the execution failed
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ExecutionOutcome::Failure { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            ExecutionOutcome::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Render the outcome as the caller-facing string.
    ///
    /// Strings are returned verbatim, other values as compact JSON.
    pub fn render(&self) -> String {
        match &self.outcome {
            ExecutionOutcome::Value {
                value: serde_json::Value::String(s),
            } => s.clone(),
            ExecutionOutcome::Value { value } => value.to_string(),
            ExecutionOutcome::NoResult => NO_RESULT_MARKER.to_string(),
            ExecutionOutcome::Failure { message, .. } => format!("{FAILURE_PREFIX}{message}"),
        }
    }
}

/// Record of a single capability call during execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityCall {
    /// Name of the capability that was called
    pub capability: String,
    /// Arguments passed to the capability (as JSON)
    pub arguments: Vec<serde_json::Value>,
    /// Whether the call succeeded
    pub success: bool,
    /// Error reported by the capability, if any
    pub error: Option<String>,
    /// Execution time for this call in microseconds
    pub duration_us: u64,
}

impl CapabilityCall {
    pub fn new(
        capability: String,
        arguments: Vec<serde_json::Value>,
        error: Option<String>,
        duration_us: u64,
    ) -> Self {
        Self {
            capability,
            arguments,
            success: error.is_none(),
            error,
            duration_us,
        }
    }
}

/// Misuse of the executor or registry API.
///
/// These are the only errors returned to callers; everything caused by the
/// program text itself is reported through [`ExecutionOutcome::Failure`].
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("program text is empty")]
    EmptyProgram,

    #[error("capability `{0}` is registered more than once")]
    DuplicateCapability(String),

    #[error("invalid capability name `{0}`")]
    InvalidCapabilityName(String),

    #[error("capability `{name}` declares {arity} parameters (at most {max} supported)")]
    UnsupportedArity {
        name: String,
        arity: usize,
        max: usize,
    },
}

/// Error reported by a capability implementation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CapabilityError {
    #[error("invalid argument `{param}`: {reason}")]
    InvalidArgument { param: String, reason: String },

    #[error("{0}")]
    Backend(String),
}

impl CapabilityError {
    pub fn backend(message: impl std::fmt::Display) -> Self {
        CapabilityError::Backend(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_result_renders_json() {
        let result = ExecutionResult::value(serde_json::json!({"total": 3}), vec![], 5);
        assert!(result.is_success());
        assert_eq!(result.render(), r#"{"total":3}"#);
        assert!(result.error().is_none());
    }

    #[test]
    fn test_string_value_renders_verbatim() {
        let result = ExecutionResult::value(serde_json::json!("done"), vec![], 0);
        assert_eq!(result.render(), "done");
    }

    #[test]
    fn test_no_result_marker() {
        let result = ExecutionResult::no_result(vec![], 1);
        assert!(result.is_success());
        assert_eq!(result.render(), "Code executed successfully");
        assert!(result.value_ref().is_none());
    }

    #[test]
    fn test_failure_rendering() {
        let result =
            ExecutionResult::failure(FailureKind::Runtime, "boom".to_string(), vec![], 2);
        assert!(!result.is_success());
        assert_eq!(result.failure_kind(), Some(FailureKind::Runtime));
        assert_eq!(result.render(), "Error executing code: boom");
    }

    #[test]
    fn test_capability_call_success_flag() {
        let ok = CapabilityCall::new("fetch_records".into(), vec![serde_json::json!(1)], None, 10);
        assert!(ok.success);

        let failed = CapabilityCall::new(
            "save_report".into(),
            vec![],
            Some("disk full".to_string()),
            3,
        );
        assert!(!failed.success);
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::NameResolution.to_string(), "name_resolution");
        assert_eq!(FailureKind::LimitExceeded.to_string(), "limit_exceeded");
    }
}
