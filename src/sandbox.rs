//! Execution limits for sandboxed program runs

use rhai::Engine;
use serde::{Deserialize, Serialize};

// Default limits sized for a full pass over ~50k records with a couple of
// capability calls per record.
pub const DEFAULT_MAX_OPERATIONS: u64 = 50_000_000;
pub const DEFAULT_MAX_CAPABILITY_CALLS: usize = 500_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_MAX_STRING_SIZE: usize = 10_000_000;
pub const DEFAULT_MAX_ARRAY_SIZE: usize = 1_000_000;
pub const DEFAULT_MAX_MAP_SIZE: usize = 1_000_000;
pub const DEFAULT_MAX_EXPR_DEPTH: usize = 64;

pub const QUICK_MAX_OPERATIONS: u64 = 100_000;
pub const QUICK_MAX_CAPABILITY_CALLS: usize = 100;
pub const QUICK_TIMEOUT_MS: u64 = 5_000;

pub const EXTENDED_MAX_OPERATIONS: u64 = 500_000_000;
pub const EXTENDED_MAX_CAPABILITY_CALLS: usize = 5_000_000;
pub const EXTENDED_TIMEOUT_MS: u64 = 600_000;

/// Operations between wall-clock checks in the progress hook
pub(crate) const TIMEOUT_CHECK_INTERVAL: u64 = 1_024;

/// Limits for a single program execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Maximum number of interpreter operations (prevents infinite loops)
    pub max_operations: u64,
    /// Maximum number of capability calls allowed
    pub max_capability_calls: usize,
    /// Wall-clock timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum string size in bytes
    pub max_string_size: usize,
    /// Maximum array size
    pub max_array_size: usize,
    /// Maximum map size
    pub max_map_size: usize,
    /// Maximum expression nesting depth
    pub max_expr_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_operations: DEFAULT_MAX_OPERATIONS,
            max_capability_calls: DEFAULT_MAX_CAPABILITY_CALLS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_string_size: DEFAULT_MAX_STRING_SIZE,
            max_array_size: DEFAULT_MAX_ARRAY_SIZE,
            max_map_size: DEFAULT_MAX_MAP_SIZE,
            max_expr_depth: DEFAULT_MAX_EXPR_DEPTH,
        }
    }
}

impl ExecutionLimits {
    /// Create new limits with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Tight limits for small programs and tests
    pub fn quick() -> Self {
        Self {
            max_operations: QUICK_MAX_OPERATIONS,
            max_capability_calls: QUICK_MAX_CAPABILITY_CALLS,
            timeout_ms: QUICK_TIMEOUT_MS,
            ..Default::default()
        }
    }

    /// Generous limits for multi-pass analysis over large stores
    pub fn extended() -> Self {
        Self {
            max_operations: EXTENDED_MAX_OPERATIONS,
            max_capability_calls: EXTENDED_MAX_CAPABILITY_CALLS,
            timeout_ms: EXTENDED_TIMEOUT_MS,
            ..Default::default()
        }
    }

    /// Builder: set max operations
    pub fn with_max_operations(mut self, max: u64) -> Self {
        self.max_operations = max;
        self
    }

    /// Builder: set max capability calls
    pub fn with_max_capability_calls(mut self, max: usize) -> Self {
        self.max_capability_calls = max;
        self
    }

    /// Builder: set timeout
    pub fn with_timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout_ms = timeout;
        self
    }

    /// Builder: set max string size
    pub fn with_max_string_size(mut self, size: usize) -> Self {
        self.max_string_size = size;
        self
    }

    /// Builder: set max array size
    pub fn with_max_array_size(mut self, size: usize) -> Self {
        self.max_array_size = size;
        self
    }

    /// Builder: set max map size
    pub fn with_max_map_size(mut self, size: usize) -> Self {
        self.max_map_size = size;
        self
    }

    /// Apply the size and operation limits to an engine.
    ///
    /// Timeout and capability-call limits are enforced by the executor.
    pub(crate) fn apply(&self, engine: &mut Engine) {
        engine.set_max_operations(self.max_operations);
        engine.set_max_string_size(self.max_string_size);
        engine.set_max_array_size(self.max_array_size);
        engine.set_max_map_size(self.max_map_size);
        engine.set_max_expr_depths(self.max_expr_depth, self.max_expr_depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.max_operations, DEFAULT_MAX_OPERATIONS);
        assert_eq!(limits.max_capability_calls, DEFAULT_MAX_CAPABILITY_CALLS);
        assert_eq!(limits.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_default_limits_fit_full_ticket_store() {
        let limits = ExecutionLimits::default();
        assert!(limits.max_array_size >= 50_000);
        // two map entries per record
        assert!(limits.max_map_size >= 100_000);
    }

    #[test]
    fn test_quick_limits() {
        let limits = ExecutionLimits::quick();
        assert_eq!(limits.max_operations, 100_000);
        assert_eq!(limits.max_capability_calls, 100);
        assert_eq!(limits.timeout_ms, 5_000);
    }

    #[test]
    fn test_extended_limits() {
        let limits = ExecutionLimits::extended();
        assert_eq!(limits.max_operations, EXTENDED_MAX_OPERATIONS);
        assert_eq!(limits.max_capability_calls, EXTENDED_MAX_CAPABILITY_CALLS);
    }

    #[test]
    fn test_builder_pattern() {
        let limits = ExecutionLimits::default()
            .with_max_operations(50_000)
            .with_max_capability_calls(25)
            .with_timeout_ms(10_000);

        assert_eq!(limits.max_operations, 50_000);
        assert_eq!(limits.max_capability_calls, 25);
        assert_eq!(limits.timeout_ms, 10_000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let limits: ExecutionLimits = toml::from_str("timeout_ms = 1500").unwrap();
        assert_eq!(limits.timeout_ms, 1_500);
        assert_eq!(limits.max_operations, DEFAULT_MAX_OPERATIONS);
    }
}
