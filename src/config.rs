//! Configuration for the comparison driver

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::builtins::BuiltinSet;
use crate::orchestration::{CostModel, ModelSettings};
use crate::sandbox::ExecutionLimits;

/// Environment variable naming an optional TOML config file
pub const CONFIG_ENV: &str = "BENCH_CONFIG";
/// Environment variable holding the model API key
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to expand variables in config: {0}")]
    Expand(#[from] shellexpand::LookupError<std::env::VarError>),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub model: String,
    pub max_tokens: u32,
    /// Supports ${ENV_VAR} substitution; falls back to ANTHROPIC_API_KEY
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    /// Number of synthetic tickets in the store
    pub record_count: usize,
    pub seed: u64,
    /// Records placed in the direct-context prompt
    pub direct_sample_size: usize,
    /// Write reports as JSON files here instead of keeping them in memory
    pub report_dir: Option<PathBuf>,
    pub cost: CostModel,
    pub limits: ExecutionLimits,
    pub builtins: BuiltinSet,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 2000,
            api_key: None,
            request_timeout_secs: 120,
            record_count: 50_000,
            seed: 42,
            direct_sample_size: 50,
            report_dir: None,
            cost: CostModel::default(),
            limits: ExecutionLimits::default(),
            builtins: BuiltinSet::standard(),
        }
    }
}

impl BenchConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse TOML, expanding `${VAR}` references first
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let expanded = shellexpand::env(content)?;
        Ok(toml::from_str(&expanded)?)
    }

    /// Load from `$BENCH_CONFIG` when set, otherwise defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    /// Configured key, or the environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        }
    }
}
