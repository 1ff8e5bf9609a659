//! Report sinks

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Which orchestration path produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMethod {
    Direct,
    Delegated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: String,
    pub method: ReportMethod,
    pub records_processed: u64,
    /// Free-form fields supplied by a program
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl Report {
    pub fn new(summary: impl Into<String>, method: ReportMethod, records_processed: u64) -> Self {
        Self {
            summary: summary.into(),
            method,
            records_processed,
            details: Map::new(),
        }
    }

    /// Build a report from a map written by a sandboxed program.
    ///
    /// `summary` is taken when it is a string, otherwise the whole map is
    /// serialized; `records_processed` defaults to 0. The map is kept as
    /// `details`.
    pub fn from_program_map(map: Map<String, Value>) -> Self {
        let summary = match map.get("summary") {
            Some(Value::String(s)) => s.clone(),
            _ => Value::Object(map.clone()).to_string(),
        };
        let records_processed = map
            .get("records_processed")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Self {
            summary,
            method: ReportMethod::Delegated,
            records_processed,
            details: map,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persists reports; every call gets a fresh identifier
pub trait ReportSink: Send + Sync {
    fn save_report(&self, report: Report) -> Result<String, ReportError>;
}

fn new_report_id() -> String {
    format!("report_{}", Uuid::new_v4().simple())
}

/// Sink that keeps reports in memory
#[derive(Debug, Default)]
pub struct InMemoryReportSink {
    reports: Mutex<Vec<(String, Report)>>,
}

impl InMemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved reports with their identifiers, in save order
    pub fn saved(&self) -> Vec<(String, Report)> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReportSink for InMemoryReportSink {
    fn save_report(&self, report: Report) -> Result<String, ReportError> {
        let id = new_report_id();
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id.clone(), report));
        Ok(id)
    }
}

/// Sink writing one pretty-printed JSON file per report
#[derive(Debug, Clone)]
pub struct DirectoryReportSink {
    dir: PathBuf,
}

impl DirectoryReportSink {
    /// Create the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ReportError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, report_id: &str) -> PathBuf {
        self.dir.join(format!("{report_id}.json"))
    }
}

impl ReportSink for DirectoryReportSink {
    fn save_report(&self, report: Report) -> Result<String, ReportError> {
        let id = new_report_id();
        let path = self.path_for(&id);
        let body = serde_json::to_string_pretty(&report)?;
        // create_new: never overwrite an existing report
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        std::io::Write::write_all(&mut file, body.as_bytes())?;
        info!(report_id = %id, path = %path.display(), "report saved");
        Ok(id)
    }
}
