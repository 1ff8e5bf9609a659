//! Delegated Analysis - sandboxed execution of model-authored programs
//!
//! Compares two ways of having a language model analyze a large set of
//! support tickets:
//!
//! - **Direct context** - ticket data goes into the prompt. Cost grows with
//!   the number of records.
//! - **Delegated execution** - the model writes a short Rhai program that
//!   runs locally against a fixed set of capabilities. The model never sees
//!   per-record data.
//!
//! The core is [`SandboxedExecutor`]: each run gets a fresh raw Rhai engine
//! with only the allow-listed [`BuiltinSet`] and the functions of a
//! [`CapabilityRegistry`]. The program reports back by assigning `result`;
//! every failure comes back as data in an [`ExecutionResult`].
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use delegated_analysis::{
//!     ticket_registry, InMemoryRecordStore, InMemoryReportSink, SandboxedExecutor,
//! };
//!
//! let registry = ticket_registry(
//!     Arc::new(InMemoryRecordStore::seeded(50_000, 42)),
//!     Arc::new(InMemoryReportSink::new()),
//! )?;
//! let executor = SandboxedExecutor::new(Arc::new(registry));
//!
//! let result = executor.execute("result = len(fetch_records(1));")?;
//! assert_eq!(result.render(), "50000");
//! ```
//!
//! Isolation is best-effort: the environment is an allow-list, `eval` and
//! the reflection keywords are disabled and no I/O packages are loaded, but
//! this is not a security boundary against a hostile program author.

pub mod builtins;
pub mod capabilities;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod llm;
pub mod orchestration;
pub mod registry;
pub mod sandbox;
pub mod types;

pub use builtins::{Builtin, BuiltinSet};
pub use capabilities::ticket_registry;
pub use collaborators::{
    DirectoryReportSink, InMemoryRecordStore, InMemoryReportSink, Record, RecordStore, Report,
    ReportMethod, ReportSink,
};
pub use config::BenchConfig;
pub use engine::{dynamic_to_json, SandboxedExecutor};
pub use registry::{Capability, CapabilityFn, CapabilityRegistry, ParamKind, OUTPUT_BINDING};
pub use sandbox::{
    ExecutionLimits,
    // Default limit constants
    DEFAULT_MAX_ARRAY_SIZE, DEFAULT_MAX_CAPABILITY_CALLS, DEFAULT_MAX_MAP_SIZE,
    DEFAULT_MAX_OPERATIONS, DEFAULT_MAX_STRING_SIZE, DEFAULT_TIMEOUT_MS,
    // Profile constants
    EXTENDED_MAX_CAPABILITY_CALLS, EXTENDED_MAX_OPERATIONS, EXTENDED_TIMEOUT_MS,
    QUICK_MAX_CAPABILITY_CALLS, QUICK_MAX_OPERATIONS, QUICK_TIMEOUT_MS,
};
pub use types::{
    CapabilityCall, CapabilityError, ExecutionOutcome, ExecutionResult, FailureKind,
    SandboxError, FAILURE_PREFIX, NO_RESULT_MARKER,
};
