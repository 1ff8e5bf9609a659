//! Sandboxed executor - runs model-authored Rhai programs against a registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rhai::{AST, Dynamic, Engine, EvalAltResult, Scope};
use tracing::{debug, warn};

use crate::builtins::BuiltinSet;
use crate::registry::{is_identifier, Capability, CapabilityRegistry, OUTPUT_BINDING};
use crate::sandbox::{ExecutionLimits, TIMEOUT_CHECK_INTERVAL};
use crate::types::{CapabilityCall, CapabilityError, ExecutionResult, FailureKind, SandboxError};

/// Keywords that would let a program inspect its own environment
const DISABLED_KEYWORDS: [&str; 5] =
    ["eval", "type_of", "is_def_var", "is_def_fn", "is_shared"];

// ============================================================================
// Per-execution trace
// ============================================================================

/// State shared between registered capability closures during one run
#[derive(Default)]
struct Trace {
    calls: Mutex<Vec<CapabilityCall>>,
    count: AtomicUsize,
    /// Most recent capability failure and the error message raised for it
    last_capability_error: Mutex<Option<(String, CapabilityError)>>,
    call_limit_hit: Mutex<bool>,
}

impl Trace {
    fn record(&self, call: CapabilityCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn record_failure(&self, call: CapabilityCall, message: String, error: CapabilityError) {
        self.record(call);
        *self
            .last_capability_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((message, error));
    }

    /// Reserve one capability call; false once the limit is reached
    fn reserve(&self, max: usize) -> bool {
        let previous = self.count.fetch_add(1, Ordering::SeqCst);
        if previous >= max {
            *self
                .call_limit_hit
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = true;
            return false;
        }
        true
    }

    /// The capability failure that raised `message`, if any.
    ///
    /// A failure caught by the program and followed by an unrelated error
    /// does not match.
    fn capability_error_for(&self, message: &str) -> Option<CapabilityError> {
        self.last_capability_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|(raised, _)| raised == message)
            .map(|(_, error)| error.clone())
    }

    fn call_limit_hit(&self) -> bool {
        *self
            .call_limit_hit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn take_calls(&self) -> Vec<CapabilityCall> {
        std::mem::take(&mut *self.calls.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

// ============================================================================
// SandboxedExecutor
// ============================================================================

/// Executes program text inside a fresh, allow-listed environment.
///
/// The registry is shared read-only; every call to [`SandboxedExecutor::execute`]
/// builds and discards its own engine and scope.
#[derive(Debug, Clone)]
pub struct SandboxedExecutor {
    registry: Arc<CapabilityRegistry>,
    builtins: BuiltinSet,
    limits: ExecutionLimits,
}

impl SandboxedExecutor {
    /// Executor with the standard builtin set and default limits
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self::with_config(registry, BuiltinSet::standard(), ExecutionLimits::default())
    }

    pub fn with_config(
        registry: Arc<CapabilityRegistry>,
        builtins: BuiltinSet,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            registry,
            builtins,
            limits,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn builtins(&self) -> &BuiltinSet {
        &self.builtins
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Run `program` and return exactly one outcome.
    ///
    /// Only empty program text is an `Err`; parse errors, unknown names,
    /// capability failures and limit violations come back as
    /// [`ExecutionOutcome::Failure`](crate::types::ExecutionOutcome::Failure).
    pub fn execute(&self, program: &str) -> Result<ExecutionResult, SandboxError> {
        if program.trim().is_empty() {
            return Err(SandboxError::EmptyProgram);
        }

        let start_time = Instant::now();
        let trace = Arc::new(Trace::default());
        let engine = self.build_engine(&trace, start_time);

        debug!(
            program_len = program.len(),
            capabilities = self.registry.len(),
            "executing program"
        );

        let ast = match engine.compile(program) {
            Ok(ast) => ast,
            Err(e) => {
                let elapsed = elapsed_ms(start_time);
                warn!(error = %e, "program failed to parse");
                return Ok(ExecutionResult::failure(
                    FailureKind::Syntax,
                    e.to_string(),
                    Vec::new(),
                    elapsed,
                ));
            }
        };

        let mut scope = Scope::new();
        scope.push_dynamic(OUTPUT_BINDING, Dynamic::UNIT);

        let run = engine.run_ast_with_scope(&mut scope, &ast);
        let execution_time_ms = elapsed_ms(start_time);
        let calls = trace.take_calls();

        if let Err(e) = run {
            let kind = self.classify(&e, &trace, &engine, &ast);
            let message = self.describe_failure(&e, kind);
            warn!(%kind, error = %message, "program execution failed");
            return Ok(ExecutionResult::failure(kind, message, calls, execution_time_ms));
        }

        // A capability call may outlast the progress hook's last check
        if execution_time_ms > self.limits.timeout_ms {
            return Ok(ExecutionResult::failure(
                FailureKind::LimitExceeded,
                format!("execution timed out after {}ms", self.limits.timeout_ms),
                calls,
                execution_time_ms,
            ));
        }

        let output = scope
            .get_value::<Dynamic>(OUTPUT_BINDING)
            .unwrap_or(Dynamic::UNIT);

        debug!(
            execution_time_ms,
            capability_calls = calls.len(),
            has_result = !output.is_unit(),
            "program finished"
        );

        if output.is_unit() {
            Ok(ExecutionResult::no_result(calls, execution_time_ms))
        } else {
            Ok(ExecutionResult::value(
                dynamic_to_json(&output),
                calls,
                execution_time_ms,
            ))
        }
    }

    /// Create the raw engine for one run: limits, allow-listed builtins and
    /// one native function per capability.
    fn build_engine(&self, trace: &Arc<Trace>, start_time: Instant) -> Engine {
        let mut engine = Engine::new_raw();

        self.limits.apply(&mut engine);
        for keyword in DISABLED_KEYWORDS {
            engine.disable_symbol(keyword);
        }

        let timeout = Duration::from_millis(self.limits.timeout_ms);
        engine.on_progress(move |ops| {
            if ops % TIMEOUT_CHECK_INTERVAL == 0 && start_time.elapsed() > timeout {
                Some(Dynamic::from(format!(
                    "execution timed out after {}ms",
                    timeout.as_millis()
                )))
            } else {
                None
            }
        });

        self.builtins.install(&mut engine);

        for capability in self.registry.shared() {
            register_capability(
                &mut engine,
                Arc::clone(capability),
                Arc::clone(trace),
                self.limits.max_capability_calls,
            );
        }

        engine
    }

    fn classify(
        &self,
        error: &EvalAltResult,
        trace: &Trace,
        engine: &Engine,
        ast: &AST,
    ) -> FailureKind {
        match error {
            EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => {
                self.classify(inner, trace, engine, ast)
            }
            EvalAltResult::ErrorParsing(..) => FailureKind::Syntax,
            EvalAltResult::ErrorVariableNotFound(..) => FailureKind::NameResolution,
            EvalAltResult::ErrorFunctionNotFound(signature, _) => {
                let name = function_name(signature);
                // Operators and known functions fail on argument types or arity
                if !is_identifier(name) || self.is_defined(name, engine, ast) {
                    FailureKind::Runtime
                } else {
                    FailureKind::NameResolution
                }
            }
            EvalAltResult::ErrorTooManyOperations(..)
            | EvalAltResult::ErrorTerminated(..)
            | EvalAltResult::ErrorDataTooLarge(..)
            | EvalAltResult::ErrorStackOverflow(..) => FailureKind::LimitExceeded,
            EvalAltResult::ErrorRuntime(..) if trace.call_limit_hit() => FailureKind::LimitExceeded,
            EvalAltResult::ErrorRuntime(value, _) => {
                match trace.capability_error_for(&value.to_string()) {
                    Some(CapabilityError::Backend(_)) => FailureKind::Capability,
                    _ => FailureKind::Runtime,
                }
            }
            _ => FailureKind::Runtime,
        }
    }

    /// Whether `name` is bound under any signature: a capability, a builtin
    /// or a function defined by the program itself
    fn is_defined(&self, name: &str, engine: &Engine, ast: &AST) -> bool {
        self.registry.contains(name)
            || ast.iter_functions().any(|f| f.name == name)
            || engine
                .gen_fn_signatures(true)
                .iter()
                .any(|signature| function_name(signature) == name)
    }

    fn describe_failure(&self, error: &EvalAltResult, kind: FailureKind) -> String {
        match (kind, error) {
            (FailureKind::LimitExceeded, EvalAltResult::ErrorTooManyOperations(_)) => format!(
                "exceeded maximum operations ({})",
                self.limits.max_operations
            ),
            (FailureKind::LimitExceeded, EvalAltResult::ErrorTerminated(reason, _)) => {
                reason.to_string()
            }
            _ => error.to_string(),
        }
    }
}

/// `"fetch_records (i64, string)"` -> `"fetch_records"`
fn function_name(signature: &str) -> &str {
    signature
        .split(|c: char| c == ' ' || c == '(')
        .next()
        .unwrap_or(signature)
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Register a capability as a native function of its declared arity.
///
/// Arguments arrive as `Dynamic`, so kind checking happens in
/// [`Capability::invoke`] and produces a descriptive message.
fn register_capability(
    engine: &mut Engine,
    capability: Arc<Capability>,
    trace: Arc<Trace>,
    max_calls: usize,
) {
    let name = capability.name().to_string();
    let arity = capability.arity();
    let call = move |args: Vec<Dynamic>| -> Result<Dynamic, Box<EvalAltResult>> {
        invoke_capability(&capability, &trace, max_calls, args)
    };

    match arity {
        0 => {
            engine.register_fn(name.as_str(), move || call(Vec::new()));
        }
        1 => {
            engine.register_fn(name.as_str(), move |a: Dynamic| call(vec![a]));
        }
        2 => {
            engine.register_fn(name.as_str(), move |a: Dynamic, b: Dynamic| {
                call(vec![a, b])
            });
        }
        _ => {
            engine.register_fn(
                name.as_str(),
                move |a: Dynamic, b: Dynamic, c: Dynamic| call(vec![a, b, c]),
            );
        }
    }
}

fn invoke_capability(
    capability: &Capability,
    trace: &Trace,
    max_calls: usize,
    args: Vec<Dynamic>,
) -> Result<Dynamic, Box<EvalAltResult>> {
    if !trace.reserve(max_calls) {
        return Err(format!("maximum capability calls ({max_calls}) exceeded").into());
    }

    let call_start = Instant::now();
    let json_args: Vec<serde_json::Value> = args.iter().map(dynamic_to_json).collect();
    let outcome = capability.invoke(&json_args);
    let duration_us = call_start.elapsed().as_micros() as u64;

    match outcome {
        Ok(value) => {
            trace.record(CapabilityCall::new(
                capability.name().to_string(),
                json_args,
                None,
                duration_us,
            ));
            rhai::serde::to_dynamic(&value)
        }
        Err(e) => {
            let message = format!("capability `{}` failed: {e}", capability.name());
            debug!(capability = capability.name(), error = %e, "capability call failed");
            trace.record_failure(
                CapabilityCall::new(
                    capability.name().to_string(),
                    json_args,
                    Some(e.to_string()),
                    duration_us,
                ),
                message.clone(),
                e,
            );
            Err(message.into())
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Convert Rhai Dynamic to serde_json::Value
pub fn dynamic_to_json(value: &Dynamic) -> serde_json::Value {
    if value.is_string() {
        serde_json::Value::String(value.clone().into_string().unwrap_or_default())
    } else if value.is_int() {
        serde_json::Value::from(value.as_int().unwrap_or(0))
    } else if value.is_float() {
        serde_json::json!(value.as_float().unwrap_or(0.0))
    } else if value.is_bool() {
        serde_json::Value::Bool(value.as_bool().unwrap_or(false))
    } else if value.is_char() {
        serde_json::Value::String(value.as_char().map(String::from).unwrap_or_default())
    } else if value.is_array() {
        let arr: rhai::Array = value.clone().into_array().unwrap_or_default();
        serde_json::Value::Array(arr.iter().map(dynamic_to_json).collect())
    } else if value.is_map() {
        let map: rhai::Map = value.clone().try_cast().unwrap_or_default();
        let json_map = map
            .iter()
            .map(|(k, v)| (k.to_string(), dynamic_to_json(v)))
            .collect();
        serde_json::Value::Object(json_map)
    } else if value.is_unit() {
        serde_json::Value::Null
    } else {
        serde_json::Value::String(value.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
