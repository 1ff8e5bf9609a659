//! Capability registry - the closed set of operations a program may call

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CapabilityError, SandboxError};

/// Name of the output binding; never usable as a capability name
pub const OUTPUT_BINDING: &str = "result";

/// Highest arity a capability may declare
pub const MAX_CAPABILITY_ARITY: usize = 3;

/// Implementation bound to a capability name
pub type CapabilityFn = Arc<dyn Fn(&[Value]) -> Result<Value, CapabilityError> + Send + Sync>;

/// Kind of value a capability parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Integer,
    Float,
    String,
    Bool,
    Array,
    Map,
    Any,
}

impl ParamKind {
    /// Whether a JSON-converted argument fits this kind
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Float => value.is_number(),
            ParamKind::String => value.is_string(),
            ParamKind::Bool => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Map => value.is_object(),
            ParamKind::Any => true,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Integer => "int",
            ParamKind::Float => "float",
            ParamKind::String => "string",
            ParamKind::Bool => "bool",
            ParamKind::Array => "array",
            ParamKind::Map => "map",
            ParamKind::Any => "any",
        };
        f.write_str(name)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "()",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// A declared capability parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// A named operation with a fixed signature, bound to an implementation
#[derive(Clone)]
pub struct Capability {
    name: String,
    params: Vec<Param>,
    returns: String,
    description: String,
    handler: CapabilityFn,
}

impl Capability {
    /// Create a capability with no parameters; add them with [`Capability::param`]
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, CapabilityError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: "any".to_string(),
            description: String::new(),
            handler: Arc::new(handler),
        }
    }

    /// Builder: append a parameter
    pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
        });
        self
    }

    /// Builder: describe the return shape (shown in prompts)
    pub fn returns(mut self, shape: impl Into<String>) -> Self {
        self.returns = shape.into();
        self
    }

    /// Builder: one-line description (shown in prompts)
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// `name(p: kind, ...) -> shape`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, p.kind))
            .collect();
        format!("{}({}) -> {}", self.name, params.join(", "), self.returns)
    }

    /// Check arity and argument kinds, then run the bound implementation
    pub fn invoke(&self, args: &[Value]) -> Result<Value, CapabilityError> {
        if args.len() != self.params.len() {
            return Err(CapabilityError::InvalidArgument {
                param: self.name.clone(),
                reason: format!(
                    "expected {} argument(s), got {}",
                    self.params.len(),
                    args.len()
                ),
            });
        }
        for (param, arg) in self.params.iter().zip(args) {
            if !param.kind.accepts(arg) {
                return Err(CapabilityError::InvalidArgument {
                    param: param.name.clone(),
                    reason: format!("expected {}, found {}", param.kind, kind_of(arg)),
                });
            }
        }
        (self.handler)(args)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Immutable mapping from capability name to implementation
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<Capability>>,
}

impl CapabilityRegistry {
    /// Build a registry, rejecting duplicate, malformed or reserved names
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Result<Self, SandboxError> {
        let mut map = BTreeMap::new();
        for capability in capabilities {
            let name = capability.name.clone();
            if !is_identifier(&name) || name == OUTPUT_BINDING {
                return Err(SandboxError::InvalidCapabilityName(name));
            }
            if capability.arity() > MAX_CAPABILITY_ARITY {
                return Err(SandboxError::UnsupportedArity {
                    name,
                    arity: capability.arity(),
                    max: MAX_CAPABILITY_ARITY,
                });
            }
            if map.insert(name.clone(), Arc::new(capability)).is_some() {
                return Err(SandboxError::DuplicateCapability(name));
            }
        }
        Ok(Self { capabilities: map })
    }

    pub fn resolve(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name).map(|c| c.as_ref())
    }

    pub(crate) fn shared(&self) -> impl Iterator<Item = &Arc<Capability>> {
        self.capabilities.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Declared names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// One `- signature - description` line per capability
    pub fn describe(&self) -> String {
        self.capabilities
            .values()
            .map(|c| {
                if c.description.is_empty() {
                    format!("- {}", c.signature())
                } else {
                    format!("- {} - {}", c.signature(), c.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
