//! Allow-listed basic operations available to sandboxed programs
//!
//! The interpreter starts from a raw engine with no packages loaded. Each
//! [`Builtin`] group in a [`BuiltinSet`] adds a fixed set of functions; no
//! group exposes file I/O, process control, networking, time, dynamic
//! evaluation or reflection.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use rhai::packages::{
    ArithmeticPackage, BasicArrayPackage, BasicIteratorPackage, BasicMapPackage,
    BasicMathPackage, BasicStringPackage, LogicPackage, MoreStringPackage, Package,
};
use rhai::{Array, Dynamic, Engine, EvalAltResult, FLOAT, INT, Map};
use serde::{Deserialize, Serialize};

type FnResult = Result<Dynamic, Box<EvalAltResult>>;

/// A group of basic operations that can be allow-listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    /// `abs`, `sign`, integer/float arithmetic helpers
    Arithmetic,
    /// Comparisons across numeric types, `min(a, b)`, `max(a, b)`
    Logic,
    /// `range(a, b)` and iteration over ranges
    Iteration,
    /// String methods: `len`, `contains`, `split`, `to_upper`, interpolation
    Strings,
    /// Array methods: `len`, `push`, `sort`, `map`, `filter`, `reduce`, `for` loops
    Arrays,
    /// Map methods: `keys`, `values`, `len`, `contains`
    Maps,
    /// `floor`, `ceiling`, `round`, `sqrt`, parsing
    Math,
    /// `sum`, `min`, `max`, `sorted`, `any`, `all`, `enumerate`, `zip`, `tally` over arrays
    Aggregates,
    /// `str`, `int`, `float`
    Conversions,
    /// `print` and `debug`, routed to the log
    Print,
}

impl Builtin {
    pub const ALL: [Builtin; 10] = [
        Builtin::Arithmetic,
        Builtin::Logic,
        Builtin::Iteration,
        Builtin::Strings,
        Builtin::Arrays,
        Builtin::Maps,
        Builtin::Math,
        Builtin::Aggregates,
        Builtin::Conversions,
        Builtin::Print,
    ];
}

/// The allow-list of basic operation groups installed into each environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuiltinSet {
    enabled: BTreeSet<Builtin>,
}

impl Default for BuiltinSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl BuiltinSet {
    /// Every builtin group
    pub fn standard() -> Self {
        Self {
            enabled: Builtin::ALL.into_iter().collect(),
        }
    }

    /// No builtins at all; only language syntax and capabilities remain
    pub fn none() -> Self {
        Self {
            enabled: BTreeSet::new(),
        }
    }

    pub fn with(mut self, builtin: Builtin) -> Self {
        self.enabled.insert(builtin);
        self
    }

    pub fn without(mut self, builtin: Builtin) -> Self {
        self.enabled.remove(&builtin);
        self
    }

    pub fn contains(&self, builtin: Builtin) -> bool {
        self.enabled.contains(&builtin)
    }

    pub fn iter(&self) -> impl Iterator<Item = Builtin> + '_ {
        self.enabled.iter().copied()
    }

    /// Install the enabled groups into a raw engine
    pub(crate) fn install(&self, engine: &mut Engine) {
        for builtin in self.iter() {
            match builtin {
                Builtin::Arithmetic => {
                    engine.register_global_module(ArithmeticPackage::new().as_shared_module());
                }
                Builtin::Logic => {
                    engine.register_global_module(LogicPackage::new().as_shared_module());
                }
                Builtin::Iteration => {
                    engine.register_global_module(BasicIteratorPackage::new().as_shared_module());
                }
                Builtin::Strings => {
                    engine.register_global_module(BasicStringPackage::new().as_shared_module());
                    engine.register_global_module(MoreStringPackage::new().as_shared_module());
                }
                Builtin::Arrays => {
                    engine.register_global_module(BasicArrayPackage::new().as_shared_module());
                }
                Builtin::Maps => {
                    engine.register_global_module(BasicMapPackage::new().as_shared_module());
                }
                Builtin::Math => {
                    engine.register_global_module(BasicMathPackage::new().as_shared_module());
                }
                Builtin::Aggregates => register_aggregates(engine),
                Builtin::Conversions => register_conversions(engine),
                Builtin::Print => {
                    engine.on_print(|text| tracing::info!(target: "sandbox", "{text}"));
                    engine.on_debug(|text, _source, pos| {
                        tracing::debug!(target: "sandbox", "{pos:?} {text}")
                    });
                }
            }
        }

        if !self.contains(Builtin::Print) {
            engine.on_print(|_| {});
            engine.on_debug(|_, _, _| {});
        }
    }
}

fn register_aggregates(engine: &mut Engine) {
    engine.register_fn("sum", |values: Array| -> FnResult { sum(&values) });
    engine.register_fn("max", |values: Array| -> FnResult {
        extreme(&values, "max", Ordering::Greater)
    });
    engine.register_fn("min", |values: Array| -> FnResult {
        extreme(&values, "min", Ordering::Less)
    });
    engine.register_fn("sorted", |values: Array| -> FnResult { sorted(values) });
    engine.register_fn("any", |values: Array| -> FnResult {
        let flags = truth_values(&values, "any")?;
        Ok(Dynamic::from(flags.into_iter().any(|b| b)))
    });
    engine.register_fn("all", |values: Array| -> FnResult {
        let flags = truth_values(&values, "all")?;
        Ok(Dynamic::from(flags.into_iter().all(|b| b)))
    });
    engine.register_fn("enumerate", |values: Array| -> Array {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| Dynamic::from_array(vec![Dynamic::from(i as INT), v]))
            .collect()
    });
    engine.register_fn("zip", |left: Array, right: Array| -> Array {
        left.into_iter()
            .zip(right)
            .map(|(a, b)| Dynamic::from_array(vec![a, b]))
            .collect()
    });
    engine.register_fn("tally", |values: Array| -> Map { tally(&values) });
}

fn register_conversions(engine: &mut Engine) {
    engine.register_fn("str", |value: Dynamic| -> String { value.to_string() });
    engine.register_fn("int", |value: Dynamic| -> FnResult { to_int(&value) });
    engine.register_fn("float", |value: Dynamic| -> FnResult { to_float(&value) });
}

fn as_number(value: &Dynamic) -> Option<FLOAT> {
    if let Ok(i) = value.as_int() {
        Some(i as FLOAT)
    } else {
        value.as_float().ok()
    }
}

fn compare(a: &Dynamic, b: &Dynamic) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    if a.is_string() && b.is_string() {
        let x = a.clone().into_string().ok()?;
        let y = b.clone().into_string().ok()?;
        return Some(x.cmp(&y));
    }
    None
}

fn sum(values: &Array) -> FnResult {
    let mut int_total: INT = 0;
    let mut float_total: Option<FLOAT> = None;

    for value in values {
        if let Ok(i) = value.as_int() {
            match float_total.as_mut() {
                Some(f) => *f += i as FLOAT,
                None => {
                    int_total = int_total
                        .checked_add(i)
                        .ok_or_else(|| Box::<EvalAltResult>::from("sum: integer overflow"))?;
                }
            }
        } else if let Ok(f) = value.as_float() {
            let current = float_total.get_or_insert(int_total as FLOAT);
            *current += f;
        } else {
            return Err(format!("sum: cannot add value of type {}", value.type_name()).into());
        }
    }

    Ok(match float_total {
        Some(f) => Dynamic::from(f),
        None => Dynamic::from(int_total),
    })
}

fn extreme(values: &Array, name: &str, wanted: Ordering) -> FnResult {
    let mut best: Option<&Dynamic> = None;
    for value in values {
        best = match best {
            None => Some(value),
            Some(current) => match compare(value, current) {
                Some(ord) if ord == wanted => Some(value),
                Some(_) => Some(current),
                None => {
                    return Err(format!(
                        "{name}: cannot compare {} with {}",
                        value.type_name(),
                        current.type_name()
                    )
                    .into());
                }
            },
        };
    }
    best.cloned()
        .ok_or_else(|| format!("{name}: argument is an empty array").into())
}

fn sorted(mut values: Array) -> FnResult {
    let mut incomparable = false;
    values.sort_by(|a, b| {
        compare(a, b).unwrap_or_else(|| {
            incomparable = true;
            Ordering::Equal
        })
    });
    if incomparable {
        return Err("sorted: values are not mutually comparable".into());
    }
    Ok(Dynamic::from_array(values))
}

fn truth_values(values: &Array, name: &str) -> Result<Vec<bool>, Box<EvalAltResult>> {
    values
        .iter()
        .map(|v| {
            v.as_bool()
                .map_err(|_| format!("{name}: expected bool, found {}", v.type_name()).into())
        })
        .collect()
}

fn tally(values: &Array) -> Map {
    let mut counts: BTreeMap<String, INT> = BTreeMap::new();
    for value in values {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(k, n)| (k.into(), Dynamic::from(n)))
        .collect()
}

fn to_int(value: &Dynamic) -> FnResult {
    if let Ok(i) = value.as_int() {
        return Ok(Dynamic::from(i));
    }
    if let Ok(f) = value.as_float() {
        return Ok(Dynamic::from(f.trunc() as INT));
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Dynamic::from(INT::from(b)));
    }
    if value.is_string() {
        let text = value.to_string();
        return text
            .trim()
            .parse::<INT>()
            .map(Dynamic::from)
            .map_err(|_| format!("int: invalid literal `{text}`").into());
    }
    Err(format!("int: cannot convert {}", value.type_name()).into())
}

fn to_float(value: &Dynamic) -> FnResult {
    if let Some(f) = as_number(value) {
        return Ok(Dynamic::from(f));
    }
    if value.is_string() {
        let text = value.to_string();
        return text
            .trim()
            .parse::<FLOAT>()
            .map(Dynamic::from)
            .map_err(|_| format!("float: invalid literal `{text}`").into());
    }
    Err(format!("float: cannot convert {}", value.type_name()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(set: &BuiltinSet) -> Engine {
        let mut engine = Engine::new_raw();
        set.install(&mut engine);
        engine
    }

    #[test]
    fn test_standard_contains_every_group() {
        let set = BuiltinSet::standard();
        for builtin in Builtin::ALL {
            assert!(set.contains(builtin));
        }
    }

    #[test]
    fn test_with_and_without() {
        let set = BuiltinSet::none().with(Builtin::Arrays);
        assert!(set.contains(Builtin::Arrays));
        assert!(!set.contains(Builtin::Maps));

        let set = BuiltinSet::standard().without(Builtin::Print);
        assert!(!set.contains(Builtin::Print));
    }

    #[test]
    fn test_serde_as_list() {
        let set = BuiltinSet::none().with(Builtin::Arrays).with(Builtin::Aggregates);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["arrays","aggregates"]"#);
        let back: BuiltinSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_sum_ints_and_floats() {
        let engine = engine_with(&BuiltinSet::standard());
        assert_eq!(engine.eval::<INT>("sum([1, 2, 3])").unwrap(), 6);
        assert_eq!(engine.eval::<FLOAT>("sum([1, 2.5])").unwrap(), 3.5);
        assert!(engine.eval::<Dynamic>(r#"sum([1, "x"])"#).is_err());
    }

    #[test]
    fn test_min_max_over_arrays() {
        let engine = engine_with(&BuiltinSet::standard());
        assert_eq!(engine.eval::<INT>("max([3, 9, 4])").unwrap(), 9);
        assert_eq!(engine.eval::<INT>("min([3, 9, 4])").unwrap(), 3);
        assert!(engine.eval::<Dynamic>("max([])").is_err());
    }

    #[test]
    fn test_sorted_does_not_mutate_input() {
        let engine = engine_with(&BuiltinSet::standard());
        let out = engine
            .eval::<String>(r#"let a = ["b", "c", "a"]; let s = sorted(a); `${a[0]}${s[0]}`"#)
            .unwrap();
        assert_eq!(out, "ba");
    }

    #[test]
    fn test_tally_counts_values() {
        let engine = engine_with(&BuiltinSet::standard());
        let counts = engine
            .eval::<Map>(r#"tally(["neutral", "negative", "neutral"])"#)
            .unwrap();
        assert_eq!(counts["neutral"].as_int().unwrap(), 2);
        assert_eq!(counts["negative"].as_int().unwrap(), 1);
    }

    #[test]
    fn test_conversions() {
        let engine = engine_with(&BuiltinSet::standard());
        assert_eq!(engine.eval::<INT>(r#"int("42")"#).unwrap(), 42);
        assert_eq!(engine.eval::<INT>("int(3.9)").unwrap(), 3);
        assert_eq!(engine.eval::<FLOAT>("float(2)").unwrap(), 2.0);
        assert_eq!(engine.eval::<String>("str(7)").unwrap(), "7");
    }

    #[test]
    fn test_disabled_group_is_unreachable() {
        let engine = engine_with(&BuiltinSet::standard().without(Builtin::Aggregates));
        let err = engine.eval::<Dynamic>("sum([1, 2])").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
