//! Property values and the expression interface for computed properties.
//!
//! A unit property is either a literal [`Value`] or a computed expression.
//! Expressions come from the configuration layer already resolved into a
//! callable form; the engine only ever talks to them through two steps:
//!
//! 1. [`Expression::compile`] against a [`Scope`] (the unit's own name and
//!    the names of its siblings). This happens once per unit and property.
//! 2. [`Evaluator::evaluate`] against an [`Environment`] that carries the
//!    current unit, the sibling unit set, the timestamp and any extra
//!    arguments (for example a month index). This happens on every read.
//!
//! Plain closures can be used as expressions through [`from_fn`].

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CalendarError, Result};
use crate::unit::{CalendarUnit, UnitSet};

/// A resolved property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(Decimal),
    Text(String),
    Names(Vec<String>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Names(_) => "names",
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_names(&self) -> Option<&[String]> {
        match self {
            Value::Names(names) => Some(names),
            _ => None,
        }
    }

    /// Short rendering used in type-mismatch messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Value::Number(n) => format!("number {n}"),
            Value::Text(s) => format!("text {s:?}"),
            Value::Names(names) => format!("names [{} items]", names.len()),
        }
    }
}

impl From<Decimal> for Value {
    fn from(n: Decimal) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Decimal::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<String>> for Value {
    fn from(names: Vec<String>) -> Self {
        Value::Names(names)
    }
}

// ── Expressions ─────────────────────────────────────────────────────────────

/// Names visible to an expression when it is compiled.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    /// The unit that owns the property being compiled.
    pub unit: &'a str,
    /// Every unit in the same unit set, including `unit` itself.
    pub siblings: Vec<&'a str>,
}

/// Everything a compiled expression can read while evaluating.
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    pub unit: &'a CalendarUnit,
    pub units: &'a UnitSet,
    pub timestamp: Decimal,
    pub args: &'a [Value],
}

impl<'a> Environment<'a> {
    /// Look up a sibling unit by name.
    pub fn sibling(&self, name: &str) -> Result<&'a CalendarUnit> {
        self.units.get(name)
    }

    pub fn arg(&self, index: usize) -> Option<&'a Value> {
        self.args.get(index)
    }

    /// A numeric extra argument, failing loudly when it is missing or not a number.
    pub fn number_arg(&self, index: usize) -> Result<Decimal> {
        match self.args.get(index) {
            Some(Value::Number(n)) => Ok(*n),
            Some(other) => Err(CalendarError::Expression(format!(
                "argument {index} of {} must be a number, got {}",
                self.unit.name(),
                other.describe()
            ))),
            None => Err(CalendarError::Expression(format!(
                "argument {index} missing for {}",
                self.unit.name()
            ))),
        }
    }
}

/// A compiled, callable expression.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, env: &Environment<'_>) -> Result<Value>;
}

impl<F> Evaluator for F
where
    F: Fn(&Environment<'_>) -> Result<Value> + Send + Sync,
{
    fn evaluate(&self, env: &Environment<'_>) -> Result<Value> {
        self(env)
    }
}

/// An expression handle produced by the configuration layer.
pub trait Expression: Send + Sync {
    fn compile(&self, scope: &Scope<'_>) -> Result<Arc<dyn Evaluator>>;
}

/// Shared handle to an expression.
pub type ExpressionHandle = Arc<dyn Expression>;

struct FnExpression<F>(Arc<F>);

impl<F> Expression for FnExpression<F>
where
    F: Fn(&Environment<'_>) -> Result<Value> + Send + Sync + 'static,
{
    fn compile(&self, _scope: &Scope<'_>) -> Result<Arc<dyn Evaluator>> {
        let evaluator: Arc<dyn Evaluator> = self.0.clone();
        Ok(evaluator)
    }
}

/// Wrap a closure as an expression handle. The closure needs no compile step.
pub fn from_fn<F>(f: F) -> ExpressionHandle
where
    F: Fn(&Environment<'_>) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(FnExpression(Arc::new(f)))
}

// ── PropertyValue ───────────────────────────────────────────────────────────

/// A unit property: either a literal or a computed expression.
#[derive(Clone)]
pub enum PropertyValue {
    Literal(Value),
    Computed(ExpressionHandle),
}

impl PropertyValue {
    pub fn number(n: impl Into<Decimal>) -> Self {
        PropertyValue::Literal(Value::Number(n.into()))
    }

    pub fn names<S: AsRef<str>>(names: &[S]) -> Self {
        PropertyValue::Literal(Value::Names(
            names.iter().map(|s| s.as_ref().to_string()).collect(),
        ))
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&Environment<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        PropertyValue::Computed(from_fn(f))
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, PropertyValue::Computed(_))
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            PropertyValue::Computed(_) => f.write_str("Computed(<expression>)"),
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(v: Value) -> Self {
        PropertyValue::Literal(v)
    }
}
