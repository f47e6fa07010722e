// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Runtime values and the base data mapping.
//!
//! [`Value`] is what compiled directives compute with. Its operators follow
//! the familiar dynamic-language rules (numeric coercion between `bool`,
//! `int` and `float`, string and sequence concatenation, negative indices)
//! so templates written against JSON-shaped data behave predictably.
//!
//! [`Context`] is the base data mapping a template executes against. It is
//! usually built from any `serde::Serialize` value:
//!
//! ```rust,ignore
//! let context = Context::from_serialize(&serde_json::json!({ "hosts": ["a", "b"] }))?;
//! ```

use crate::error::{EvalError, PlatenError, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A dynamically typed template value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    None,
    /// A boolean.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A string.
    Str(String),
    /// A mutable-style sequence (`[1, 2]`).
    List(Vec<Value>),
    /// A fixed sequence (`(1, 2)`).
    Tuple(Vec<Value>),
    /// A string-keyed mapping, iterated in key order.
    Dict(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
        }
    }

    /// Truthiness: `None`, `false`, zero and empty collections are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Dict(map) => !map.is_empty(),
        }
    }

    /// Quoted representation used for elements nested inside collections.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote(s),
            other => other.to_string(),
        }
    }

    /// Produces the values a `for` loop iterates over.
    ///
    /// Lists and tuples yield their elements, dicts their keys and strings
    /// their characters.
    pub fn iterate(&self) -> std::result::Result<Vec<Value>, EvalError> {
        match self {
            Value::List(items) | Value::Tuple(items) => Ok(items.clone()),
            Value::Dict(map) => Ok(map.keys().map(|k| Value::Str(k.clone())).collect()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(EvalError::NotIterable(other.type_name())),
        }
    }

    /// The `+` operator.
    pub fn add(&self, rhs: &Value) -> std::result::Result<Value, EvalError> {
        match (self, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => Ok(Value::List(concat(a, b))),
            (Value::Tuple(a), Value::Tuple(b)) => Ok(Value::Tuple(concat(a, b))),
            _ => match (self.as_number(), rhs.as_number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => a
                    .checked_add(b)
                    .map(Value::Int)
                    .ok_or_else(|| EvalError::Overflow("+".to_string())),
                (Some(a), Some(b)) => Ok(Value::Float(a.as_f64() + b.as_f64())),
                _ => Err(mismatch("+", self, rhs)),
            },
        }
    }

    /// The subscript operator `value[index]`.
    pub fn subscript(&self, index: &Value) -> std::result::Result<Value, EvalError> {
        match (self, index) {
            (Value::Dict(map), Value::Str(key)) => map
                .get(key)
                .cloned()
                .ok_or_else(|| EvalError::KeyNotFound(key.clone())),
            (Value::List(items) | Value::Tuple(items), idx) => {
                let position = sequence_index(idx, items.len(), self, index)?;
                Ok(items[position].clone())
            }
            (Value::Str(s), idx) => {
                let chars: Vec<char> = s.chars().collect();
                let position = sequence_index(idx, chars.len(), self, index)?;
                Ok(Value::Str(chars[position].to_string()))
            }
            _ => Err(EvalError::NotSubscriptable {
                container: self.type_name(),
                index: index.type_name(),
            }),
        }
    }

    /// Equality with numeric coercion (`1 == 1.0 == True`).
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.loose_eq(w)))
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
                (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                _ => false,
            },
        }
    }

    /// Ordering for `< <= > >=`.
    ///
    /// Returns `Ok(None)` for unordered floats (NaN).
    pub fn compare(&self, other: &Value, op: &str) -> std::result::Result<Option<Ordering>, EvalError> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !x.loose_eq(y) {
                        return x.compare(y, op);
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(Some(a.cmp(&b))),
                (Some(a), Some(b)) => Ok(a.as_f64().partial_cmp(&b.as_f64())),
                _ => Err(mismatch(op, self, other)),
            },
        }
    }

    /// Membership test for `in` / `not in`; `self` is the container.
    pub fn contains(&self, needle: &Value) -> std::result::Result<bool, EvalError> {
        match (self, needle) {
            (Value::List(items) | Value::Tuple(items), _) => {
                Ok(items.iter().any(|item| item.loose_eq(needle)))
            }
            (Value::Dict(map), Value::Str(key)) => Ok(map.contains_key(key)),
            (Value::Dict(_), _) => Ok(false),
            (Value::Str(haystack), Value::Str(part)) => Ok(haystack.contains(part.as_str())),
            _ => Err(mismatch("in", needle, self)),
        }
    }

    /// Identity test for `is` / `is not`.
    ///
    /// Values have no identity of their own, so `is` holds for two values
    /// of the same type that are equal.
    pub fn same_as(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self.loose_eq(other)
    }

    /// Unary `-`.
    pub fn negate(&self) -> std::result::Result<Value, EvalError> {
        match self.as_number() {
            Some(Number::Int(i)) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| EvalError::Overflow("unary -".to_string())),
            Some(Number::Float(f)) => Ok(Value::Float(-f)),
            None => Err(bad_operand("-", self)),
        }
    }

    /// Unary `+`.
    pub fn positive(&self) -> std::result::Result<Value, EvalError> {
        match self.as_number() {
            Some(Number::Int(i)) => Ok(Value::Int(i)),
            Some(Number::Float(f)) => Ok(Value::Float(f)),
            None => Err(bad_operand("+", self)),
        }
    }

    /// Unary `~`.
    pub fn invert(&self) -> std::result::Result<Value, EvalError> {
        match self.as_number() {
            Some(Number::Int(i)) => Ok(Value::Int(!i)),
            _ => Err(bad_operand("~", self)),
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

fn concat(a: &[Value], b: &[Value]) -> Vec<Value> {
    a.iter().chain(b).cloned().collect()
}

fn mismatch(op: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op: op.to_string(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn bad_operand(op: &str, operand: &Value) -> EvalError {
    EvalError::BadOperand {
        op: op.to_string(),
        operand: operand.type_name(),
    }
}

fn sequence_index(
    index: &Value,
    len: usize,
    container: &Value,
    raw: &Value,
) -> std::result::Result<usize, EvalError> {
    let i = match index {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        _ => {
            return Err(EvalError::NotSubscriptable {
                container: container.type_name(),
                index: raw.type_name(),
            })
        }
    };
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::IndexOutOfRange(format!(
            "{} index {} out of range (length {})",
            container.type_name(),
            i,
            len
        )));
    }
    Ok(resolved as usize)
}

fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else {
        // Shortest round-trip digits, switching to exponent form outside
        // 1e-4 <= |f| < 1e16.
        let scientific = format!("{:e}", f);
        let (mantissa, exponent) = scientific
            .split_once('e')
            .unwrap_or((scientific.as_str(), "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        if f != 0.0 && !(-4..16).contains(&exponent) {
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        } else {
            let text = f.to_string();
            if text.contains('.') {
                text
            } else {
                format!("{}.0", text)
            }
        }
    }
}

/// Text form written by interpolation directives.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0].repr()),
            Value::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                write!(f, "({})", parts.join(", "))
            }
            Value::Dict(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Dict(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// The base data mapping a template executes against.
///
/// Assignments made by `[[exec]]` outside any loop land here, so a context
/// handed to several executions accumulates them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from any serializable map-shaped value.
    ///
    /// # Errors
    ///
    /// Returns [`PlatenError::InvalidContext`] when the value does not
    /// serialize to a JSON object.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        Self::from_json(serde_json::to_value(data)?)
    }

    /// Builds a context from a JSON object.
    pub fn from_json(data: serde_json::Value) -> Result<Self> {
        match data {
            serde_json::Value::Object(map) => Ok(Self {
                values: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
            other => Err(PlatenError::InvalidContext(format!(
                "expected a map of names to values, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Binds `name` to `value`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Looks up a name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns true if `name` is bound.
    pub fn contains_key(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterates over the bound names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Merges `other` into this context; its bindings win.
    pub fn extend(&mut self, other: Context) {
        self.values.extend(other.values);
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_matches_interpolation_text() {
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::None.to_string(), "None");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Float(-0.0).to_string(), "-0.0");
        assert_eq!(Value::Float(1e15).to_string(), "1000000000000000.0");
        assert_eq!(Value::Float(0.0001).to_string(), "0.0001");
        assert_eq!(Value::from(vec!["a", "b"]).to_string(), "['a', 'b']");
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(
            Value::Tuple(vec![Value::Int(1), Value::from("it's")]).to_string(),
            "(1, \"it's\")"
        );
    }

    #[test]
    fn test_float_exponent_form() {
        assert_eq!(Value::Float(1e20).to_string(), "1e+20");
        assert_eq!(Value::Float(1e16).to_string(), "1e+16");
        assert_eq!(Value::Float(0.00001).to_string(), "1e-05");
        assert_eq!(Value::Float(-1.5e-7).to_string(), "-1.5e-07");
        assert_eq!(Value::Float(1.2345e100).to_string(), "1.2345e+100");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "inf");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Float(0.1).is_truthy());
    }

    #[test]
    fn test_add_rules() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(Value::Int(1).add(&Value::Float(0.5)).unwrap(), Value::Float(1.5));
        assert_eq!(Value::from("a").add(&Value::from("b")).unwrap(), Value::from("ab"));
        assert_eq!(
            Value::from(vec![1]).add(&Value::from(vec![2])).unwrap(),
            Value::from(vec![1, 2])
        );
        assert!(matches!(
            Value::from("a").add(&Value::Int(1)),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Value::Int(i64::MAX).add(&Value::Int(1)),
            Err(EvalError::Overflow(_))
        ));
    }

    #[test]
    fn test_subscript_negative_and_out_of_range() {
        let list = Value::from(vec![10, 20, 30]);
        assert_eq!(list.subscript(&Value::Int(-1)).unwrap(), Value::Int(30));
        assert!(matches!(
            list.subscript(&Value::Int(3)),
            Err(EvalError::IndexOutOfRange(_))
        ));
        let dict = Value::from(json!({"a": 1}));
        assert_eq!(dict.subscript(&Value::from("a")).unwrap(), Value::Int(1));
        assert!(matches!(
            dict.subscript(&Value::from("b")),
            Err(EvalError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_loose_equality_and_ordering() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(!Value::Int(1).same_as(&Value::Float(1.0)));
        assert_eq!(
            Value::from("a").compare(&Value::from("b"), "<").unwrap(),
            Some(Ordering::Less)
        );
        assert!(Value::from("a").compare(&Value::Int(1), "<").is_err());
    }

    #[test]
    fn test_context_from_serialize() {
        let ctx = Context::from_serialize(&json!({"name": "web", "port": 80})).unwrap();
        assert_eq!(ctx.get("port"), Some(&Value::Int(80)));
        assert_eq!(ctx.keys().collect::<Vec<_>>(), vec!["name", "port"]);

        let err = Context::from_serialize(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, PlatenError::InvalidContext(_)));
    }
}
