// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Directive compiler.
//!
//! Turns directive source text into closures over a [`Scope`]. Source is
//! first parsed into a generic [`syntax`](crate::syntax) tree, then every
//! node is matched against the supported subset:
//!
//! | Construct | Example |
//! |-----------|---------|
//! | constants and displays | `1`, `'a'`, `True`, `[1, x]`, `(a, b)`, `{'k': v}` |
//! | names | `hosts` |
//! | addition | `prefix + name`, `n + 1` |
//! | subscripts | `row[0]`, `cfg['port']`, `items[i]` |
//! | comparisons, chained | `a == b`, `0 <= i < n`, `x not in seen` |
//! | boolean operators | `a and b and c`, `x or default` |
//! | unary operators | `not x`, `-n`, `+n`, `~mask` |
//! | assignments (statements) | `x = 1`, `a = b = name` |
//!
//! Anything else fails with [`CompileError::Unsupported`] naming the
//! construct. Nothing is ever handed to a general-purpose evaluator.
//!
//! Subtrees whose operands are all constants are evaluated once at compile
//! time, and `+` or single comparisons with a constant right-hand side
//! capture that constant instead of calling a child closure.

use crate::error::EvalError;
use crate::scope::Scope;
use crate::syntax::{self, BinOp, BoolOp, CmpOp, Expr, Stmt, SyntaxError, UnaryOp};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A compiled expression.
pub type ExprFn = Arc<dyn Fn(&Scope<'_>) -> Result<Value, EvalError> + Send + Sync>;

/// A compiled assignment statement.
pub type StmtFn = Arc<dyn Fn(&mut Scope<'_>) -> Result<(), EvalError> + Send + Sync>;

/// Why directive source could not be compiled.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// The source does not parse at all.
    #[error("{0}")]
    Syntax(#[from] SyntaxError),

    /// The source parses but uses a construct outside the compiled subset.
    #[error("{construct} is not supported in templates")]
    Unsupported {
        /// Human readable name of the rejected construct.
        construct: String,
    },
}

fn unsupported(construct: impl Into<String>) -> CompileError {
    CompileError::Unsupported {
        construct: construct.into(),
    }
}

/// Compiles expression source into a closure.
pub fn compile_expression(source: &str) -> Result<ExprFn, CompileError> {
    let expr = syntax::parse_expression(source)?;
    Ok(compile_expr(&expr)?.into_fn())
}

/// Compiles assignment source into a closure.
///
/// Only assignments to one or more plain names are accepted; the value is
/// evaluated once and bound to every target left to right.
pub fn compile_statement(source: &str) -> Result<StmtFn, CompileError> {
    match syntax::parse_statement(source)? {
        Stmt::Assign { targets, value } => {
            let names = targets
                .iter()
                .map(|target| match target {
                    Expr::Name(name) => Ok(name.clone()),
                    other => Err(unsupported(format!("assignment to {}", describe(other)))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let value = compile_expr(&value)?.into_fn();
            Ok(statement(move |scope| {
                let v = value(scope)?;
                for name in &names {
                    scope.assign(name, v.clone());
                }
                Ok(())
            }))
        }
        Stmt::AugAssign { op, .. } => Err(unsupported(format!("augmented assignment `{}`", op))),
        Stmt::Expr(_) => Err(unsupported("expression statement (only assignments may be executed)")),
    }
}

/// Intermediate result of compiling one node.
enum Code {
    Const(Value),
    Dynamic(ExprFn),
}

impl Code {
    fn into_fn(self) -> ExprFn {
        match self {
            Code::Const(value) => boxed(move |_| Ok(value.clone())),
            Code::Dynamic(f) => f,
        }
    }
}

fn boxed<F>(f: F) -> ExprFn
where
    F: Fn(&Scope<'_>) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn dynamic<F>(f: F) -> Code
where
    F: Fn(&Scope<'_>) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Code::Dynamic(boxed(f))
}

fn statement<F>(f: F) -> StmtFn
where
    F: Fn(&mut Scope<'_>) -> Result<(), EvalError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn compile_expr(expr: &Expr) -> Result<Code, CompileError> {
    match expr {
        Expr::Constant(value) => Ok(Code::Const(value.clone())),
        Expr::Name(name) => {
            let name = name.clone();
            Ok(dynamic(move |scope| {
                scope
                    .lookup(&name)
                    .cloned()
                    .ok_or_else(|| EvalError::UndefinedName(name.clone()))
            }))
        }
        Expr::List(items) => compile_sequence(items, Value::List),
        Expr::Tuple(items) => compile_sequence(items, Value::Tuple),
        Expr::Dict(entries) => compile_dict(entries),
        Expr::BinOp { op: BinOp::Add, left, right } => compile_add(left, right),
        Expr::Subscript { value, index } => compile_subscript(value, index),
        Expr::Compare { left, ops, comparators } => compile_compare(left, ops, comparators),
        Expr::BoolOp { op, values } => compile_bool_op(*op, values),
        Expr::UnaryOp { op, operand } => compile_unary(*op, operand),
        other => Err(unsupported(describe(other))),
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Constant(_) => "constant".to_string(),
        Expr::Name(_) => "name".to_string(),
        Expr::List(_) => "list display".to_string(),
        Expr::Tuple(_) => "tuple".to_string(),
        Expr::Dict(_) => "dict display".to_string(),
        Expr::Subscript { .. } => "subscript".to_string(),
        Expr::Slice { .. } => "slice".to_string(),
        Expr::Attribute { attr, .. } => format!("attribute access `.{}`", attr),
        Expr::Call { func, .. } => match func.as_ref() {
            Expr::Name(name) => format!("function call `{}(...)`", name),
            _ => "function call".to_string(),
        },
        Expr::BinOp { op, .. } => format!("binary operator `{}`", op.symbol()),
        Expr::UnaryOp { .. } => "unary operator".to_string(),
        Expr::BoolOp { .. } => "boolean operator".to_string(),
        Expr::Compare { .. } => "comparison".to_string(),
        Expr::IfExp { .. } => "conditional expression".to_string(),
    }
}

fn compile_sequence(items: &[Expr], build: fn(Vec<Value>) -> Value) -> Result<Code, CompileError> {
    let codes = items.iter().map(compile_expr).collect::<Result<Vec<_>, _>>()?;
    if codes.iter().all(|c| matches!(c, Code::Const(_))) {
        let values = codes
            .into_iter()
            .filter_map(|c| match c {
                Code::Const(v) => Some(v),
                Code::Dynamic(_) => None,
            })
            .collect();
        return Ok(Code::Const(build(values)));
    }
    let fns: Vec<ExprFn> = codes.into_iter().map(Code::into_fn).collect();
    Ok(dynamic(move |scope| {
        let values = fns.iter().map(|f| f(scope)).collect::<Result<Vec<_>, _>>()?;
        Ok(build(values))
    }))
}

fn compile_dict(entries: &[(Expr, Expr)]) -> Result<Code, CompileError> {
    let mut compiled = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        compiled.push((compile_expr(key)?.into_fn(), compile_expr(value)?.into_fn()));
    }
    Ok(dynamic(move |scope| {
        let mut map = BTreeMap::new();
        for (key, value) in &compiled {
            let key = match key(scope)? {
                Value::Str(s) => s,
                other => {
                    return Err(EvalError::TypeMismatch {
                        op: "dict key".to_string(),
                        left: "str",
                        right: other.type_name(),
                    })
                }
            };
            map.insert(key, value(scope)?);
        }
        Ok(Value::Dict(map))
    }))
}

fn compile_add(left: &Expr, right: &Expr) -> Result<Code, CompileError> {
    let left = compile_expr(left)?;
    let right = compile_expr(right)?;
    Ok(match (left, right) {
        (Code::Const(l), Code::Const(r)) => match l.add(&r) {
            Ok(sum) => Code::Const(sum),
            Err(_) => dynamic(move |_| l.add(&r)),
        },
        (Code::Dynamic(l), Code::Const(r)) => dynamic(move |scope| l(scope)?.add(&r)),
        (l, r) => {
            let (l, r) = (l.into_fn(), r.into_fn());
            dynamic(move |scope| l(scope)?.add(&r(scope)?))
        }
    })
}

fn compile_subscript(value: &Expr, index: &Expr) -> Result<Code, CompileError> {
    if matches!(index, Expr::Slice { .. }) {
        return Err(unsupported("slice"));
    }
    let value = compile_expr(value)?;
    let index = compile_expr(index)?;
    Ok(match (value, index) {
        (Code::Const(v), Code::Const(i)) => match v.subscript(&i) {
            Ok(item) => Code::Const(item),
            Err(_) => dynamic(move |_| v.subscript(&i)),
        },
        (Code::Dynamic(v), Code::Const(i)) => dynamic(move |scope| v(scope)?.subscript(&i)),
        (v, i) => {
            let (v, i) = (v.into_fn(), i.into_fn());
            dynamic(move |scope| v(scope)?.subscript(&i(scope)?))
        }
    })
}

/// Applies one comparison operator.
pub fn apply_comparison(op: CmpOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    use std::cmp::Ordering::*;
    Ok(match op {
        CmpOp::Eq => left.loose_eq(right),
        CmpOp::NotEq => !left.loose_eq(right),
        CmpOp::Lt => matches!(left.compare(right, "<")?, Some(Less)),
        CmpOp::LtE => matches!(left.compare(right, "<=")?, Some(Less | Equal)),
        CmpOp::Gt => matches!(left.compare(right, ">")?, Some(Greater)),
        CmpOp::GtE => matches!(left.compare(right, ">=")?, Some(Greater | Equal)),
        CmpOp::In => right.contains(left)?,
        CmpOp::NotIn => !right.contains(left)?,
        CmpOp::Is => left.same_as(right),
        CmpOp::IsNot => !left.same_as(right),
    })
}

fn compile_compare(left: &Expr, ops: &[CmpOp], comparators: &[Expr]) -> Result<Code, CompileError> {
    let left = compile_expr(left)?;
    let mut rights = comparators.iter().map(compile_expr).collect::<Result<Vec<_>, _>>()?;

    if ops.len() == 1 && rights.len() == 1 {
        let op = ops[0];
        let right = rights.remove(0);
        return Ok(match (left, right) {
            (Code::Const(l), Code::Const(r)) => match apply_comparison(op, &l, &r) {
                Ok(result) => Code::Const(Value::Bool(result)),
                Err(_) => dynamic(move |_| apply_comparison(op, &l, &r).map(Value::Bool)),
            },
            (Code::Dynamic(l), Code::Const(r)) => {
                dynamic(move |scope| apply_comparison(op, &l(scope)?, &r).map(Value::Bool))
            }
            (l, r) => {
                let (l, r) = (l.into_fn(), r.into_fn());
                dynamic(move |scope| apply_comparison(op, &l(scope)?, &r(scope)?).map(Value::Bool))
            }
        });
    }

    let left = left.into_fn();
    let chain: Vec<(CmpOp, ExprFn)> = ops
        .iter()
        .copied()
        .zip(rights.into_iter().map(Code::into_fn))
        .collect();
    Ok(dynamic(move |scope| {
        let mut current = left(scope)?;
        for (op, right) in &chain {
            let next = right(scope)?;
            if !apply_comparison(*op, &current, &next)? {
                return Ok(Value::Bool(false));
            }
            current = next;
        }
        Ok(Value::Bool(true))
    }))
}

fn compile_bool_op(op: BoolOp, values: &[Expr]) -> Result<Code, CompileError> {
    let codes = values.iter().map(compile_expr).collect::<Result<Vec<_>, _>>()?;
    // `and` stops at the first falsy operand, `or` at the first truthy one.
    let stop_when = op == BoolOp::Or;

    if codes.iter().all(|c| matches!(c, Code::Const(_))) {
        let mut last = Value::None;
        for code in codes {
            if let Code::Const(v) = code {
                if v.is_truthy() == stop_when {
                    return Ok(Code::Const(v));
                }
                last = v;
            }
        }
        return Ok(Code::Const(last));
    }

    let fns: Vec<ExprFn> = codes.into_iter().map(Code::into_fn).collect();
    Ok(dynamic(move |scope| {
        let mut last = Value::None;
        for f in &fns {
            let v = f(scope)?;
            if v.is_truthy() == stop_when {
                return Ok(v);
            }
            last = v;
        }
        Ok(last)
    }))
}

fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Plus => operand.positive(),
        UnaryOp::Minus => operand.negate(),
        UnaryOp::Invert => operand.invert(),
    }
}

fn compile_unary(op: UnaryOp, operand: &Expr) -> Result<Code, CompileError> {
    Ok(match compile_expr(operand)? {
        Code::Const(v) => match apply_unary(op, &v) {
            Ok(result) => Code::Const(result),
            Err(_) => dynamic(move |_| apply_unary(op, &v)),
        },
        Code::Dynamic(f) => dynamic(move |scope| apply_unary(op, &f(scope)?)),
    })
}
