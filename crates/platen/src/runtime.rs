// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template execution.
//!
//! [`Executor`] walks a node tree top-down against a [`Scope`], writing
//! output as it goes. Directive text is compiled on first use through the
//! shared [`ExpressionCache`]; a rejected construct becomes an
//! [`PlatenError::UnsupportedExpression`] carrying the scope frames and data
//! keys at the point of failure.
//!
//! Loops and template function calls push one scope frame each and hold it
//! through a [`FrameGuard`](crate::scope::FrameGuard), so the frame is
//! popped on every exit path.

use crate::ast::{Alternate, Call, Conditional, Directive, Document, Loop, Node};
use crate::cache::ExpressionCache;
use crate::compiler::CompileError;
use crate::error::{EvalError, PlatenError, Result};
use crate::scope::Scope;
use crate::value::Value;
use std::io::Write;

/// Maximum nesting of `[[call]]` directives.
pub const MAX_CALL_DEPTH: usize = 64;

/// Walks one template's node tree for a single execution.
pub struct Executor<'e, W: Write + ?Sized> {
    name: &'e str,
    document: &'e Document,
    cache: &'e ExpressionCache,
    out: &'e mut W,
    call_depth: usize,
}

impl<'e, W: Write + ?Sized> Executor<'e, W> {
    /// Creates an executor writing to `out`.
    pub fn new(
        name: &'e str,
        document: &'e Document,
        cache: &'e ExpressionCache,
        out: &'e mut W,
    ) -> Self {
        Self {
            name,
            document,
            cache,
            out,
            call_depth: 0,
        }
    }

    /// Executes the top-level nodes.
    pub fn run(&mut self, scope: &mut Scope<'_>) -> Result<()> {
        let document = self.document;
        self.execute(&document.body, scope)
    }

    fn execute(&mut self, nodes: &[Node], scope: &mut Scope<'_>) -> Result<()> {
        for node in nodes {
            match node {
                Node::Literal(text) => self.out.write_all(text.as_bytes())?,
                Node::Comment => {}
                Node::Interpolation(directive) => {
                    let value = self.evaluate(directive, scope)?;
                    write!(self.out, "{}", value)?;
                }
                Node::Statement(directive) => {
                    let statement = self
                        .cache
                        .statement(&directive.source)
                        .map_err(|e| self.unsupported(directive, e, scope))?;
                    statement(&mut *scope).map_err(|e| self.failed(directive, e))?;
                }
                Node::Conditional(conditional) => self.conditional(conditional, scope)?,
                Node::Loop(l) => self.for_loop(l, scope)?,
                Node::Call(call) => self.call(call, scope)?,
            }
        }
        Ok(())
    }

    fn evaluate(&self, directive: &Directive, scope: &Scope<'_>) -> Result<Value> {
        let expression = self
            .cache
            .expression(&directive.source)
            .map_err(|e| self.unsupported(directive, e, scope))?;
        expression(scope).map_err(|e| self.failed(directive, e))
    }

    fn conditional(&mut self, conditional: &Conditional, scope: &mut Scope<'_>) -> Result<()> {
        let mut branch = conditional;
        loop {
            if self.evaluate(&branch.condition, scope)?.is_truthy() {
                return self.execute(&branch.body, scope);
            }
            match &branch.alternate {
                Some(Alternate::Elif(next)) => branch = &**next,
                Some(Alternate::Else(body)) => return self.execute(body, scope),
                None => return Ok(()),
            }
        }
    }

    fn for_loop(&mut self, l: &Loop, scope: &mut Scope<'_>) -> Result<()> {
        let items = self
            .evaluate(&l.iterable, scope)?
            .iterate()
            .map_err(|e| self.failed(&l.iterable, e))?;

        let mut frame = scope.push_frame();
        for item in items {
            bind_targets(&mut frame, &l.targets, item).map_err(|e| self.failed(&l.iterable, e))?;
            self.execute(&l.body, &mut frame)?;
        }
        Ok(())
    }

    fn call(&mut self, call: &Call, scope: &mut Scope<'_>) -> Result<()> {
        let document = self.document;
        let function = document
            .functions
            .get(&call.name)
            .ok_or_else(|| self.failed(&call.args, EvalError::UndefinedFunction(call.name.clone())))?;

        let args = match self.evaluate(&call.args, scope)? {
            Value::Tuple(values) => values,
            other => vec![other],
        };
        if args.len() != function.params.len() {
            return Err(self.failed(
                &call.args,
                EvalError::Arity {
                    name: call.name.clone(),
                    expected: function.params.len(),
                    given: args.len(),
                },
            ));
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(self.failed(&call.args, EvalError::RecursionLimit(MAX_CALL_DEPTH)));
        }

        tracing::trace!(function = %call.name, depth = self.call_depth + 1, "calling template function");
        let mut frame = scope.push_frame();
        for (param, arg) in function.params.iter().zip(args) {
            frame.assign(param, arg);
        }

        self.call_depth += 1;
        let result = self.execute(&function.body, &mut frame);
        self.call_depth -= 1;
        result
    }

    fn unsupported(&self, directive: &Directive, error: CompileError, scope: &Scope<'_>) -> PlatenError {
        let reason = match error {
            CompileError::Unsupported { construct } => format!("{} is not supported", construct),
            CompileError::Syntax(e) => e.to_string(),
        };
        PlatenError::UnsupportedExpression {
            expression: directive.source.clone(),
            reason,
            line: directive.line,
            template: Some(self.name.to_string()),
            scope: scope.describe(),
            data_keys: scope.data().keys().map(str::to_string).collect(),
        }
    }

    fn failed(&self, directive: &Directive, source: EvalError) -> PlatenError {
        PlatenError::Evaluation {
            expression: directive.source.clone(),
            line: directive.line,
            template: Some(self.name.to_string()),
            source,
        }
    }
}

/// Binds one loop element to the loop's names.
///
/// Lists and tuples are destructured positionally; any other value is bound
/// to the first name.
fn bind_targets(scope: &mut Scope<'_>, targets: &[String], item: Value) -> std::result::Result<(), EvalError> {
    match item {
        Value::List(values) | Value::Tuple(values) => {
            if values.len() > targets.len() {
                return Err(EvalError::IndexOutOfRange(format!(
                    "too many values to unpack (expected {}, got {})",
                    targets.len(),
                    values.len()
                )));
            }
            for (name, value) in targets.iter().zip(values) {
                scope.assign(name, value);
            }
        }
        other => {
            if let Some(name) = targets.first() {
                scope.assign(name, other);
            }
        }
    }
    Ok(())
}
