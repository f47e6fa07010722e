// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Node tree types for parsed templates.
//!
//! The tree is produced by the [`parser`](crate::parser) and walked by the
//! [`runtime`](crate::runtime). Nodes own their children; there is no
//! sharing and no back-references. Expression and statement bodies are
//! kept as source text and compiled lazily through the
//! [`ExpressionCache`](crate::ExpressionCache).

use std::collections::HashMap;

/// Directive source text and where it appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Expression or statement text to compile.
    pub source: String,
    /// Line of the directive (1-indexed).
    pub line: usize,
    /// Column of the directive (1-indexed).
    pub column: usize,
}

impl Directive {
    /// Creates a directive record.
    pub fn new(source: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            source: source.into(),
            line,
            column,
        }
    }
}

/// A node of the template tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Text written verbatim.
    Literal(String),
    /// `[[# ... #]]`; produces nothing.
    Comment,
    /// `[[expr]]`; writes the text form of the value.
    Interpolation(Directive),
    /// `[[exec name = expr]]`; binds names in the current scope.
    Statement(Directive),
    /// `[[if]]` ... `[[end]]` with optional `elif`/`else` branches.
    Conditional(Conditional),
    /// `[[for names in expr]]` ... `[[end]]`.
    Loop(Loop),
    /// `[[call name(args)]]`.
    Call(Call),
}

/// An `if` or `elif` branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    /// The branch condition.
    pub condition: Directive,
    /// Executed when the condition is truthy.
    pub body: Vec<Node>,
    /// Consulted when the condition is falsy.
    pub alternate: Option<Alternate>,
}

/// What follows a conditional branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Alternate {
    /// `[[elif ...]]`, which behaves exactly like a nested `if`.
    Elif(Box<Conditional>),
    /// `[[else]]`.
    Else(Vec<Node>),
}

/// A `for` loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    /// Binding names, in destructuring order.
    pub targets: Vec<String>,
    /// The iterable expression.
    pub iterable: Directive,
    /// The loop body.
    pub body: Vec<Node>,
}

/// A call of a template function.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// The function name.
    pub name: String,
    /// The arguments as a tuple expression, e.g. `(a, b,)`.
    pub args: Directive,
}

/// A template function declared with `[[def name(params)]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// The function name.
    pub name: String,
    /// Parameter names, bound positionally.
    pub params: Vec<String>,
    /// The function body.
    pub body: Vec<Node>,
    /// Line of the `def` directive.
    pub line: usize,
}

/// The result of parsing a template: its top-level nodes and functions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Top-level nodes in source order.
    pub body: Vec<Node>,
    /// Template functions by name; later definitions replace earlier ones.
    pub functions: HashMap<String, Function>,
}

impl Document {
    /// Visits every directive in the tree, function bodies included.
    ///
    /// The callback receives each directive together with whether it is a
    /// statement (`exec`) rather than an expression.
    pub fn for_each_directive<E>(
        &self,
        mut visit: impl FnMut(&Directive, bool) -> Result<(), E>,
    ) -> Result<(), E> {
        walk(&self.body, &mut visit)?;
        for function in self.functions.values() {
            walk(&function.body, &mut visit)?;
        }
        Ok(())
    }
}

fn walk<E>(
    nodes: &[Node],
    visit: &mut impl FnMut(&Directive, bool) -> Result<(), E>,
) -> Result<(), E> {
    for node in nodes {
        match node {
            Node::Literal(_) | Node::Comment => {}
            Node::Interpolation(d) => visit(d, false)?,
            Node::Statement(d) => visit(d, true)?,
            Node::Conditional(c) => walk_conditional(c, visit)?,
            Node::Loop(l) => {
                visit(&l.iterable, false)?;
                walk(&l.body, visit)?;
            }
            Node::Call(c) => visit(&c.args, false)?,
        }
    }
    Ok(())
}

fn walk_conditional<E>(
    conditional: &Conditional,
    visit: &mut impl FnMut(&Directive, bool) -> Result<(), E>,
) -> Result<(), E> {
    visit(&conditional.condition, false)?;
    walk(&conditional.body, visit)?;
    match &conditional.alternate {
        Some(Alternate::Elif(next)) => walk_conditional(next, visit),
        Some(Alternate::Else(body)) => walk(body, visit),
        None => Ok(()),
    }
}
