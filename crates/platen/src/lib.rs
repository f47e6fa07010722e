// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

// Parse errors carry a source snippet for display.
#![allow(clippy::result_large_err)]

//! # Platen
//!
//! Bracket-directive text templating for generating configuration files and
//! documentation from structured data.
//!
//! Literal text is copied through; directives in `[[ ... ]]` are executed
//! against a data mapping:
//!
//! | Directive | Effect |
//! |-----------|--------|
//! | `[[expr]]` | write the text form of `expr` |
//! | `[[# text #]]` | comment, no output |
//! | `[[if e]] ... [[elif e]] ... [[else]] ... [[end]]` | conditional chain |
//! | `[[for a, b in e]] ... [[end]]` | loop with positional destructuring |
//! | `[[exec name = e]]` | assignment in the current scope |
//! | `[[def f(x)]] ... [[end]]` / `[[call f(e)]]` | template functions |
//!
//! Expressions are limited to a fixed subset (constants, names, `+`,
//! subscripts, comparisons, `and`/`or`, unary operators). They are compiled
//! into closures once per distinct source text and cached; anything outside
//! the subset is an error, never evaluated dynamically.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use platen::{Engine, FileSystemResolver};
//!
//! let engine = Engine::new(FileSystemResolver::new("./templates"));
//! engine.register("hosts", "hosts.tmpl")?;
//!
//! let text = engine.render("hosts", &serde_json::json!({
//!     "hosts": [["web", "10.0.0.1"], ["db", "10.0.0.2"]],
//! }))?;
//! ```

/// Node tree types for parsed templates.
pub mod ast;
/// Directive scanner.
pub mod scanner;
/// Node tree builder.
pub mod parser;
/// Generic expression syntax trees.
pub mod syntax;
/// Expression subset compiler.
pub mod compiler;
/// Compiled-expression caching.
pub mod cache;
/// Runtime values and the data mapping.
pub mod value;
/// Scope frames for execution.
pub mod scope;
/// Template execution.
pub mod runtime;
/// Parsed templates.
pub mod template;
/// Template registry.
pub mod engine;
/// Resource resolution (filesystem, memory).
pub mod resolver;
/// In-memory resource resolver for tests and embedding.
pub mod memory_resolver;
/// Error types and reporting.
pub mod error;

pub use ast::*;
pub use cache::{CacheStats, ExpressionCache};
pub use compiler::{compile_expression, compile_statement, CompileError, ExprFn, StmtFn};
pub use engine::*;
pub use error::*;
pub use memory_resolver::MemoryResourceResolver;
pub use resolver::*;
pub use scope::{FrameGuard, Scope};
pub use template::Template;
pub use value::{Context, Value};

#[cfg(test)]
mod tests;
