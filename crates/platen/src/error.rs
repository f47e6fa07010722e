// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the platen templating engine.
//!
//! This module defines [`PlatenError`], the main error enum, [`EvalError`]
//! for failures inside compiled closures, and [`SourceContext`] for rich
//! error reporting.
//!
//! # Error Categories
//!
//! - **Structural errors**: a block is never closed by `[[end]]`, or a
//!   block terminator appears where no block is open
//! - **Directive syntax errors**: `if`/`for`/`exec`/`def`/`call` bodies
//!   that do not have the required shape
//! - **Unsupported expressions**: directive source outside the compiled subset
//! - **Evaluation errors**: runtime failures of a compiled directive
//! - **Resource errors**: the backing file of a template cannot be read
//!
//! None of these are recovered locally. Output already written to a stream
//! before the failing directive stays written.

use std::fmt;
use thiserror::Error;

/// Source context for enhanced error messages.
///
/// Captures a snippet of template source around an error location,
/// enabling messages with line numbers and a caret under the directive.
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// All lines from the source file.
    pub lines: Vec<String>,
    /// The line number where the error occurred (1-indexed).
    pub error_line: usize,
    /// The column number where the error occurred (1-indexed).
    pub error_column: usize,
    /// First line number of the snippet (1-indexed).
    pub snippet_start: usize,
    /// Last line number of the snippet (1-indexed).
    pub snippet_end: usize,
}

impl SourceContext {
    /// Creates a source context from template source and error location.
    ///
    /// Captures 2 lines before and after the error line.
    pub fn from_source(source: &str, line: usize, column: usize) -> Self {
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
        let snippet_start = line.saturating_sub(2).max(1);
        let snippet_end = (line + 2).min(lines.len());

        Self {
            lines,
            error_line: line,
            error_column: column,
            snippet_start,
            snippet_end,
        }
    }

    /// Formats the source snippet with line numbers and error indicator.
    ///
    /// Returns a string like:
    /// ```text
    ///    1 | hosts:
    ///    2 | [[for h in hosts]]
    ///      | ^
    ///    3 |   - [[h]]
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut result = String::new();

        for line_num in self.snippet_start..=self.snippet_end {
            if line_num == 0 || line_num > self.lines.len() {
                break;
            }

            let line = &self.lines[line_num - 1];
            result.push_str(&format!("{:4} | {}\n", line_num, line));

            if line_num == self.error_line {
                result.push_str(&format!(
                    "     | {}^\n",
                    " ".repeat(self.error_column.saturating_sub(1))
                ));
            }
        }

        result
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_snippet())
    }
}

/// Helper struct for displaying optional source context.
pub struct OptSourceContextDisplay<'a>(pub &'a Option<SourceContext>);

impl fmt::Display for OptSourceContextDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ctx) => write!(f, "\n{}", ctx),
            None => Ok(()),
        }
    }
}

/// Helper struct for displaying an optional template name.
pub struct OptTemplateDisplay<'a>(pub &'a Option<String>);

impl fmt::Display for OptTemplateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(name) => write!(f, " in '{}'", name),
            None => Ok(()),
        }
    }
}

/// Helper trait for formatting optional error decorations.
pub trait AsDisplay<'a> {
    /// The display wrapper type.
    type Display: fmt::Display;
    /// Wraps self for Display formatting.
    fn as_display(&'a self) -> Self::Display;
}

impl<'a> AsDisplay<'a> for Option<SourceContext> {
    type Display = OptSourceContextDisplay<'a>;

    fn as_display(&'a self) -> OptSourceContextDisplay<'a> {
        OptSourceContextDisplay(self)
    }
}

impl<'a> AsDisplay<'a> for Option<String> {
    type Display = OptTemplateDisplay<'a>;

    fn as_display(&'a self) -> OptTemplateDisplay<'a> {
        OptTemplateDisplay(self)
    }
}

/// The main error type for platen operations.
#[derive(Error, Debug)]
pub enum PlatenError {
    /// A block is never closed, or a terminator appears outside any block.
    #[error("Structural error{}: {message} at line {line}{}", template.as_display(), source_context.as_display())]
    StructuralParse {
        /// Description, e.g. `[[if x]] does not have a matching [[end]]`.
        message: String,
        /// Raw text of the offending directive.
        directive: String,
        /// Line of the offending directive (1-indexed).
        line: usize,
        /// Column of the offending directive (1-indexed).
        column: usize,
        /// The template name, if known.
        template: Option<String>,
        /// Source context for rich error display.
        source_context: Option<SourceContext>,
    },

    /// A keyword directive does not have the required shape.
    #[error("Directive syntax error{}: [[{directive}]] {message} at line {line}{}", template.as_display(), source_context.as_display())]
    DirectiveSyntax {
        /// What is wrong with the directive.
        message: String,
        /// Raw text of the directive.
        directive: String,
        /// Line of the directive (1-indexed).
        line: usize,
        /// Column of the directive (1-indexed).
        column: usize,
        /// The template name, if known.
        template: Option<String>,
        /// Source context for rich error display.
        source_context: Option<SourceContext>,
    },

    /// An expression or assignment falls outside the compiled subset.
    #[error("Unsupported expression{} at line {line}: `{expression}`: {reason}\n  scope stack: {scope}\n  data keys: [{}]", template.as_display(), data_keys.join(", "))]
    UnsupportedExpression {
        /// The directive source text.
        expression: String,
        /// Which construct was rejected.
        reason: String,
        /// Line of the directive (1-indexed).
        line: usize,
        /// The template name, if known.
        template: Option<String>,
        /// Rendered scope frames at the time of the failure, innermost last.
        scope: String,
        /// Keys of the base data mapping.
        data_keys: Vec<String>,
    },

    /// A compiled directive failed while executing.
    #[error("Evaluation error{} at line {line}: `{expression}`: {source}", template.as_display())]
    Evaluation {
        /// The directive source text.
        expression: String,
        /// Line of the directive (1-indexed).
        line: usize,
        /// The template name, if known.
        template: Option<String>,
        /// The underlying failure.
        source: EvalError,
    },

    /// The backing file of a template could not be read.
    #[error("Cannot read template '{path}': {source}")]
    Resource {
        /// The path that was requested.
        path: String,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// No template is registered under the requested name.
    #[error("Template not registered: {0}")]
    TemplateNotFound(String),

    /// The data handed to the engine is not a name to value mapping.
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    /// Writing rendered output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Converting context data through JSON failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlatenError {
    /// Attaches the template name and a source snippet to parse errors.
    ///
    /// Other variants are returned unchanged.
    pub fn with_template(self, name: &str, source: &str) -> Self {
        match self {
            PlatenError::StructuralParse { message, directive, line, column, .. } => {
                PlatenError::StructuralParse {
                    message,
                    directive,
                    line,
                    column,
                    template: Some(name.to_string()),
                    source_context: Some(SourceContext::from_source(source, line, column)),
                }
            }
            PlatenError::DirectiveSyntax { message, directive, line, column, .. } => {
                PlatenError::DirectiveSyntax {
                    message,
                    directive,
                    line,
                    column,
                    template: Some(name.to_string()),
                    source_context: Some(SourceContext::from_source(source, line, column)),
                }
            }
            other => other,
        }
    }

    /// Returns the 1-indexed line the error points at, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            PlatenError::StructuralParse { line, .. }
            | PlatenError::DirectiveSyntax { line, .. }
            | PlatenError::UnsupportedExpression { line, .. }
            | PlatenError::Evaluation { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Failures raised by compiled closures while a directive executes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A name is bound neither in a scope frame nor in the data mapping.
    #[error("name '{0}' is not defined")]
    UndefinedName(String),

    /// An operator was applied to operands it does not support.
    #[error("unsupported operand type(s) for {op}: '{left}' and '{right}'")]
    TypeMismatch {
        /// The operator.
        op: String,
        /// Type of the left operand.
        left: &'static str,
        /// Type of the right operand.
        right: &'static str,
    },

    /// A unary operator was applied to an operand it does not support.
    #[error("bad operand type for unary {op}: '{operand}'")]
    BadOperand {
        /// The operator.
        op: String,
        /// Type of the operand.
        operand: &'static str,
    },

    /// A sequence index or destructuring position is out of range.
    #[error("{0}")]
    IndexOutOfRange(String),

    /// A dict subscript used a missing key.
    #[error("key '{0}' not found")]
    KeyNotFound(String),

    /// A value was used as a subscript container but cannot be indexed.
    #[error("'{container}' object is not subscriptable by '{index}'")]
    NotSubscriptable {
        /// Type of the container.
        container: &'static str,
        /// Type of the index.
        index: &'static str,
    },

    /// A loop iterated over a value that is not a collection.
    #[error("'{0}' object is not iterable")]
    NotIterable(&'static str),

    /// Integer arithmetic left the i64 range.
    #[error("integer overflow in {0}")]
    Overflow(String),

    /// A `[[call]]` named a function the template does not define.
    #[error("template function '{0}' is not defined")]
    UndefinedFunction(String),

    /// A `[[call]]` passed the wrong number of arguments.
    #[error("template function '{name}' takes {expected} argument(s) but {given} were given")]
    Arity {
        /// The function name.
        name: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        given: usize,
    },

    /// Template function calls nested past the supported depth.
    #[error("template function calls nested deeper than {0}")]
    RecursionLimit(usize),
}

/// Convenience type alias for Results with [`PlatenError`].
pub type Result<T> = std::result::Result<T, PlatenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_marks_error_line() {
        let source = "a\nb\n[[if x]]\nc\nd\ne";
        let ctx = SourceContext::from_source(source, 3, 1);
        let snippet = ctx.format_snippet();
        assert!(snippet.contains("   3 | [[if x]]\n     | ^\n"));
        assert!(snippet.starts_with("   1 | a"));
        assert!(!snippet.contains("   6 |"));
    }

    #[test]
    fn with_template_decorates_parse_errors() {
        let err = PlatenError::StructuralParse {
            message: "[[if x]] does not have a matching [[end]]".into(),
            directive: "if x".into(),
            line: 1,
            column: 1,
            template: None,
            source_context: None,
        }
        .with_template("hosts.conf", "[[if x]]\nbody");

        let text = err.to_string();
        assert!(text.contains("in 'hosts.conf'"), "{}", text);
        assert!(text.contains("at line 1"), "{}", text);
        assert!(text.contains("   1 | [[if x]]"), "{}", text);
        assert_eq!(err.line(), Some(1));
    }
}
