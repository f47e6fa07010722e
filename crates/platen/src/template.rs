// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Parsed templates.
//!
//! A [`Template`] is parsed once and is immutable afterwards. Every
//! execution builds its own [`Scope`] over the caller's data, so one
//! template can be shared through `Arc` and executed from several threads
//! at once.

use crate::ast::Document;
use crate::cache::ExpressionCache;
use crate::error::{PlatenError, Result};
use crate::parser;
use crate::runtime::Executor;
use crate::scope::Scope;
use crate::value::Context;
use std::io::Write;
use std::path::Path;

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    source: String,
    document: Document,
}

impl Template {
    /// Parses template source.
    ///
    /// Parse errors carry `name` and a snippet of the offending lines.
    pub fn parse(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let source = source.into();
        let document = parser::parse(&source).map_err(|e| e.with_template(&name, &source))?;
        Ok(Self {
            name,
            source,
            document,
        })
    }

    /// Reads and parses a template file; the file name becomes the
    /// template name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| PlatenError::Resource {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(path.display().to_string(), source)
    }

    /// The template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed node tree.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Executes the template and returns the output.
    ///
    /// `[[exec]]` assignments made outside any loop or call are written
    /// back into `data`.
    pub fn execute(&self, cache: &ExpressionCache, data: &mut Context) -> Result<String> {
        let mut out = Vec::new();
        self.execute_to(cache, data, &mut out)?;
        // Output is assembled from `str` literals and `Display` text only.
        String::from_utf8(out)
            .map_err(|e| PlatenError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Executes the template, writing output to `out` as it is produced.
    ///
    /// On error, `out` may already contain the output written before the
    /// failing directive.
    pub fn execute_to(&self, cache: &ExpressionCache, data: &mut Context, out: &mut dyn Write) -> Result<()> {
        tracing::debug!(template = %self.name, "executing template");
        let mut scope = Scope::new(data);
        Executor::new(&self.name, &self.document, cache, out).run(&mut scope)
    }

    /// Compiles every directive without executing anything.
    ///
    /// Returns the number of directives checked. The first directive outside
    /// the supported subset is reported as
    /// [`PlatenError::UnsupportedExpression`] with an empty scope.
    pub fn compile_all(&self, cache: &ExpressionCache) -> Result<usize> {
        let mut count = 0;
        self.document.for_each_directive(|directive, is_statement| {
            let compiled = if is_statement {
                cache.statement(&directive.source).map(|_| ())
            } else {
                cache.expression(&directive.source).map(|_| ())
            };
            compiled.map_err(|e| PlatenError::UnsupportedExpression {
                expression: directive.source.clone(),
                reason: e.to_string(),
                line: directive.line,
                template: Some(self.name.clone()),
                scope: "[]".to_string(),
                data_keys: Vec::new(),
            })?;
            count += 1;
            Ok::<(), PlatenError>(())
        })?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_execute_twice_with_fresh_scopes() {
        let template = Template::parse("t", "[[for x in xs]][[x]][[end]]").unwrap();
        let cache = ExpressionCache::new();
        let mut data = Context::new();
        data.insert("xs", vec![1, 2]);
        assert_eq!(template.execute(&cache, &mut data).unwrap(), "12");
        assert_eq!(template.execute(&cache, &mut data).unwrap(), "12");
        assert!(!data.contains_key("x"));
    }

    #[test]
    fn test_exec_at_top_level_updates_data() {
        let template = Template::parse("t", "[[exec total = base + 1]]").unwrap();
        let cache = ExpressionCache::new();
        let mut data = Context::new();
        data.insert("base", 41);
        template.execute(&cache, &mut data).unwrap();
        assert_eq!(data.get("total"), Some(&Value::Int(42)));
    }

    #[test]
    fn test_partial_output_before_error() {
        let template = Template::parse("t", "before [[missing]] after").unwrap();
        let cache = ExpressionCache::new();
        let mut out = Vec::new();
        let err = template
            .execute_to(&cache, &mut Context::new(), &mut out)
            .unwrap_err();
        assert!(matches!(err, PlatenError::Evaluation { .. }));
        assert_eq!(out, b"before ");
    }

    #[test]
    fn test_parse_error_carries_name_and_snippet() {
        let err = Template::parse("hosts.tmpl", "a\n[[if x]]\nb").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("hosts.tmpl"), "{}", text);
        assert!(text.contains("line 2"), "{}", text);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "v=[[v]]").unwrap();
        let template = Template::from_file(file.path()).unwrap();
        let cache = ExpressionCache::new();
        let mut data = Context::new();
        data.insert("v", 1.5);
        assert_eq!(template.execute(&cache, &mut data).unwrap(), "v=1.5");

        let missing = Template::from_file("/nonexistent/template.txt").unwrap_err();
        assert!(matches!(missing, PlatenError::Resource { .. }));
    }

    #[test]
    fn test_compile_all() {
        let cache = ExpressionCache::new();
        let template = Template::parse(
            "t",
            "[[if a]][[b]][[else]][[exec c = 1]][[end]][[def f(x)]][[x]][[end]]",
        )
        .unwrap();
        assert_eq!(template.compile_all(&cache).unwrap(), 4);

        let template = Template::parse("t", "ok [[a]]\n[[a.b]]").unwrap();
        let err = template.compile_all(&cache).unwrap_err();
        assert_eq!(err.line(), Some(2));
    }
}
