// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template registry and execution entry point.
//!
//! This module provides the [`Engine`] type: it registers templates under
//! logical names, keeps them parsed for repeated execution, and owns the
//! [`ExpressionCache`] every execution compiles through.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use platen::{Engine, FileSystemResolver};
//!
//! let engine = Engine::new(FileSystemResolver::new("./templates"));
//! engine.register("hosts", "hosts.tmpl")?;
//!
//! let text = engine.render("hosts", &serde_json::json!({ "hosts": ["a", "b"] }))?;
//! ```
//!
//! # Lifecycle
//!
//! - Registration reads the backing resource once and parses it. A resource
//!   that cannot be read or parsed leaves the name unregistered.
//! - Registered templates are immutable and handed out as `Arc<Template>`.
//! - The expression cache lives as long as the engine and is only emptied
//!   by [`Engine::reset_cache`].
//!
//! # Thread Safety
//!
//! The registry sits behind an `RwLock` and the cache behind its own locks,
//! so an `Engine` can be shared between threads. Each execution builds its
//! own scope stack.

use crate::cache::ExpressionCache;
use crate::error::{PlatenError, Result};
use crate::resolver::ResourceResolver;
use crate::template::Template;
use crate::value::Context;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Template registry bound to a resource resolver.
///
/// # Examples
///
/// ```rust,ignore
/// use platen::{Engine, MemoryResourceResolver};
///
/// let resolver = MemoryResourceResolver::new();
/// resolver.add_template("greeting.tmpl", "Hello, [[name]]!");
///
/// let engine = Engine::new(resolver);
/// engine.register("greeting", "greeting.tmpl")?;
/// ```
#[derive(Debug)]
pub struct Engine<R: ResourceResolver> {
    resolver: R,
    templates: RwLock<HashMap<String, Arc<Template>>>,
    cache: Arc<ExpressionCache>,
}

impl<R: ResourceResolver> Engine<R> {
    /// Creates an engine with an empty registry and a fresh cache.
    pub fn new(resolver: R) -> Self {
        Self::with_cache(resolver, Arc::new(ExpressionCache::new()))
    }

    /// Creates an engine that compiles through an existing cache.
    pub fn with_cache(resolver: R, cache: Arc<ExpressionCache>) -> Self {
        Self {
            resolver,
            templates: RwLock::new(HashMap::new()),
            cache,
        }
    }

    /// Loads `path` through the resolver, parses it and registers it as
    /// `name`, replacing any template previously registered under `name`.
    ///
    /// # Errors
    ///
    /// [`PlatenError::Resource`] if the source cannot be loaded, or a parse
    /// error. In both cases nothing is registered.
    pub fn register(&self, name: &str, path: &str) -> Result<Arc<Template>> {
        let resource = self.resolver.resolve(path)?;
        tracing::debug!(name, path = %resource.path, "registering template");
        self.insert(Template::parse(name, resource.source)?)
    }

    /// Parses `source` and registers it as `name`.
    pub fn register_source(&self, name: &str, source: &str) -> Result<Arc<Template>> {
        tracing::debug!(name, "registering template from source");
        self.insert(Template::parse(name, source)?)
    }

    fn insert(&self, template: Template) -> Result<Arc<Template>> {
        let template = Arc::new(template);
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(template.name().to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Returns the template registered as `name`.
    pub fn get(&self, name: &str) -> Result<Arc<Template>> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| PlatenError::TemplateNotFound(name.to_string()))
    }

    /// Returns true if a template is registered as `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Executes a template against `data` and returns the output.
    pub fn execute(&self, template: &Template, data: &mut Context) -> Result<String> {
        template.execute(&self.cache, data)
    }

    /// Executes a template against `data`, writing the output to `out`.
    pub fn execute_to(&self, template: &Template, data: &mut Context, out: &mut dyn Write) -> Result<()> {
        template.execute_to(&self.cache, data, out)
    }

    /// Executes the template registered as `name` against any serializable
    /// map-shaped value.
    pub fn render<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<String> {
        let template = self.get(name)?;
        let mut context = Context::from_serialize(data)?;
        self.execute(&template, &mut context)
    }

    /// Executes the template registered as `name` and writes the output to
    /// a file at `path`, creating or truncating it.
    pub fn render_to_file<T, P>(&self, name: &str, data: &T, path: P) -> Result<()>
    where
        T: Serialize + ?Sized,
        P: AsRef<Path>,
    {
        let template = self.get(name)?;
        let mut context = Context::from_serialize(data)?;
        let mut out = BufWriter::new(std::fs::File::create(path.as_ref())?);
        self.execute_to(&template, &mut context, &mut out)?;
        out.flush()?;
        tracing::debug!(name, path = %path.as_ref().display(), "wrote rendered template");
        Ok(())
    }

    /// The expression cache shared by every execution.
    pub fn cache(&self) -> &Arc<ExpressionCache> {
        &self.cache
    }

    /// Empties the expression cache.
    pub fn reset_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_resolver::MemoryResourceResolver;
    use serde_json::json;

    fn engine() -> Engine<MemoryResourceResolver> {
        let resolver = MemoryResourceResolver::new();
        resolver.add_template("greeting.tmpl", "Hello, [[name]]!");
        resolver.add_template("broken.tmpl", "[[if x]]");
        Engine::new(resolver)
    }

    #[test]
    fn test_register_and_render() {
        let engine = engine();
        engine.register("greeting", "greeting.tmpl").unwrap();
        assert!(engine.contains("greeting"));
        assert_eq!(
            engine.render("greeting", &json!({ "name": "World" })).unwrap(),
            "Hello, World!"
        );
    }

    #[test]
    fn test_failed_registration_leaves_name_unregistered() {
        let engine = engine();
        assert!(matches!(
            engine.register("missing", "missing.tmpl"),
            Err(PlatenError::Resource { .. })
        ));
        assert!(matches!(
            engine.register("broken", "broken.tmpl"),
            Err(PlatenError::StructuralParse { .. })
        ));
        assert!(engine.names().is_empty());
        assert!(matches!(engine.get("broken"), Err(PlatenError::TemplateNotFound(_))));
    }

    #[test]
    fn test_get_returns_shared_template() {
        let engine = engine();
        let registered = engine.register("greeting", "greeting.tmpl").unwrap();
        let fetched = engine.get("greeting").unwrap();
        assert!(Arc::ptr_eq(&registered, &fetched));
    }

    #[test]
    fn test_render_rejects_non_map_data() {
        let engine = engine();
        engine.register_source("t", "x").unwrap();
        assert!(matches!(
            engine.render("t", &json!([1, 2])),
            Err(PlatenError::InvalidContext(_))
        ));
    }

    #[test]
    fn test_cache_shared_across_templates() {
        let engine = engine();
        engine.register_source("a", "[[n + 1]]").unwrap();
        engine.register_source("b", "[[n + 1]][[n + 1]]").unwrap();
        engine.render("a", &json!({ "n": 1 })).unwrap();
        engine.render("b", &json!({ "n": 2 })).unwrap();
        let stats = engine.cache().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);

        engine.reset_cache();
        assert_eq!(engine.cache().stats().entries, 0);
    }

    #[test]
    fn test_render_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine();
        engine.register("greeting", "greeting.tmpl").unwrap();
        let path = dir.path().join("out.txt");
        engine.render_to_file("greeting", &json!({ "name": "file" }), &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Hello, file!");
    }

    #[test]
    fn test_concurrent_renders() {
        let engine = Arc::new(engine());
        engine
            .register_source("loop", "[[for x in xs]][[x]][[end]]")
            .unwrap();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || engine.render("loop", &json!({ "xs": [i, i] })).unwrap())
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("{}{}", i, i));
        }
    }
}
