// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use crate::error::{PlatenError, Result};
use crate::resolver::{ResolvedResource, ResourceResolver};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// Memory-based resource resolver that stores template sources in memory
#[derive(Clone, Default, Debug)]
pub struct MemoryResourceResolver {
    templates: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryResourceResolver {
    /// Create an empty memory resolver
    pub fn new() -> Self {
        Self::default()
    }

    fn with_templates_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut HashMap<String, String>) -> R,
    {
        f(&mut self.templates.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Add a template under `path`, replacing any previous content
    pub fn add_template(&self, path: &str, content: impl Into<String>) {
        let content = content.into();
        self.with_templates_mut(|templates| {
            templates.insert(normalize(path), content);
        });
    }

    /// Remove a template
    pub fn remove_template(&self, path: &str) {
        self.with_templates_mut(|templates| {
            templates.remove(&normalize(path));
        });
    }

    /// Clear all templates
    pub fn clear(&self) {
        self.with_templates_mut(HashMap::clear);
    }

    /// Number of stored templates
    pub fn len(&self) -> usize {
        self.with_templates_mut(|templates| templates.len())
    }

    /// Whether no templates are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strips `./` and leading `/` so `a.tmpl`, `./a.tmpl` and `/a.tmpl` name the same entry.
fn normalize(path: &str) -> String {
    let mut path = path.trim();
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            return path.to_string();
        }
    }
}

impl ResourceResolver for MemoryResourceResolver {
    fn resolve(&self, path: &str) -> Result<ResolvedResource> {
        let key = normalize(path);
        let source = self.with_templates_mut(|templates| templates.get(&key).cloned());
        match source {
            Some(source) => Ok(ResolvedResource { path: key, source }),
            None => Err(PlatenError::Resource {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such template in memory"),
            }),
        }
    }
}
