// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiled-expression caching.
//!
//! Directive source text is compiled once per [`ExpressionCache`] and the
//! resulting closure is reused every time the same text executes again,
//! typically in every iteration of a loop body. Entries are keyed by the
//! exact source text and are never evicted; [`ExpressionCache::clear`] is
//! the only reset.
//!
//! The cache is owned by the [`Engine`](crate::Engine) and shared with
//! callers through `Arc`, so concurrent executions populate the same tables.
//! Compilation happens outside the lock; when two threads race on the same
//! text, the first inserted closure wins.

use crate::compiler::{self, CompileError, ExprFn, StmtFn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: usize,
    /// Lookups that compiled the source.
    pub misses: usize,
    /// Closures currently stored.
    pub entries: usize,
}

/// Source-text keyed store of compiled directive closures.
#[derive(Default)]
pub struct ExpressionCache {
    expressions: Mutex<HashMap<String, ExprFn>>,
    statements: Mutex<HashMap<String, StmtFn>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache")
            .field("stats", &self.stats())
            .finish()
    }
}

// Compiled closures are immutable once inserted, so a panic while the lock
// was held cannot leave a table half-updated.
fn lock<T>(table: &Mutex<T>) -> MutexGuard<'_, T> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ExpressionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled closure for an expression, compiling it on the
    /// first request.
    pub fn expression(&self, source: &str) -> Result<ExprFn, CompileError> {
        if let Some(compiled) = lock(&self.expressions).get(source) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(source, "expression cache hit");
            return Ok(compiled.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(source, "compiling expression");
        let compiled = compiler::compile_expression(source)?;
        Ok(lock(&self.expressions)
            .entry(source.to_string())
            .or_insert(compiled)
            .clone())
    }

    /// Returns the compiled closure for an assignment statement, compiling
    /// it on the first request.
    pub fn statement(&self, source: &str) -> Result<StmtFn, CompileError> {
        if let Some(compiled) = lock(&self.statements).get(source) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(source, "statement cache hit");
            return Ok(compiled.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(source, "compiling statement");
        let compiled = compiler::compile_statement(source)?;
        Ok(lock(&self.statements)
            .entry(source.to_string())
            .or_insert(compiled)
            .clone())
    }

    /// Returns the current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: lock(&self.expressions).len() + lock(&self.statements).len(),
        }
    }

    /// Drops every compiled closure and resets the counters.
    pub fn clear(&self) {
        lock(&self.expressions).clear();
        lock(&self.statements).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        tracing::debug!("expression cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::value::{Context, Value};
    use std::sync::Arc;

    #[test]
    fn test_compiles_each_source_once() {
        let cache = ExpressionCache::new();
        for _ in 0..5 {
            cache.expression("x + 1").unwrap();
        }
        cache.statement("y = x").unwrap();
        cache.statement("y = x").unwrap();

        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 5,
                misses: 2,
                entries: 2,
            }
        );
    }

    #[test]
    fn test_cached_closure_reads_current_scope() {
        let cache = ExpressionCache::new();
        let mut data = Context::new();
        for i in 0..3i64 {
            data.insert("x", i);
            let f = cache.expression("x + 1").unwrap();
            let scope = Scope::new(&mut data);
            assert_eq!(f(&scope).unwrap(), Value::Int(i + 1));
        }
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = ExpressionCache::new();
        assert!(cache.expression("f(x)").is_err());
        assert!(cache.expression("f(x)").is_err());
        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let cache = ExpressionCache::new();
        cache.expression("1").unwrap();
        cache.expression("1").unwrap();
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_shared_between_threads() {
        let cache = Arc::new(ExpressionCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.expression("a == 1").unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits + stats.misses, 4);
    }
}
