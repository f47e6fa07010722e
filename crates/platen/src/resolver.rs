// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template resource resolution.
//!
//! This module provides the [`ResourceResolver`] trait the
//! [`Engine`](crate::Engine) uses to load template source when a name is
//! registered.
//!
//! # Resolver Implementations
//!
//! - [`FileSystemResolver`]: Loads templates from files under a root directory
//! - [`MemoryResourceResolver`](crate::MemoryResourceResolver): Loads templates
//!   from in-memory storage (testing, embedding)
//!
//! # Custom Resolvers
//!
//! Implement [`ResourceResolver`] for other loading strategies (archives,
//! generated sources, etc.).

use crate::error::Result;
use std::path::Path;

#[cfg(feature = "filesystem")]
use crate::error::PlatenError;
#[cfg(feature = "filesystem")]
use std::path::PathBuf;

/// Converts a path to a string with forward slashes.
#[inline]
pub fn path_to_string<P: AsRef<Path>>(path: P) -> String {
    #[cfg(windows)]
    {
        path.as_ref().to_string_lossy().replace('\\', "/")
    }
    #[cfg(not(windows))]
    {
        path.as_ref().to_string_lossy().to_string()
    }
}

/// A resolved template resource with its path and source text.
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// Where the source was loaded from.
    pub path: String,
    /// The template source text.
    pub source: String,
}

/// Trait for locating and loading template sources.
///
/// Implementations must be thread-safe so an engine can be shared.
pub trait ResourceResolver: Send + Sync + 'static {
    /// Loads the source text for `path`.
    fn resolve(&self, path: &str) -> Result<ResolvedResource>;
}

/// Filesystem-based resource resolver.
///
/// Relative paths are resolved against a root directory; absolute paths are
/// used as given.
///
/// # Examples
///
/// ```rust,ignore
/// use platen::FileSystemResolver;
///
/// let resolver = FileSystemResolver::new("./templates");
/// let resource = resolver.resolve("hosts.tmpl")?;
/// ```
#[cfg(feature = "filesystem")]
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    /// The root directory for relative paths.
    pub root_dir: PathBuf,
}

#[cfg(feature = "filesystem")]
impl FileSystemResolver {
    /// Creates a resolver rooted at `root_dir`.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root_dir.join(candidate)
        }
    }
}

#[cfg(feature = "filesystem")]
impl Default for FileSystemResolver {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(feature = "filesystem")]
impl ResourceResolver for FileSystemResolver {
    fn resolve(&self, path: &str) -> Result<ResolvedResource> {
        let full_path = self.full_path(path);
        tracing::debug!("Resolved path for '{}': {}", path, full_path.display());
        let source = std::fs::read_to_string(&full_path).map_err(|source| PlatenError::Resource {
            path: path_to_string(&full_path),
            source,
        })?;
        Ok(ResolvedResource {
            path: path_to_string(&full_path),
            source,
        })
    }
}
