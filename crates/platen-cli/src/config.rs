// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Platen project configuration.
//!
//! Configuration is loaded from `platen.toml`. Every relative path in it is
//! resolved against the directory containing the file.
//!
//! # Example Configuration
//!
//! ```toml
//! [project]
//! name = "edge-router"
//! templates_dir = "templates"
//!
//! [[target]]
//! name = "firewall"
//! template = "iptables.tmpl"
//! data = ["data/common.toml", "data/router.json"]
//! output = "out/iptables.rules"
//!
//! [target.vars]
//! chain = "INPUT"
//! ```

use anyhow::Context as _;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "platen.toml";

/// Main configuration structure loaded from `platen.toml`.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,
    /// Render targets, executed in file order.
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetConfig>,
    /// Directory the configuration was loaded from.
    #[serde(skip)]
    pub root: PathBuf,
}

/// Project metadata configuration.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Project name (default: "unnamed").
    #[serde(default = "default_name")]
    pub name: String,
    /// Directory template paths are relative to (default: ".").
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
}

/// One template rendered to one output file.
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    /// Display name (defaults to the template path).
    pub name: Option<String>,
    /// Template path, relative to the templates directory.
    pub template: String,
    /// JSON or TOML data files, merged left to right.
    #[serde(default)]
    pub data: Vec<PathBuf>,
    /// Inline values applied after the data files.
    #[serde(default)]
    pub vars: toml::Table,
    /// Output file path.
    pub output: PathBuf,
}

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            templates_dir: default_templates_dir(),
        }
    }
}

impl TargetConfig {
    /// Name shown in progress output.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.template)
    }
}

impl Config {
    /// Loads configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        config.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        tracing::debug!(
            project = %config.project.name,
            targets = config.targets.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Resolves a configuration-relative path.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.root.join(path)
    }

    /// The directory templates are loaded from.
    pub fn templates_dir(&self) -> PathBuf {
        self.resolve(&self.project.templates_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_resolves_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
[project]
name = "site"
templates_dir = "tmpl"

[[target]]
template = "a.tmpl"
data = ["d.json"]
output = "out/a.txt"

[target.vars]
port = 80
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.project.name, "site");
        assert_eq!(config.templates_dir(), dir.path().join("tmpl"));
        assert_eq!(config.targets.len(), 1);

        let target = &config.targets[0];
        assert_eq!(target.display_name(), "a.tmpl");
        assert_eq!(config.resolve(&target.output), dir.path().join("out/a.txt"));
        assert_eq!(target.vars.get("port").and_then(|v| v.as_integer()), Some(80));
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.project.name, "unnamed");
        assert!(config.targets.is_empty());
        assert_eq!(config.templates_dir(), dir.path().join("."));
    }

    #[test]
    fn test_target_requires_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[[target]]\ntemplate = \"a.tmpl\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
