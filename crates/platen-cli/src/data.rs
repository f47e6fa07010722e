// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Data mapping construction from files and command-line assignments.
//!
//! Data files are JSON (`.json`) or TOML (`.toml`) documents whose top level
//! is a table. Files are merged left to right, so later files override keys
//! of earlier ones; `--set` assignments are applied last.

use anyhow::{bail, Context as _};
use platen::{Context, Value};
use std::fs;
use std::path::Path;

/// Reads a JSON or TOML data file into a JSON value.
pub fn load_data_file(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let value = match extension {
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()))?,
        "toml" => {
            let table: toml::Table = toml::from_str(&content)
                .with_context(|| format!("invalid TOML in {}", path.display()))?;
            serde_json::to_value(table)?
        }
        _ => bail!(
            "unsupported data file {} (expected .json or .toml)",
            path.display()
        ),
    };
    tracing::debug!(path = %path.display(), "loaded data file");
    Ok(value)
}

/// Parses a `key=value` assignment.
///
/// The value is read as JSON when it parses as JSON (`80`, `true`,
/// `["a", "b"]`) and taken as a plain string otherwise.
pub fn parse_assignment(assignment: &str) -> anyhow::Result<(String, Value)> {
    let Some((key, raw)) = assignment.split_once('=') else {
        bail!("expected KEY=VALUE, got '{}'", assignment);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("empty key in '{}'", assignment);
    }
    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from(json),
        Err(_) => Value::from(raw),
    };
    Ok((key.to_string(), value))
}

/// Builds a data mapping from data files followed by inline values.
pub fn build_context<P, I>(files: &[P], vars: I) -> anyhow::Result<Context>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (String, Value)>,
{
    let mut context = Context::new();
    for file in files {
        let file = file.as_ref();
        let layer = Context::from_json(load_data_file(file)?)
            .with_context(|| format!("data file {} is not a table", file.display()))?;
        context.extend(layer);
    }
    for (key, value) in vars {
        context.insert(key, value);
    }
    Ok(context)
}

/// Converts an inline TOML table into assignments.
pub fn table_vars(table: &toml::Table) -> anyhow::Result<Vec<(String, Value)>> {
    table
        .iter()
        .map(|(key, value)| Ok((key.clone(), Value::from(serde_json::to_value(value)?))))
        .collect()
}
