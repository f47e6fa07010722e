// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Render command for executing a single template.

use crate::data::{build_context, parse_assignment};
use console::style;
use platen::{Engine, FileSystemResolver};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Renders `template` against the merged data files and `--set`
/// assignments, writing to `output` or stdout.
pub fn run(
    template: &Path,
    data: &[PathBuf],
    set: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let vars = set
        .iter()
        .map(String::as_str)
        .map(parse_assignment)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut context = build_context(data, vars)?;

    let root = template.parent().unwrap_or_else(|| Path::new("."));
    let file_name = template
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("invalid template path {}", template.display()))?;

    let engine = Engine::new(FileSystemResolver::new(root));
    let template = engine.register(file_name, file_name)?;

    match output {
        Some(path) => {
            super::write_output(&engine, &template, &mut context, path)?;
            eprintln!(
                "{} {} -> {}",
                style("Rendered").green(),
                template.name(),
                path.display()
            );
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            engine.execute_to(&template, &mut context, &mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}
