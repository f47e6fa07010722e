// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! This module contains the implementations for all platen CLI commands:
//!
//! - `render`: Render one template to stdout or a file
//! - `check`: Parse and compile templates without rendering
//! - `build`: Render every target listed in `platen.toml`

/// Project build command.
pub mod build;
/// Template validation command.
pub mod check;
/// Single template render command.
pub mod render;

use anyhow::Context as _;
use platen::{Context, Engine, ResourceResolver, Template};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Executes `template` and writes the output to `path`, creating parent
/// directories as needed.
pub(crate) fn write_output<R: ResourceResolver>(
    engine: &Engine<R>,
    template: &Template,
    context: &mut Context,
    path: &Path,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    engine.execute_to(template, context, &mut out)?;
    out.flush()?;
    Ok(())
}
