// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build command for rendering every target of a project.

use crate::config::Config;
use crate::data::{build_context, table_vars};
use anyhow::Context as _;
use console::style;
use platen::{Engine, FileSystemResolver};
use std::path::Path;
use std::time::Instant;

/// Renders every `[[target]]` in the configuration at `config_path`.
///
/// Targets are rendered in file order and the first failure stops the
/// build. Templates used by several targets are parsed once and the
/// expression cache is shared across all of them.
pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load_from(config_path)?;
    let templates_dir = config.templates_dir();

    println!(
        "{} {} ({})",
        style("Building").cyan(),
        config.project.name,
        templates_dir.display()
    );

    if config.targets.is_empty() {
        println!("No targets in {}", config_path.display());
        return Ok(());
    }

    let engine = Engine::new(FileSystemResolver::new(&templates_dir));
    let start = Instant::now();

    for target in &config.targets {
        let template = match engine.get(&target.template) {
            Ok(template) => template,
            Err(_) => engine.register(&target.template, &target.template)?,
        };

        let data_files: Vec<_> = target.data.iter().map(|p| config.resolve(p)).collect();
        let mut context = build_context(&data_files, table_vars(&target.vars)?)
            .with_context(|| format!("target '{}'", target.display_name()))?;

        let output = config.resolve(&target.output);
        super::write_output(&engine, &template, &mut context, &output)
            .with_context(|| format!("target '{}'", target.display_name()))?;

        println!(
            "  {} {} -> {}",
            style("Rendered").green(),
            target.display_name(),
            output.display()
        );
    }

    let stats = engine.cache().stats();
    tracing::debug!(
        hits = stats.hits,
        misses = stats.misses,
        "expression cache after build"
    );
    println!(
        "{} {} target(s) in {:.2?}",
        style("Built").green().bold(),
        config.targets.len(),
        start.elapsed()
    );
    Ok(())
}
