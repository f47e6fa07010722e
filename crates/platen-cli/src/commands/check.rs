// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Check command for validating templates without rendering them.
//!
//! Every file matched by the given glob patterns is parsed and each of its
//! directives is compiled, so structural errors, malformed directives and
//! expressions outside the supported subset are reported up front.

use console::style;
use platen::{ExpressionCache, Template};
use std::path::PathBuf;

/// Outcome of checking a set of templates.
#[derive(Debug, Default, PartialEq)]
pub struct CheckSummary {
    /// Templates that parsed and compiled.
    pub passed: usize,
    /// Templates with at least one error.
    pub failed: usize,
    /// Directives compiled across all passing templates.
    pub directives: usize,
}

/// Checks every template matched by `patterns` and fails if any has errors.
pub fn run(patterns: &[String]) -> anyhow::Result<()> {
    let summary = check_patterns(patterns)?;
    println!(
        "{} {} template(s), {} directive(s)",
        style("Checked").cyan(),
        summary.passed + summary.failed,
        summary.directives
    );
    if summary.failed > 0 {
        anyhow::bail!("{} template(s) failed", summary.failed);
    }
    Ok(())
}

/// Checks every template matched by `patterns`, printing one line per file.
pub fn check_patterns(patterns: &[String]) -> anyhow::Result<CheckSummary> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let before = paths.len();
        paths.extend(glob::glob(pattern)?.flatten().filter(|p| p.is_file()));
        if paths.len() == before {
            tracing::warn!(pattern = %pattern, "pattern matched no files");
        }
    }
    paths.sort();
    paths.dedup();

    let cache = ExpressionCache::new();
    let mut summary = CheckSummary::default();
    for path in &paths {
        match Template::from_file(path).and_then(|template| template.compile_all(&cache)) {
            Ok(count) => {
                summary.passed += 1;
                summary.directives += count;
                println!("  {} {}", style("ok").green(), path.display());
            }
            Err(e) => {
                summary.failed += 1;
                println!("  {} {}", style("error").red().bold(), path.display());
                println!("{}", e);
            }
        }
    }
    Ok(summary)
}
