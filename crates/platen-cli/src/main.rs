// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use platen_cli::commands;
use platen_cli::config::CONFIG_FILE;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "platen")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Render bracket-directive templates from JSON/TOML data", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a single template
    Render {
        /// Template file
        template: PathBuf,
        /// JSON or TOML data file (repeatable, merged left to right)
        #[arg(short, long = "data")]
        data: Vec<PathBuf>,
        /// Set a value: KEY=VALUE, VALUE parsed as JSON when possible (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse and compile templates without rendering
    Check {
        /// Glob patterns of template files
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Render every target in the project configuration
    Build {
        /// Configuration file
        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render { template, data, set, output } => {
            commands::render::run(&template, &data, &set, output.as_deref())
        }
        Commands::Check { patterns } => commands::check::run(&patterns),
        Commands::Build { config } => commands::build::run(&config),
    }
}
