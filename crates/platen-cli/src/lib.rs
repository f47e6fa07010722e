// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! Platen CLI library.
//!
//! This crate provides the command-line interface for the platen templating
//! engine: it registers templates from files, builds the data mapping from
//! JSON/TOML files and writes the rendered output.
//!
//! # Usage
//!
//! This crate is primarily used through the `platen` binary:
//!
//! ```bash
//! platen render hosts.tmpl -d hosts.json -o /etc/hosts
//! platen check 'templates/**/*.tmpl'
//! platen build --config platen.toml
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `platen.toml`; see [`config`].

/// CLI commands (render, check, build).
pub mod commands;
/// Project configuration from `platen.toml`.
pub mod config;
/// Data mapping construction from JSON/TOML files.
pub mod data;
