// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Integration tests for the project build and check pipeline.
//!
//! These tests verify the full flow using the actual crate code: config
//! loading, data merging, template registration and output writing.

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use platen_cli::commands::{build, check, render};

/// Create a test project structure in a temp directory
fn setup_test_project(dir: &Path) {
    fs::create_dir_all(dir.join("templates/net")).unwrap();
    fs::create_dir_all(dir.join("data")).unwrap();

    let hosts = "# [[project]]\n[[for name, ip in hosts]][[ip]]\t[[name]].[[domain]]\n[[end]]";
    fs::write(dir.join("templates/net/hosts.tmpl"), hosts).unwrap();

    let firewall = r#"[[def allow(port)]]-A [[chain]] -p tcp --dport [[port]] -j ACCEPT
[[end]]*filter
[[for p in ports]][[call allow(p)]][[end]][[if log]]-A [[chain]] -j LOG
[[end]]COMMIT
"#;
    fs::write(dir.join("templates/firewall.tmpl"), firewall).unwrap();

    fs::write(
        dir.join("data/common.toml"),
        "project = \"lab\"\ndomain = \"example\"\nlog = false\n",
    )
    .unwrap();
    fs::write(
        dir.join("data/hosts.json"),
        r#"{"domain": "lan", "hosts": [["web", "10.0.0.1"], ["db", "10.0.0.2"]]}"#,
    )
    .unwrap();

    let config = r#"
[project]
name = "lab"
templates_dir = "templates"

[[target]]
name = "hosts"
template = "net/hosts.tmpl"
data = ["data/common.toml", "data/hosts.json"]
output = "out/hosts"

[[target]]
template = "firewall.tmpl"
data = ["data/common.toml"]
output = "out/rules.v4"

[target.vars]
chain = "INPUT"
ports = [22, 443]
log = true
"#;
    fs::write(dir.join("platen.toml"), config).unwrap();
}

#[test]
fn test_build_renders_all_targets() {
    let dir = tempdir().unwrap();
    setup_test_project(dir.path());

    build::run(&dir.path().join("platen.toml")).unwrap();

    let hosts = fs::read_to_string(dir.path().join("out/hosts")).unwrap();
    assert_eq!(hosts, "# lab\n10.0.0.1\tweb.lan\n10.0.0.2\tdb.lan\n");

    let rules = fs::read_to_string(dir.path().join("out/rules.v4")).unwrap();
    assert_eq!(
        rules,
        "*filter\n\
         -A INPUT -p tcp --dport 22 -j ACCEPT\n\
         -A INPUT -p tcp --dport 443 -j ACCEPT\n\
         -A INPUT -j LOG\n\
         COMMIT\n"
    );
}

#[test]
fn test_build_stops_at_failing_target() {
    let dir = tempdir().unwrap();
    setup_test_project(dir.path());
    fs::write(dir.path().join("templates/net/hosts.tmpl"), "[[missing_name]]").unwrap();

    let err = build::run(&dir.path().join("platen.toml")).unwrap_err();
    assert!(format!("{:#}", err).contains("missing_name"), "{:#}", err);
    assert!(!dir.path().join("out/rules.v4").exists());
}

#[test]
fn test_build_missing_config() {
    let dir = tempdir().unwrap();
    assert!(build::run(&dir.path().join("platen.toml")).is_err());
}

#[test]
fn test_render_to_file_with_set_values() {
    let dir = tempdir().unwrap();
    setup_test_project(dir.path());

    let output = dir.path().join("out/single.txt");
    render::run(
        &dir.path().join("templates/net/hosts.tmpl"),
        &[dir.path().join("data/hosts.json")],
        &["project=cli".to_string(), "domain=test".to_string()],
        Some(&output),
    )
    .unwrap();

    assert_eq!(
        fs::read_to_string(output).unwrap(),
        "# cli\n10.0.0.1\tweb.test\n10.0.0.2\tdb.test\n"
    );
}

#[test]
fn test_check_reports_failures() {
    let dir = tempdir().unwrap();
    setup_test_project(dir.path());
    fs::write(dir.path().join("templates/bad.tmpl"), "[[len(hosts)]]").unwrap();
    fs::write(dir.path().join("templates/open.tmpl"), "[[if x]]").unwrap();

    let all = format!("{}/templates/**/*.tmpl", dir.path().display());
    let summary = check::check_patterns(&[all.clone()]).unwrap();
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.failed, 2);
    assert!(check::run(&[all]).is_err());

    let good = format!("{}/templates/net/*.tmpl", dir.path().display());
    assert!(check::run(&[good]).is_ok());
}
