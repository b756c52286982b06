//! CLI tests for the commands that need no browser.
//!
//! Spawns the buildscan binary and verifies exit codes and written files for
//! `init`, `render`, and argument errors in `scan`.

use std::fs;
use std::process::Command;

use buildscan::core::aggregate::{Aggregate, ModelCatalog, ModelEntry, ThemeEntry};
use buildscan::exit_codes;
use buildscan::io::config::{DEFAULT_CONFIG_FILE, ScanConfig, load_config};
use buildscan::io::report::ReportMeta;
use buildscan::io::snapshot::{Snapshot, write_snapshot};
use chrono::Local;
use indexmap::IndexMap;
use url::Url;

fn buildscan() -> Command {
    Command::new(env!("CARGO_BIN_EXE_buildscan"))
}

#[test]
fn init_writes_default_config_once() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = buildscan()
        .current_dir(temp.path())
        .arg("init")
        .status()
        .expect("buildscan init");
    assert_eq!(status.code(), Some(exit_codes::OK));
    let config_path = temp.path().join(DEFAULT_CONFIG_FILE);
    assert_eq!(load_config(&config_path).expect("load"), ScanConfig::default());

    let status = buildscan()
        .current_dir(temp.path())
        .arg("init")
        .status()
        .expect("buildscan init again");
    assert_eq!(status.code(), Some(exit_codes::FAILED));

    let status = buildscan()
        .current_dir(temp.path())
        .args(["init", "--force"])
        .status()
        .expect("buildscan init --force");
    assert_eq!(status.code(), Some(exit_codes::OK));
}

#[test]
fn render_turns_a_snapshot_into_markdown() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut aggregate = Aggregate::default();
    let mut themes = IndexMap::new();
    themes.insert(
        "Decision".to_string(),
        ThemeEntry {
            views: vec!["Gallery".to_string()],
            ..ThemeEntry::default()
        },
    );
    aggregate.insert_model(
        "Grants".to_string(),
        ModelEntry {
            catalog: ModelCatalog::new("grants", None, "MacModelTypeDyn"),
            themes,
            methods: None,
        },
    );
    let url = Url::parse("https://acme.test/").expect("url");
    let snapshot_path = temp.path().join("scan.json");
    write_snapshot(
        &snapshot_path,
        &Snapshot {
            meta: ReportMeta::new(&url, vec!["catalog".to_string()], Local::now()),
            aggregate,
        },
    )
    .expect("write snapshot");

    let output = buildscan()
        .current_dir(temp.path())
        .args(["render", "scan.json", "--out", "out"])
        .output()
        .expect("buildscan render");
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let printed = String::from_utf8(output.stdout).expect("utf-8 stdout");
    let report_path = temp.path().join(printed.trim());
    let markdown = fs::read_to_string(&report_path).expect("read report");
    assert!(markdown.contains("## Model: Grants"));
    assert!(markdown.contains("- Gallery"));
    assert!(markdown.contains("**Client:** acme.test"));
    let written = fs::read_dir(temp.path().join("out")).expect("out dir").count();
    assert_eq!(written, 1);
}

#[test]
fn render_of_missing_snapshot_fails() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = buildscan()
        .current_dir(temp.path())
        .args(["render", "missing.json"])
        .output()
        .expect("buildscan render");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.json"), "stderr: {stderr}");
}

#[test]
fn scan_rejects_an_empty_instance_before_connecting() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = buildscan()
        .current_dir(temp.path())
        .args(["scan", "@"])
        .output()
        .expect("buildscan scan");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("instance URL is empty"), "stderr: {stderr}");
}
