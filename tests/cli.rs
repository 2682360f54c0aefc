//! Exit status and messages of the `dewpoint-config` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;

mod common;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("dewpoint-config").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_check_accepts_deployed_file() {
    let (_dir, path) = common::write_config("dewpoint.js", common::DEWPOINT_JS);

    cli()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("storage `sofs`"))
        .stdout(predicate::str::contains("0.0.0.0:1039"));
}

#[test]
fn test_check_fails_on_out_of_range_port() {
    let mut tree = common::fixture_tree();
    tree["fcgx"]["port"] = json!(70000);
    let (_dir, path) = common::write_tree(&tree);

    cli()
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("fcgx.port"));
}

#[test]
fn test_check_fails_on_missing_file() {
    let dir = tempfile::tempdir().unwrap();

    cli()
        .arg("check")
        .arg(dir.path().join("dewpoint.js"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_strict_check_rejects_unknown_key() {
    let mut tree = common::fixture_tree();
    tree["fcgx"]["keepalive"] = json!(true);
    let (_dir, path) = common::write_tree(&tree);

    cli().arg("check").arg(&path).assert().success();

    cli()
        .args(["--strict", "check"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("fcgx.keepalive"));
}

#[test]
fn test_show_toml_reloads() {
    let (_dir, path) = common::write_config("dewpoint.js", common::DEWPOINT_JS);

    let output = cli()
        .args(["show", "--format", "toml"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8(output).unwrap();
    let (_toml_dir, toml_path) = common::write_config("dewpoint.toml", &text);
    cli().arg("check").arg(&toml_path).assert().success();
}
