//! Shared helpers for integration tests.

use std::path::PathBuf;

use serde_json::Value;
use tempfile::TempDir;

/// The deployed gateway configuration.
pub const DEWPOINT_JS: &str = include_str!("../fixtures/dewpoint.js");

/// Parsed copy of the fixture for tests that edit it.
pub fn fixture_tree() -> Value {
    serde_json::from_str(DEWPOINT_JS).unwrap()
}

/// Write `content` to `name` inside a fresh temporary directory.
///
/// The directory must outlive the returned path.
pub fn write_config(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

/// Write an edited document tree as JSON.
pub fn write_tree(tree: &Value) -> (TempDir, PathBuf) {
    write_config("dewpoint.js", &serde_json::to_string_pretty(tree).unwrap())
}
