// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keys");

    let mut keys = HashMap::new();
    keys.insert("host.ip".to_string(), "1.2.3.4".to_string());
    keys.insert("host.mask".to_string(), "255.255.255.0".to_string());

    save_keys(&keys, &path, 1234567890123).unwrap();
    let loaded = load_keys(&path).unwrap();
    assert_eq!(loaded, keys);
}

#[test]
fn file_shape() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keys");

    let mut keys = HashMap::new();
    keys.insert("b".to_string(), "2".to_string());
    keys.insert("a".to_string(), "1".to_string());

    save_keys(&keys, &path, 42).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "# generated 42\na = 1\nb = 2\n# 2 keys\n");
}

#[test]
fn comments_and_blanks_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keys");
    std::fs::write(&path, "# generated 1\n\n  # indented comment\nx = 10\n").unwrap();

    let loaded = load_keys(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded["x"], "10");
}

#[test]
fn malformed_lines_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keys");
    // No whitespace before '=' means the line does not parse.
    std::fs::write(&path, "glued=together\nok = fine\nno-equals-here\n").unwrap();

    let loaded = load_keys(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded["ok"], "fine");
}

#[test]
fn values_keep_internal_whitespace() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keys");
    std::fs::write(&path, "note =   spaced   out\n").unwrap();

    let loaded = load_keys(&path).unwrap();
    assert_eq!(loaded["note"], "spaced   out");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(load_keys(&missing), Err(KeysError::Io(_))));
}
