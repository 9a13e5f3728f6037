// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bolo_core::Retention;
use yare::parameterized;

#[test]
fn empty_document_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.listener, "tcp://*:2999");
    assert_eq!(config.controller, "tcp://127.0.0.1:2998");
    assert_eq!(config.broadcast, "tcp://*:2997");
    assert_eq!(config.snapshot_size_mib, 8);
    assert_eq!(config.tick_ms, 1000);
    assert_eq!(config.grace_period, 15);
    assert!(config.logfile.is_none());
}

#[test]
fn load_reads_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bolo.toml");
    std::fs::write(&path, "listener = \"tcp://*:3999\"\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.listener, "tcp://*:3999");
}

#[test]
fn unknown_top_level_keys_are_rejected() {
    assert!(matches!(
        Config::parse("listner = \"oops\""),
        Err(ConfigError::Parse(_))
    ));
}

#[parameterized(
    wildcard = { "tcp://*:2999", "0.0.0.0:2999" },
    loopback = { "tcp://127.0.0.1:2998", "127.0.0.1:2998" },
    bare = { "localhost:2997", "localhost:2997" },
)]
fn socket_addr_normalizes(endpoint: &str, expected: &str) {
    assert_eq!(socket_addr(endpoint).unwrap(), expected);
}

#[parameterized(
    no_port = { "tcp://localhost" },
    empty_host = { ":2999" },
    bad_port = { "localhost:notaport" },
)]
fn socket_addr_rejects(endpoint: &str) {
    assert!(matches!(
        socket_addr(endpoint),
        Err(ConfigError::Endpoint(_))
    ));
}

#[test]
fn retention_count_from_integer() {
    let config = Config::parse("max_events = 2000").unwrap();
    assert_eq!(
        config.max_events.to_retention().unwrap(),
        Retention::Count(2000)
    );
}

#[test]
fn retention_count_from_numeric_string() {
    let config = Config::parse("max_events = \"500\"").unwrap();
    assert_eq!(
        config.max_events.to_retention().unwrap(),
        Retention::Count(500)
    );
}

#[test]
fn retention_age_from_time_span() {
    let config = Config::parse("max_events = \"2h\"").unwrap();
    assert_eq!(
        config.max_events.to_retention().unwrap(),
        Retention::Age(7200)
    );
}

#[test]
fn retention_rejects_garbage() {
    let config = Config::parse("max_events = \"soon\"").unwrap();
    assert!(matches!(
        config.max_events.to_retention(),
        Err(ConfigError::Retention(_))
    ));
}
