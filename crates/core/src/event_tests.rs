// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn ev(ts: i64, name: &str) -> Event {
    Event {
        timestamp: ts,
        name: name.to_string(),
        extra: String::new(),
    }
}

#[test]
fn count_retention_keeps_most_recent() {
    let mut ring = EventRing::new(Retention::Count(2));
    ring.push(ev(1, "a"));
    ring.push(ev(2, "b"));
    ring.push(ev(3, "c"));

    let names: Vec<&str> = ring.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["b", "c"]);
}

#[test]
fn age_retention_evicts_old_events() {
    let mut ring = EventRing::new(Retention::Age(100));
    ring.push(ev(1000, "old"));
    ring.push(ev(1050, "mid"));
    ring.push(ev(1200, "new"));

    // 1000 <= 1200-100, 1050 <= 1100 as well
    let names: Vec<&str> = ring.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["new"]);
}

#[test]
fn age_retention_keeps_events_inside_the_horizon() {
    let mut ring = EventRing::new(Retention::Age(100));
    ring.push(ev(1000, "a"));
    ring.push(ev(1050, "b"));
    assert_eq!(ring.len(), 2);
}

#[test]
fn zero_count_retention_keeps_nothing() {
    let mut ring = EventRing::new(Retention::Count(0));
    ring.push(ev(1, "a"));
    assert!(ring.is_empty());
}

#[test]
fn since_filters_inclusively() {
    let mut ring = EventRing::new(Retention::Count(10));
    ring.push(ev(10, "a"));
    ring.push(ev(20, "b"));
    ring.push(ev(30, "c"));

    let names: Vec<&str> = ring.since(20).map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["b", "c"]);
}
