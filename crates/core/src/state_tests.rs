// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;

fn test_type(freshness: i64) -> Arc<StateType> {
    Arc::new(StateType::new(
        "default",
        freshness,
        Status::Critical,
        Some("gone stale".into()),
    ))
}

#[test]
fn pending_state_shape() {
    let s = State::pending("svc.a", test_type(60), 1000);
    assert_eq!(s.status, Status::Pending);
    assert_eq!(s.summary, PENDING_SUMMARY);
    assert_eq!(s.last_seen, 0);
    assert_eq!(s.expiry, 1060);
    assert!(!s.stale);
}

#[test]
fn first_observation_is_a_transition() {
    let mut s = State::pending("svc.a", test_type(60), 1000);
    let transition = s.observe(1000, Status::Ok, "ok");
    assert!(transition, "pending -> ok must transition");
    assert_eq!(s.status, Status::Ok);
    assert_eq!(s.summary, "ok");
    assert_eq!(s.last_seen, 1000);
    assert_eq!(s.expiry, 1060);
    assert!(!s.stale);
}

#[test]
fn same_status_observation_is_not_a_transition() {
    let mut s = State::pending("svc.a", test_type(60), 1000);
    s.observe(1000, Status::Ok, "ok");
    assert!(!s.observe(1010, Status::Ok, "still ok"));
    assert_eq!(s.summary, "still ok");
    assert_eq!(s.expiry, 1070);
}

#[test]
fn status_change_is_a_transition() {
    let mut s = State::pending("svc.a", test_type(60), 1000);
    s.observe(1000, Status::Ok, "ok");
    assert!(s.observe(1010, Status::Warning, "load climbing"));
}

#[test]
fn observation_after_staleness_is_a_transition() {
    let mut s = State::pending("svc.a", test_type(60), 1000);
    s.observe(1000, Status::Critical, "down");
    s.mark_stale(1100);
    // Still critical, but stale -> fresh flips.
    assert!(s.observe(1110, Status::Critical, "down"));
    assert!(!s.stale);
}

#[test]
fn mark_stale_applies_type_policy() {
    let mut s = State::pending("svc.a", test_type(60), 1000);
    s.observe(1000, Status::Ok, "ok");

    let transition = s.mark_stale(1100);
    assert!(transition);
    assert!(s.stale);
    assert_eq!(s.status, Status::Critical);
    assert_eq!(s.summary, "gone stale");
    assert_eq!(s.expiry, 1160);
    // last_seen keeps the final real observation
    assert_eq!(s.last_seen, 1000);
}

#[test]
fn repeated_staleness_is_not_a_transition() {
    let mut s = State::pending("svc.a", test_type(60), 1000);
    s.observe(1000, Status::Ok, "ok");
    assert!(s.mark_stale(1100));
    assert!(!s.mark_stale(1200), "already stale at stale status");
}

#[test]
fn expiry_check_is_inclusive() {
    let mut s = State::pending("svc.a", test_type(60), 1000);
    s.observe(1000, Status::Ok, "ok");
    assert!(!s.is_expired(1059));
    assert!(s.is_expired(1060));
}
