// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn explicit_summary_is_kept() {
    let t = StateType::new("cpu", 300, Status::Critical, Some("cpu went dark".into()));
    assert_eq!(t.stale_summary(), "cpu went dark");
    assert_eq!(t.stale_status(), Status::Critical);
    assert_eq!(t.freshness(), 300);
}

#[parameterized(
    one_second = { 1, "No results received for more than 1 second" },
    seconds = { 45, "No results received for more than 45 seconds" },
    one_minute = { 60, "No results received for more than 1 minute" },
    minutes = { 300, "No results received for more than 5 minutes" },
    one_hour = { 3600, "No results received for more than 1 hour" },
    hours = { 7200, "No results received for more than 2 hours" },
)]
fn generated_summary_phrasing(freshness: i64, expected: &str) {
    let t = StateType::new("t", freshness, Status::Warning, None);
    assert_eq!(t.stale_summary(), expected);
}
