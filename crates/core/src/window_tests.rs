// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn start_aligns_to_period_multiples() {
    let w = Window::anonymous(60);
    assert_eq!(w.start(0), 0);
    assert_eq!(w.start(59), 0);
    assert_eq!(w.start(60), 60);
    assert_eq!(w.start(1030), 1020);
}

#[test]
fn end_is_start_of_next_window() {
    let w = Window::anonymous(300);
    assert_eq!(w.end(1000), 1200);
    assert_eq!(w.end(1200), 1500);
}

#[test]
fn named_window_keeps_its_name() {
    let w = Window::named("minutely", 60);
    assert_eq!(w.name(), Some("minutely"));
    assert_eq!(w.seconds(), 60);
    assert_eq!(Window::anonymous(10).name(), None);
}

#[test]
fn zero_period_is_clamped() {
    // A zero window would divide by zero on alignment.
    let w = Window::anonymous(0);
    assert_eq!(w.seconds(), 1);
    assert_eq!(w.start(42), 42);
}
